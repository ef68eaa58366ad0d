use std::path::Path;
use std::process;

use sassy::cli;
use sassy::config::Manifest;
use sassy::json::JsonRuleset;
use sassy::selectable::DocumentSet;
use sassy::universe::{Logger, Universe};

/// Exit code when the manifest or a document cannot be read or written.
const EXIT_INPUT: i32 = 1;
/// Exit code when any patch failed to load or run.
const EXIT_PATCH: i32 = 2;

fn main() {
    let args = cli::parse_args();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .format_timestamp(None)
        .init();

    // ── Manifest ──────────────────────────────────────────────────────────────
    let (manifest, errors) = match Manifest::load_file(&args.manifest) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("sassy: {}: {e}", args.manifest.display());
            process::exit(EXIT_INPUT);
        }
    };
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("sassy: {}: {e}", args.manifest.display());
        }
        process::exit(EXIT_INPUT);
    }

    let mut universe = Universe::new(Logger::default());
    universe.register_ruleset("parts", JsonRuleset::parts());
    universe.set_known_mods(manifest.known_mods.iter().chain(&args.known_mods).cloned());

    // ── Documents ─────────────────────────────────────────────────────────────
    let mut docs = DocumentSet::new();
    let mut file_names = Vec::new();
    for entry in &manifest.documents {
        let raw = match std::fs::read_to_string(&entry.path) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("sassy: {}: {e}", entry.path.display());
                process::exit(EXIT_INPUT);
            }
        };
        let name = document_name(&entry.path);
        match universe.open_document(&entry.label, &name, &raw) {
            Ok(doc) => {
                docs.push(doc);
                file_names.push(entry.path.file_name().map(|f| f.to_owned()));
            }
            Err(e) => {
                eprintln!("sassy: {}: {e}", entry.path.display());
                process::exit(EXIT_INPUT);
            }
        }
    }

    // ── Patches ───────────────────────────────────────────────────────────────
    let mut load_errors = 0;
    for m in &manifest.mods {
        load_errors += universe.load_patches_in_directory(&m.dir, &m.id).errors;
    }
    let report = universe.register_all_patches(&mut docs);
    log::info!(
        "{} patches run, {} blocks applied, {} skipped, {} staged",
        report.patches_run,
        report.blocks_applied,
        report.blocks_skipped,
        report.deferred_run
    );

    // ── Output ────────────────────────────────────────────────────────────────
    for (doc, file_name) in docs.iter().zip(&file_names) {
        let text = doc.serialize();
        match (&args.output, file_name) {
            (Some(dir), Some(file_name)) => {
                let path = dir.join(file_name);
                let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, text));
                if let Err(e) = written {
                    eprintln!("sassy: {}: {e}", path.display());
                    process::exit(EXIT_INPUT);
                }
            }
            _ => println!("{text}"),
        }
    }

    if load_errors + report.errors > 0 {
        process::exit(EXIT_PATCH);
    }
}

/// Document name: the file stem.
fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
