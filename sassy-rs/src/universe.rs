//! The process-wide registry and the load/registration pipeline.
//!
//! A host builds one [`Universe`], registers its rulesets and native
//! libraries, then feeds it patch sources (from disk with
//! [`Universe::load_patches_in_directory`] or from memory).  Loading only
//! parses and queues; [`Universe::register_all_patches`] runs the queue
//! against a [`DocumentSet`] and then runs every `@stage` block in stage
//! order.
//!
//! Failures never abort a batch.  Each one is reported through the
//! [`Logger`] error sink with the qualified `mod:file` name and counted in
//! the returned report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use walkdir::WalkDir;

use crate::ast::Patch;
use crate::builtins;
use crate::env::{Environment, GlobalEnvironment};
use crate::error::SassyError;
use crate::interp::Interpreter;
use crate::library::PatchLibrary;
use crate::parser::{PatchParser, SassyParser};
use crate::selectable::{Document, DocumentSet, Selectable};
use crate::stage::StageTable;

/// Extension of patch and library source files.
pub const PATCH_EXTENSION: &str = "patch";

/// File-name prefix marking a library source file.
pub const LIBRARY_PREFIX: char = '_';

// ── Plugin contracts ──────────────────────────────────────────────────────────

/// Converts raw host data into a [`Selectable`] tree.
pub trait Ruleset {
    /// True if this ruleset handles documents carrying `label`.
    fn matches(&self, label: &str) -> bool;

    fn convert_to_selectable(
        &self,
        label: &str,
        name: &str,
        raw: &str,
    ) -> Result<Box<dyn Selectable>, SassyError>;
}

/// A message sink.
pub type Sink = Box<dyn Fn(&str)>;

/// The two host-supplied diagnostic sinks.
pub struct Logger {
    error: Sink,
    message: Sink,
}

impl Logger {
    pub fn new(error: impl Fn(&str) + 'static, message: impl Fn(&str) + 'static) -> Self {
        Logger {
            error: Box::new(error),
            message: Box::new(message),
        }
    }

    pub fn error(&self, msg: &str) {
        (self.error)(msg);
    }

    pub fn message(&self, msg: &str) {
        (self.message)(msg);
    }
}

impl Default for Logger {
    /// Forward to the `log` facade.
    fn default() -> Self {
        Logger::new(|msg| log::error!("{msg}"), |msg| log::info!("{msg}"))
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Outcome of [`Universe::load_patches_in_directory`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub libraries: usize,
    pub patches: usize,
    pub errors: usize,
}

/// Outcome of [`Universe::register_all_patches`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Patches that ran to completion.
    pub patches_run: usize,
    /// Selection blocks applied, inline or staged.
    pub blocks_applied: usize,
    /// Selection blocks skipped by `@require`/`@require-not`.
    pub blocks_skipped: usize,
    /// Staged blocks that ran to completion.
    pub deferred_run: usize,
    pub errors: usize,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

struct QueuedPatch {
    mod_id: String,
    /// `mod:file`
    qualified: String,
    patch: Patch,
}

// ── Universe ──────────────────────────────────────────────────────────────────

pub struct Universe {
    rulesets: Vec<(String, Box<dyn Ruleset>)>,
    libraries: HashMap<String, PatchLibrary>,
    known_mods: Vec<String>,
    stages: StageTable,
    to_register: Vec<QueuedPatch>,
    logger: Logger,
    parser: Box<dyn PatchParser>,
}

impl Default for Universe {
    fn default() -> Self {
        Universe::new(Logger::default())
    }
}

impl Universe {
    /// A registry with the builtin libraries installed.
    pub fn new(logger: Logger) -> Self {
        let libraries = builtins::libraries()
            .into_iter()
            .map(|(name, lib)| (name.to_owned(), PatchLibrary::Native(lib)))
            .collect();
        Universe {
            rulesets: Vec::new(),
            libraries,
            known_mods: Vec::new(),
            stages: StageTable::new(),
            to_register: Vec::new(),
            logger,
            parser: Box::new(SassyParser),
        }
    }

    /// Replace the source parser.
    pub fn with_parser(mut self, parser: impl PatchParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn register_ruleset(&mut self, name: &str, ruleset: impl Ruleset + 'static) {
        self.rulesets.retain(|(n, _)| n != name);
        self.rulesets.push((name.to_owned(), Box::new(ruleset)));
    }

    /// Register a library as `mod_id:name`, replacing any previous one.
    pub fn register_library(&mut self, mod_id: &str, name: &str, library: impl Into<PatchLibrary>) {
        self.libraries
            .insert(format!("{mod_id}:{name}"), library.into());
    }

    pub fn library(&self, qualified: &str) -> Option<&PatchLibrary> {
        self.libraries.get(qualified)
    }

    pub fn set_known_mods<I, S>(&mut self, mods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_mods.clear();
        for m in mods {
            self.add_known_mod(m);
        }
    }

    pub fn add_known_mod(&mut self, mod_id: impl Into<String>) {
        let mod_id = mod_id.into();
        if !self.known_mods.contains(&mod_id) {
            self.known_mods.push(mod_id);
        }
    }

    pub fn known_mods(&self) -> &[String] {
        &self.known_mods
    }

    pub fn stages(&self) -> &StageTable {
        &self.stages
    }

    /// Number of patches waiting for [`register_all_patches`](Self::register_all_patches).
    pub fn queued(&self) -> usize {
        self.to_register.len()
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    /// Convert raw data with the first registered ruleset accepting `label`.
    pub fn open_document(&self, label: &str, name: &str, raw: &str) -> Result<Document, SassyError> {
        let (_, ruleset) = self
            .rulesets
            .iter()
            .find(|(_, r)| r.matches(label))
            .ok_or_else(|| SassyError::NoRuleset(label.to_owned()))?;
        let root = ruleset.convert_to_selectable(label, name, raw)?;
        Ok(Document::new(label, name, root))
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Load every `.patch` file under `root` for `mod_id`.
    ///
    /// Files whose name starts with `_` are libraries, registered as
    /// `mod_id:<name without prefix and extension>` before any patch is
    /// read.  All other files are parsed and queued.  Files are visited in
    /// path order.  `mod_id` becomes a known mod.
    pub fn load_patches_in_directory(&mut self, root: &Path, mod_id: &str) -> LoadReport {
        let mut report = LoadReport::default();
        self.add_known_mod(mod_id);

        let files = match patch_files(root) {
            Ok(files) => files,
            Err(e) => {
                self.logger
                    .error(&format!("Could not read patch directory for {mod_id}: {e}"));
                report.errors += 1;
                return report;
            }
        };
        let (libraries, patches): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|(_, file)| file.starts_with(LIBRARY_PREFIX));

        for (path, file) in libraries {
            let stem = file.strip_prefix(LIBRARY_PREFIX).unwrap_or(file.as_str());
            let name = stem
                .strip_suffix(&format!(".{PATCH_EXTENSION}"))
                .unwrap_or(stem)
                .to_owned();
            let qualified = format!("{mod_id}:{name}");
            match self.parse_file(&path) {
                Ok(patch) => {
                    log::debug!("loaded library {qualified} from {}", path.display());
                    self.libraries
                        .insert(qualified, PatchLibrary::Source(Rc::new(patch)));
                    report.libraries += 1;
                }
                Err(e) => {
                    self.logger
                        .error(&format!("Could not load library: {qualified} due to: {e}"));
                    report.errors += 1;
                }
            }
        }

        for (path, file) in patches {
            match self.parse_file(&path) {
                Ok(patch) => {
                    self.queue(mod_id, &file, patch);
                    report.patches += 1;
                }
                Err(e) => {
                    self.logger
                        .error(&format!("Could not load patch: {mod_id}:{file} due to: {e}"));
                    report.errors += 1;
                }
            }
        }

        self.logger.message(&format!(
            "Loaded {} libraries and {} patches for {mod_id}",
            report.libraries, report.patches
        ));
        report
    }

    /// Parse `source` and queue it as `mod_id:file_name`.
    pub fn load_patch_source(&mut self, mod_id: &str, file_name: &str, source: &str) -> Result<(), SassyError> {
        self.add_known_mod(mod_id);
        match self.parser.parse(source) {
            Ok(patch) => {
                self.queue(mod_id, file_name, patch);
                Ok(())
            }
            Err(e) => {
                let e = e.in_file(format!("{mod_id}:{file_name}"));
                self.logger.error(&format!("Could not load patch: {e}"));
                Err(e)
            }
        }
    }

    /// Parse `source` and register it as the library `mod_id:name`.
    pub fn load_library_source(&mut self, mod_id: &str, name: &str, source: &str) -> Result<(), SassyError> {
        let qualified = format!("{mod_id}:{name}");
        match self.parser.parse(source) {
            Ok(patch) => {
                self.libraries
                    .insert(qualified, PatchLibrary::Source(Rc::new(patch)));
                Ok(())
            }
            Err(e) => {
                self.logger
                    .error(&format!("Could not load library: {qualified} due to: {e}"));
                Err(e.in_file(qualified))
            }
        }
    }

    fn parse_file(&self, path: &Path) -> Result<Patch, SassyError> {
        let source = std::fs::read_to_string(path).map_err(|source| SassyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parser.parse(&source)
    }

    fn queue(&mut self, mod_id: &str, file: &str, patch: Patch) {
        self.to_register.push(QueuedPatch {
            mod_id: mod_id.to_owned(),
            qualified: format!("{mod_id}:{file}"),
            patch,
        });
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Run every queued patch against `docs`, then every staged block.
    ///
    /// Each patch gets a fresh [`GlobalEnvironment`] and root frame.  A patch
    /// that fails stops at the failing statement and its staged blocks are
    /// dropped; the other patches are unaffected.
    pub fn register_all_patches(&mut self, docs: &mut DocumentSet) -> RegistrationReport {
        let queue = std::mem::take(&mut self.to_register);
        let logger = &self.logger;
        let mut report = RegistrationReport::default();
        let mut deferred = Vec::new();

        {
            let mut interp = Interpreter::new(&self.libraries, &self.known_mods, &mut self.stages);
            for queued in &queue {
                let env = Environment::root(GlobalEnvironment::new(queued.mod_id.as_str()));
                match interp.run_patch(&queued.patch, &env, docs) {
                    Ok(()) => {
                        log::debug!("registered {}", queued.qualified);
                        deferred.extend(interp.take_deferred());
                        report.patches_run += 1;
                    }
                    Err(e) => {
                        interp.take_deferred();
                        logger.error(&format!(
                            "Could not run patch: {} due to: {e}",
                            queued.qualified
                        ));
                        report.errors += 1;
                    }
                }
            }
            report.blocks_applied += interp.blocks_applied;
            report.blocks_skipped += interp.blocks_skipped;
        }

        let (ready, undefined) = self.stages.schedule(deferred);
        for block in &undefined {
            logger.error(&format!(
                "Stage {} used by {} at {} is not defined",
                block.stage, block.mod_id, block.block.at
            ));
            report.errors += 1;
        }

        let mut interp = Interpreter::new(&self.libraries, &self.known_mods, &mut self.stages);
        for block in &ready {
            match interp.run_deferred(block, docs) {
                Ok(()) => report.deferred_run += 1,
                Err(e) => {
                    logger.error(&format!(
                        "Could not run stage {} block of {}: {e}",
                        block.stage, block.mod_id
                    ));
                    report.errors += 1;
                }
            }
        }
        report.blocks_applied += interp.blocks_applied;

        logger.message(&format!(
            "Registered {} patches: {} blocks applied, {} staged, {} errors",
            report.patches_run, report.blocks_applied, report.deferred_run, report.errors
        ));
        report
    }
}

/// Every patch file under `root` as `(path, file name)`, sorted by path.
fn patch_files(root: &Path) -> Result<Vec<(PathBuf, String)>, SassyError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| SassyError::Io {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PATCH_EXTENSION) {
            continue;
        }
        let file = entry.file_name().to_string_lossy().into_owned();
        files.push((path.to_path_buf(), file));
    }
    Ok(files)
}
