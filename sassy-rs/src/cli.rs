//! Command-line argument parsing.
//!
//! Usage:
//!   sassy <manifest> [-o <dir>] [--known-mod <guid>]... [-v]...

use std::path::PathBuf;

use clap::{ArgAction, Parser};

// ── Public types ──────────────────────────────────────────────────────────────

/// Apply Sassy patches to JSON documents.
#[derive(Debug, Parser)]
#[command(name = "sassy", version, about = "Apply Sassy patches to JSON documents")]
pub struct CliArgs {
    /// Manifest listing mods, known mods and documents.
    pub manifest: PathBuf,

    /// Directory for patched documents; stdout when absent.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Extra mod identifier treated as installed (repeatable).
    #[arg(long = "known-mod", value_name = "GUID")]
    pub known_mods: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    /// Default log filter for the verbosity flags; `RUST_LOG` overrides it.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`; exits with usage on error.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Parse a slice of argument strings, without the program name (exposed for
/// testing).
pub fn parse_argv(argv: &[&str]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("sassy").chain(argv.iter().copied()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
