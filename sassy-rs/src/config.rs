//! Manifest file parser for the `sassy` binary.
//!
//! One directive per line:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `mod <id> <dir>` | load the patches under `<dir>` as mod `<id>` |
//! | `known-mod <guid>` | mark a mod as present for `@require` gates |
//! | `document <label> <path>` | patch the document at `<path>`, converted by the ruleset matching `<label>` |
//! | Lines starting with `;` | comment, ignored |
//!
//! Arguments may be double-quoted to contain spaces.  Relative paths in a
//! manifest read from disk are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error on one manifest line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub id: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub label: String,
    pub path: PathBuf,
}

/// Everything one `sassy` run should do, in manifest order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub mods: Vec<ModEntry>,
    pub known_mods: Vec<String>,
    pub documents: Vec<DocumentEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest string.  Returns the manifest built from the valid
    /// lines and an error for every invalid one.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut manifest = Manifest::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Err(message) = manifest.apply(&split_args(line)) {
                errors.push(ConfigError { line: i + 1, message });
            }
        }

        (manifest, errors)
    }

    /// Read a manifest from disk, resolving relative paths against its
    /// directory.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        let (mut manifest, errors) = Self::load_str(&s);
        if let Some(base) = path.parent() {
            manifest.resolve_against(base);
        }
        Ok((manifest, errors))
    }

    fn resolve_against(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.mods.iter_mut().for_each(|m| resolve(&mut m.dir));
        self.documents.iter_mut().for_each(|d| resolve(&mut d.path));
    }

    fn apply(&mut self, tokens: &[String]) -> Result<(), String> {
        let (directive, args) = tokens
            .split_first()
            .ok_or_else(|| "empty directive".to_owned())?;
        match (directive.as_str(), args) {
            ("mod", [id, dir]) => self.mods.push(ModEntry {
                id: id.clone(),
                dir: PathBuf::from(dir),
            }),
            ("known-mod", [guid]) => {
                if !self.known_mods.contains(guid) {
                    self.known_mods.push(guid.clone());
                }
            }
            ("document", [label, path]) => self.documents.push(DocumentEntry {
                label: label.clone(),
                path: PathBuf::from(path),
            }),
            ("mod", _) => return Err("usage: mod <id> <dir>".into()),
            ("known-mod", _) => return Err("usage: known-mod <guid>".into()),
            ("document", _) => return Err("usage: document <label> <path>".into()),
            (other, _) => return Err(format!("unknown directive {other}")),
        }
        Ok(())
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !cur.is_empty() || quoted {
                    args.push(std::mem::take(&mut cur));
                }
                quoted = false;
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() || quoted {
        args.push(cur);
    }
    args
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_simple() {
        assert_eq!(split_args("mod a ./dir"), ["mod", "a", "./dir"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#"document parts_data "My Parts/engine.json""#), [
            "document",
            "parts_data",
            "My Parts/engine.json"
        ]);
        assert_eq!(split_args(r#"known-mod """#), ["known-mod", ""]);
    }

    #[test]
    fn directives_in_order() {
        let (m, errs) = Manifest::load_str(
            "; mods\n\
             mod core patches/core\n\
             mod extra patches/extra\n\
             known-mod 1234-abcd\n\
             known-mod 1234-abcd\n\
             document parts_data parts/engine.json\n",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(
            m.mods,
            vec![
                ModEntry { id: "core".into(), dir: "patches/core".into() },
                ModEntry { id: "extra".into(), dir: "patches/extra".into() },
            ]
        );
        assert_eq!(m.known_mods, ["1234-abcd"]);
        assert_eq!(m.documents[0].label, "parts_data");
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let (m, errs) = Manifest::load_str("mod onlyid\nfrobnicate x\n\nknown-mod g\n");
        assert_eq!(m.known_mods, ["g"]);
        assert!(m.mods.is_empty());
        assert_eq!(
            errs,
            vec![
                ConfigError { line: 1, message: "usage: mod <id> <dir>".into() },
                ConfigError { line: 2, message: "unknown directive frobnicate".into() },
            ]
        );
        assert_eq!(errs[1].to_string(), "line 2: unknown directive frobnicate");
    }

    #[test]
    fn load_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sassy.manifest");
        std::fs::write(&path, "mod m patches\ndocument parts_data /abs/engine.json\n").unwrap();
        let (m, errs) = Manifest::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(m.mods[0].dir, dir.path().join("patches"));
        assert_eq!(m.documents[0].path, PathBuf::from("/abs/engine.json"));
    }
}
