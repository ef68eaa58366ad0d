//! Sassy Patching: a selector-driven patch language for mod data trees.
//!
//! Patches select nodes of host documents with CSS-like selectors and set,
//! merge or delete their fields.  A [`Universe`] loads patch sources, then
//! [`Universe::register_all_patches`] runs them against a [`DocumentSet`].

pub mod ast;
pub mod builtins;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod expr;
pub mod interp;
pub mod json;
pub mod library;
pub mod parser;
pub mod selectable;
pub mod selector;
pub mod stage;
pub mod universe;
pub mod value;

pub use error::{Coordinate, RuntimeError, SassyError};
pub use json::{JsonNode, JsonRuleset};
pub use library::{NativeLibrary, PatchLibrary};
pub use parser::{parse_patch, PatchParser, SassyParser};
pub use selectable::{Document, DocumentSet, NodePath, Selectable};
pub use universe::{LoadReport, Logger, RegistrationReport, Ruleset, Universe};
pub use value::Value;
