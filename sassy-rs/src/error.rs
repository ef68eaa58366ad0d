//! Error taxonomy.
//!
//! Value-level operations and native functions fail with a [`RuntimeError`],
//! which carries no position.  The interpreter attaches the [`Coordinate`] of
//! the node being evaluated, producing [`SassyError::Runtime`].  Everything
//! that crosses a file boundary (parse, library import, registration) is
//! wrapped in [`SassyError::Load`] so the host can report the file name.

use std::fmt;
use std::path::PathBuf;

/// A 1-based line/column position in a patch source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl Coordinate {
    pub fn new(line: usize, column: usize) -> Self {
        Coordinate { line, column }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An evaluation failure, independent of where it happened.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{0}")]
    TypeConversion(String),

    #[error("cannot {op} values of type {lhs} and {rhs}")]
    BinaryType {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("cannot {op} a value of type {operand}")]
    UnaryType {
        op: &'static str,
        operand: &'static str,
    },

    #[error("{index} is out of range of the {target} being indexed (length {len})")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        target: &'static str,
    },

    #[error("{0} is not a key found in the dictionary being indexed")]
    KeyNotFound(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("repeating {len} element(s) {count} times exceeds the limit of {limit}")]
    RepeatTooLarge { len: usize, count: i64, limit: usize },

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("undefined function {0}()")]
    UndefinedFunction(String),

    #[error("undefined mixin {0}")]
    UndefinedMixin(String),

    #[error("{name} expects {expected} argument(s) but was given {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("{function}: argument {index} must be {expected}, not {found}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown library {0}")]
    UnknownLibrary(String),

    #[error("stage attribute on nested selection block (stage {0})")]
    NestedStage(String),

    #[error("maximum call depth of {0} exceeded")]
    RecursionLimit(usize),

    #[error("{0}")]
    Native(String),
}

/// Any error the engine reports to its host.
#[derive(Debug, thiserror::Error)]
pub enum SassyError {
    #[error("{at}: syntax error: {message}")]
    Syntax { at: Coordinate, message: String },

    #[error("{at}: {error}")]
    Runtime { at: Coordinate, error: RuntimeError },

    #[error("{file}: {source}")]
    Load {
        file: String,
        #[source]
        source: Box<SassyError>,
    },

    #[error("no ruleset matches label {0:?}")]
    NoRuleset(String),

    #[error("invalid document {name}: {message}")]
    Document { name: String, message: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SassyError {
    pub fn syntax(at: Coordinate, message: impl Into<String>) -> Self {
        SassyError::Syntax {
            at,
            message: message.into(),
        }
    }

    pub fn runtime(at: Coordinate, error: RuntimeError) -> Self {
        SassyError::Runtime { at, error }
    }

    /// Wrap this error with the qualified name of the file it came from.
    pub fn in_file(self, file: impl Into<String>) -> Self {
        SassyError::Load {
            file: file.into(),
            source: Box::new(self),
        }
    }

    /// The innermost runtime error, if this is (or wraps) one.
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            SassyError::Runtime { error, .. } => Some(error),
            SassyError::Load { source, .. } => source.runtime_error(),
            _ => None,
        }
    }
}

/// Attach a position to a bare runtime error.
pub(crate) trait At<T> {
    fn at(self, at: Coordinate) -> Result<T, SassyError>;
}

impl<T> At<T> for Result<T, RuntimeError> {
    fn at(self, at: Coordinate) -> Result<T, SassyError> {
        self.map_err(|error| SassyError::runtime(at, error))
    }
}
