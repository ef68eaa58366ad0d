//! Importable libraries.
//!
//! A library is registered once under a qualified `mod:name` and imported by
//! patches with `@use`.  Native libraries carry Rust functions; source
//! libraries carry a parsed patch whose declarations are executed into the
//! importing patch's root frame.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::Patch;
use crate::error::RuntimeError;
use crate::value::Value;

/// The native-function contract.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// A named set of native functions.
#[derive(Clone, Default)]
pub struct NativeLibrary {
    functions: IndexMap<String, NativeFn>,
}

impl NativeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_owned(), Arc::new(f));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum PatchLibrary {
    Native(NativeLibrary),
    Source(Rc<Patch>),
}

impl PatchLibrary {
    /// Look up a native function; source libraries expose theirs through
    /// the importing frame instead.
    pub fn native_fn(&self, name: &str) -> Option<&NativeFn> {
        match self {
            PatchLibrary::Native(lib) => lib.get(name),
            PatchLibrary::Source(_) => None,
        }
    }
}

impl From<NativeLibrary> for PatchLibrary {
    fn from(lib: NativeLibrary) -> Self {
        PatchLibrary::Native(lib)
    }
}
