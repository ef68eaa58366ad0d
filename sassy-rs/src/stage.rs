//! Execution stages.
//!
//! `@define-stage "name": priority;` writes into a [`StageTable`] shared by
//! every patch of a registration run; stage names are global.  Blocks marked
//! `@stage "name"` are queued as [`DeferredBlock`]s and run after every patch
//! has been evaluated, in ascending priority.  Equal priorities keep the order
//! in which the blocks were queued.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::SelectionBlock;
use crate::env::Environment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub priority: u64,
    /// Mod whose patch wrote the current priority.
    pub defined_by: String,
}

/// A redefinition that changed a stage's priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redefinition {
    pub stage: String,
    pub previous: StageDefinition,
    pub current: StageDefinition,
}

/// Stage name → priority, last writer wins.
#[derive(Debug, Default, Clone)]
pub struct StageTable {
    stages: HashMap<String, StageDefinition>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition.  Returns the overwritten entry if the priority
    /// changed.
    pub fn define(&mut self, name: &str, priority: u64, mod_id: &str) -> Option<Redefinition> {
        let current = StageDefinition {
            priority,
            defined_by: mod_id.to_owned(),
        };
        let previous = self.stages.insert(name.to_owned(), current.clone())?;
        (previous.priority != priority).then(|| Redefinition {
            stage: name.to_owned(),
            previous,
            current,
        })
    }

    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.get(name)
    }

    pub fn priority(&self, name: &str) -> Option<u64> {
        self.get(name).map(|d| d.priority)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names sorted by priority, then name.
    pub fn names_in_order(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stages.keys().map(String::as_str).collect();
        names.sort_by_key(|n| (self.priority(n), *n));
        names
    }

    /// Order deferred blocks for execution.
    ///
    /// Returns the runnable blocks (ascending priority, stable) and the blocks
    /// whose stage was never defined.
    pub fn schedule(&self, deferred: Vec<DeferredBlock>) -> (Vec<DeferredBlock>, Vec<DeferredBlock>) {
        let (mut ready, undefined): (Vec<_>, Vec<_>) = deferred
            .into_iter()
            .partition(|d| self.stages.contains_key(&d.stage));
        ready.sort_by_key(|d| self.priority(&d.stage));
        (ready, undefined)
    }
}

/// A selection block waiting for its stage.
#[derive(Debug, Clone)]
pub struct DeferredBlock {
    pub mod_id: String,
    pub stage: String,
    pub block: Rc<SelectionBlock>,
    /// Frame the block was encountered in; its variables stay visible.
    pub env: Rc<Environment>,
}
