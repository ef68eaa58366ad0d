//! Lexical environments.
//!
//! Every patch evaluates inside its own [`GlobalEnvironment`] (mod id and
//! imported libraries) and a chain of [`Environment`] frames rooted there.
//! Frames are shared with `Rc` and mutated through `RefCell`: evaluation is
//! single-threaded and a frame is never borrowed across a call back into the
//! interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Function, Mixin};
use crate::value::Value;

/// Per-patch state shared by all of the patch's frames.
#[derive(Debug)]
pub struct GlobalEnvironment {
    mod_id: String,
    imports: RefCell<Vec<String>>,
}

impl GlobalEnvironment {
    pub fn new(mod_id: impl Into<String>) -> Rc<Self> {
        Rc::new(GlobalEnvironment {
            mod_id: mod_id.into(),
            imports: RefCell::new(Vec::new()),
        })
    }

    pub fn mod_id(&self) -> &str {
        &self.mod_id
    }

    /// Record an imported library; returns false if it was already imported.
    pub fn add_import(&self, library: &str) -> bool {
        let mut imports = self.imports.borrow_mut();
        if imports.iter().any(|l| l == library) {
            return false;
        }
        imports.push(library.to_owned());
        true
    }

    /// Imported library names, most recent first.
    pub fn imports_newest_first(&self) -> Vec<String> {
        self.imports.borrow().iter().rev().cloned().collect()
    }
}

/// One lexical frame.
#[derive(Debug)]
pub struct Environment {
    parent: Option<Rc<Environment>>,
    global: Rc<GlobalEnvironment>,
    variables: RefCell<HashMap<String, Value>>,
    functions: RefCell<HashMap<String, Rc<Function>>>,
    mixins: RefCell<HashMap<String, Rc<Mixin>>>,
}

impl Environment {
    /// The root frame of a patch.
    pub fn root(global: Rc<GlobalEnvironment>) -> Rc<Self> {
        Rc::new(Environment {
            parent: None,
            global,
            variables: RefCell::default(),
            functions: RefCell::default(),
            mixins: RefCell::default(),
        })
    }

    /// A new frame whose lookups fall back to `self`.
    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Environment {
            parent: Some(Rc::clone(self)),
            global: Rc::clone(&self.global),
            variables: RefCell::default(),
            functions: RefCell::default(),
            mixins: RefCell::default(),
        })
    }

    /// The outermost frame of this chain.
    pub fn root_frame(self: &Rc<Self>) -> Rc<Self> {
        let mut frame = self;
        while let Some(parent) = &frame.parent {
            frame = parent;
        }
        Rc::clone(frame)
    }

    pub fn global(&self) -> &Rc<GlobalEnvironment> {
        &self.global
    }

    pub fn mod_id(&self) -> &str {
        self.global.mod_id()
    }

    /// Bind a variable in this frame, shadowing any outer binding.
    pub fn define_var(&self, name: &str, value: Value) {
        self.variables.borrow_mut().insert(name.to_owned(), value);
    }

    pub fn lookup_var(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(v) = env.variables.borrow().get(name) {
                return Some(v.clone());
            }
            frame = env.parent.as_deref();
        }
        None
    }

    pub fn define_function(&self, function: Rc<Function>) {
        self.functions
            .borrow_mut()
            .insert(function.name.clone(), function);
    }

    /// Find a function and the frame that declared it; calls are parented on
    /// that frame.
    pub fn lookup_function(self: &Rc<Self>, name: &str) -> Option<(Rc<Function>, Rc<Environment>)> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(f) = env.functions.borrow().get(name) {
                return Some((Rc::clone(f), Rc::clone(env)));
            }
            frame = env.parent.as_ref();
        }
        None
    }

    pub fn define_mixin(&self, mixin: Rc<Mixin>) {
        self.mixins.borrow_mut().insert(mixin.name.clone(), mixin);
    }

    pub fn lookup_mixin(self: &Rc<Self>, name: &str) -> Option<(Rc<Mixin>, Rc<Environment>)> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(m) = env.mixins.borrow().get(name) {
                return Some((Rc::clone(m), Rc::clone(env)));
            }
            frame = env.parent.as_ref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Coordinate;

    fn function(name: &str) -> Rc<Function> {
        Rc::new(Function {
            at: Coordinate::default(),
            name: name.into(),
            params: Vec::new(),
            body: Vec::new(),
        })
    }

    #[test]
    fn lookup_walks_outward_and_child_shadows() {
        let root = Environment::root(GlobalEnvironment::new("mymod"));
        root.define_var("x", Value::Integer(1));
        root.define_var("y", Value::Integer(2));
        let inner = root.child();
        inner.define_var("x", Value::Integer(10));

        assert_eq!(inner.lookup_var("x"), Some(Value::Integer(10)));
        assert_eq!(inner.lookup_var("y"), Some(Value::Integer(2)));
        assert_eq!(root.lookup_var("x"), Some(Value::Integer(1)));
        assert_eq!(inner.lookup_var("z"), None);
        assert_eq!(inner.mod_id(), "mymod");
    }

    #[test]
    fn function_lookup_returns_declaring_frame() {
        let root = Environment::root(GlobalEnvironment::new("m"));
        root.define_function(function("f"));
        let inner = root.child().child();
        let (f, frame) = inner.lookup_function("f").expect("found");
        assert_eq!(f.name, "f");
        assert!(Rc::ptr_eq(&frame, &root));
        assert!(inner.lookup_function("g").is_none());
        assert!(inner.lookup_mixin("f").is_none());
    }

    #[test]
    fn imports_are_unique_and_newest_first() {
        let g = GlobalEnvironment::new("m");
        assert!(g.add_import("a:one"));
        assert!(g.add_import("b:two"));
        assert!(!g.add_import("a:one"));
        assert_eq!(g.imports_newest_first(), vec!["b:two", "a:one"]);
    }
}
