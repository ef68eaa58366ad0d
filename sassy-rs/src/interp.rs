//! Patch interpreter.
//!
//! The [`Interpreter`] executes parsed [`Patch`] trees against a
//! [`DocumentSet`].  Expressions go through [`eval_expr`] with a [`Scope`]
//! that resolves variables along the current [`Environment`] chain and routes
//! calls to user functions, imported libraries and the builtins.
//!
//! Selection blocks collect their targets before running any statement, so a
//! block never sees nodes it creates itself.  Blocks carrying `@stage` are
//! queued instead of run; the registration driver runs them later through
//! [`Interpreter::run_deferred`].

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    Conditional, Else, Expr, FunctionStatement, Parameter, Patch, SelectionBlock,
    SelectorAttribute, SelectorStatement, TopLevel,
};
use crate::builtins;
use crate::env::Environment;
use crate::error::{At, Coordinate, RuntimeError, SassyError};
use crate::expr::{eval_expr, EvalContext};
use crate::library::PatchLibrary;
use crate::selectable::{DocumentSet, NodePath};
use crate::selector::{collect_targets, Target};
use crate::stage::{DeferredBlock, StageTable};
use crate::value::Value;

/// Maximum nesting of function and mixin calls.
pub const MAX_CALL_DEPTH: usize = 256;

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error signals that unwind a function body.
#[derive(Debug)]
pub enum ControlFlow {
    Return(Value),
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// An [`EvalContext`] bound to one environment frame.
struct Scope<'a, 'u> {
    interp: &'a Interpreter<'u>,
    env: &'a Rc<Environment>,
}

impl EvalContext for Scope<'_, '_> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.env.lookup_var(name)
    }

    fn call_fn(&self, at: Coordinate, name: &str, args: Vec<Value>) -> Result<Value, SassyError> {
        self.interp.call_function(at, name, args, self.env)
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter<'u> {
    libraries: &'u HashMap<String, PatchLibrary>,
    builtins: Vec<&'u PatchLibrary>,
    known_mods: &'u [String],
    stages: &'u mut StageTable,
    deferred: Vec<DeferredBlock>,
    depth: Cell<usize>,
    /// Selection blocks that ran against their targets.
    pub blocks_applied: usize,
    /// Selection blocks skipped by a mod gate.
    pub blocks_skipped: usize,
}

impl<'u> Interpreter<'u> {
    pub fn new(
        libraries: &'u HashMap<String, PatchLibrary>,
        known_mods: &'u [String],
        stages: &'u mut StageTable,
    ) -> Self {
        let builtins = builtins::LIBRARIES
            .iter()
            .filter_map(|name| libraries.get(*name))
            .collect();
        Interpreter {
            libraries,
            builtins,
            known_mods,
            stages,
            deferred: Vec::new(),
            depth: Cell::new(0),
            blocks_applied: 0,
            blocks_skipped: 0,
        }
    }

    /// Drain the blocks queued by `@stage` so far.
    pub fn take_deferred(&mut self) -> Vec<DeferredBlock> {
        std::mem::take(&mut self.deferred)
    }

    // ── Top level ─────────────────────────────────────────────────────────────

    /// Execute every statement of `patch` in `env`, normally a fresh root frame.
    pub fn run_patch(
        &mut self,
        patch: &Patch,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
    ) -> Result<(), SassyError> {
        for stmt in &patch.statements {
            self.exec_top(stmt, env, docs, None)?;
        }
        Ok(())
    }

    /// Run a block whose stage has been reached.
    pub fn run_deferred(&mut self, deferred: &DeferredBlock, docs: &mut DocumentSet) -> Result<(), SassyError> {
        log::debug!(
            "{}: running block at {} for stage {}",
            deferred.mod_id,
            deferred.block.at,
            deferred.stage
        );
        self.apply_block(&deferred.block, &deferred.env, docs, None)
    }

    /// `library` names the source library being imported, if any; selection
    /// blocks are not allowed there.
    fn exec_top(
        &mut self,
        stmt: &TopLevel,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
        library: Option<&str>,
    ) -> Result<(), SassyError> {
        match stmt {
            TopLevel::Import { at, library: name } => self.import(*at, name, env, docs),
            TopLevel::Variable(decl) => {
                let v = self.eval(&decl.value, env)?;
                env.define_var(&decl.name, v);
                Ok(())
            }
            TopLevel::Stage { name, priority, .. } => {
                if let Some(redef) = self.stages.define(name, *priority, env.mod_id()) {
                    log::warn!(
                        "stage {} redefined by {} with priority {} (was {} from {})",
                        redef.stage,
                        redef.current.defined_by,
                        redef.current.priority,
                        redef.previous.priority,
                        redef.previous.defined_by
                    );
                }
                Ok(())
            }
            TopLevel::Function(f) => {
                env.define_function(Rc::clone(f));
                Ok(())
            }
            TopLevel::Mixin(m) => {
                env.define_mixin(Rc::clone(m));
                Ok(())
            }
            TopLevel::Conditional(c) => {
                if let Some(body) = self.choose(c, env)? {
                    let frame = env.child();
                    for s in body {
                        self.exec_top(s, &frame, docs, library)?;
                    }
                }
                Ok(())
            }
            TopLevel::Selection(block) => match library {
                Some(lib) => {
                    log::warn!("{lib}: ignoring selection block at {} in library", block.at);
                    Ok(())
                }
                None => self.exec_selection(block, env, docs, None),
            },
        }
    }

    /// `@use "mod:name";`
    fn import(
        &mut self,
        at: Coordinate,
        name: &str,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
    ) -> Result<(), SassyError> {
        let libraries: &'u HashMap<String, PatchLibrary> = self.libraries;
        let library = libraries
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownLibrary(name.to_owned()))
            .at(at)?;
        if !env.global().add_import(name) {
            return Ok(());
        }
        log::debug!("{}: imported {name}", env.mod_id());
        match library {
            PatchLibrary::Native(_) => Ok(()),
            PatchLibrary::Source(patch) => {
                let root = env.root_frame();
                for stmt in &patch.statements {
                    self.exec_top(stmt, &root, docs, Some(name))
                        .map_err(|e| e.in_file(name))?;
                }
                Ok(())
            }
        }
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    /// Gate, defer, or apply a selection block.  `context` is the node the
    /// enclosing block is running against, for nested blocks.
    fn exec_selection(
        &mut self,
        block: &Rc<SelectionBlock>,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
        context: Option<&NodePath>,
    ) -> Result<(), SassyError> {
        if let Some(stage) = block.stage() {
            if context.is_some() {
                return Err(RuntimeError::NestedStage(stage.to_owned())).at(block.at);
            }
        }
        if !self.gates_pass(block) {
            log::debug!("{}: block at {} skipped by mod gate", env.mod_id(), block.at);
            self.blocks_skipped += 1;
            return Ok(());
        }
        if let Some(stage) = block.stage() {
            log::debug!("{}: deferring block at {} to stage {stage}", env.mod_id(), block.at);
            self.deferred.push(DeferredBlock {
                mod_id: env.mod_id().to_owned(),
                stage: stage.to_owned(),
                block: Rc::clone(block),
                env: Rc::clone(env),
            });
            return Ok(());
        }
        self.apply_block(block, env, docs, context)
    }

    /// True unless a `@require`/`@require-not` attribute rules the block out.
    fn gates_pass(&self, block: &SelectionBlock) -> bool {
        let known = |guid: &str| self.known_mods.iter().any(|m| m == guid);
        block.attributes.iter().all(|attr| match attr {
            SelectorAttribute::RequireMod { guid, .. } => known(guid),
            SelectorAttribute::RequireNotMod { guid, .. } => !known(guid),
            SelectorAttribute::RunAtStage { .. } => true,
        })
    }

    /// Run the block's body against each of its targets.
    fn apply_block(
        &mut self,
        block: &SelectionBlock,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
        context: Option<&NodePath>,
    ) -> Result<(), SassyError> {
        let targets = collect_targets(&block.selector, docs, context);
        for target in targets {
            let path = match target {
                Target::Existing(path) => path,
                Target::Insert { parent, element } => {
                    let Some(node) = docs.node_mut(&parent) else {
                        continue;
                    };
                    let index = node.add_child(&element);
                    parent.child(index)
                }
            };
            let frame = env.child();
            self.exec_statements(&block.body, &frame, docs, &path)?;
        }
        self.blocks_applied += 1;
        Ok(())
    }

    fn exec_statements(
        &mut self,
        body: &[SelectorStatement],
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
        node: &NodePath,
    ) -> Result<(), SassyError> {
        for stmt in body {
            self.exec_statement(stmt, env, docs, node)?;
        }
        Ok(())
    }

    fn exec_statement(
        &mut self,
        stmt: &SelectorStatement,
        env: &Rc<Environment>,
        docs: &mut DocumentSet,
        node: &NodePath,
    ) -> Result<(), SassyError> {
        match stmt {
            SelectorStatement::SetValue {
                at,
                field,
                indices,
                value,
            } => {
                let path = self.eval_args(indices, env)?;
                let current = current_value(docs, node, field, &path).at(*at)?;
                let v = self.eval_with_value(value, env, current)?;
                store(docs, node, field, &path, Some(v)).at(*at)
            }
            SelectorStatement::MergeValue {
                at,
                field,
                indices,
                value,
            } => {
                let path = self.eval_args(indices, env)?;
                let current = current_value(docs, node, field, &path).at(*at)?;
                let v = self.eval_with_value(value, env, current.clone())?;
                store(docs, node, field, &path, Some(current.merged(v))).at(*at)
            }
            SelectorStatement::DeleteValue { at, field, indices } => {
                let path = self.eval_args(indices, env)?;
                store(docs, node, field, &path, None).at(*at)
            }
            SelectorStatement::Variable(decl) => {
                let v = self.eval(&decl.value, env)?;
                env.define_var(&decl.name, v);
                Ok(())
            }
            SelectorStatement::Include { at, mixin, args } => {
                let (m, closure) = env
                    .lookup_mixin(mixin)
                    .ok_or_else(|| RuntimeError::UndefinedMixin(mixin.clone()))
                    .at(*at)?;
                let args = self.eval_args(args, env)?;
                let frame = closure.child();
                self.bind_params(*at, &m.name, &m.params, args, &frame)?;
                self.enter(*at)?;
                let result = self.exec_statements(&m.body, &frame, docs, node);
                self.leave();
                result
            }
            SelectorStatement::Conditional(c) => {
                if let Some(body) = self.choose(c, env)? {
                    let frame = env.child();
                    self.exec_statements(body, &frame, docs, node)?;
                }
                Ok(())
            }
            SelectorStatement::Selection(block) => self.exec_selection(block, env, docs, Some(node)),
        }
    }

    /// Evaluate `expr` with `$value` bound to `current`.
    fn eval_with_value(&self, expr: &Expr, env: &Rc<Environment>, current: Value) -> Result<Value, SassyError> {
        let frame = env.child();
        frame.define_var("value", current);
        self.eval(expr, &frame)
    }

    // ── Expressions and calls ─────────────────────────────────────────────────

    pub fn eval(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, SassyError> {
        eval_expr(expr, &Scope { interp: self, env })
    }

    fn eval_args(&self, args: &[Expr], env: &Rc<Environment>) -> Result<Vec<Value>, SassyError> {
        args.iter().map(|a| self.eval(a, env)).collect()
    }

    /// Evaluate the guards of an `@if`/`@else` chain and return the body of
    /// the branch to run.
    fn choose<'c, S>(
        &self,
        cond: &'c Conditional<S>,
        env: &Rc<Environment>,
    ) -> Result<Option<&'c [S]>, SassyError> {
        let mut c = cond;
        loop {
            if self.eval(&c.condition, env)?.truthy() {
                return Ok(Some(c.body.as_slice()));
            }
            match c.otherwise.as_deref() {
                None => return Ok(None),
                Some(Else::Block(block)) => return Ok(Some(block.body.as_slice())),
                Some(Else::If(next)) => c = next,
            }
        }
    }

    /// Count one more nested call; every successful `enter` is paired with
    /// a `leave`.
    fn enter(&self, at: Coordinate) -> Result<(), SassyError> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit(MAX_CALL_DEPTH)).at(at);
        }
        self.depth.set(depth + 1);
        Ok(())
    }

    fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    /// Bind call arguments to parameters in `frame`; missing arguments take
    /// their declared default, evaluated in `frame` so earlier parameters are
    /// visible.
    fn bind_params(
        &self,
        at: Coordinate,
        name: &str,
        params: &[Parameter],
        args: Vec<Value>,
        frame: &Rc<Environment>,
    ) -> Result<(), SassyError> {
        let arity_error = |found: usize| {
            let required = params.iter().take_while(|p| p.default.is_none()).count();
            let expected = if required == params.len() {
                params.len().to_string()
            } else {
                format!("{required} to {}", params.len())
            };
            Err(RuntimeError::ArityMismatch {
                name: name.to_owned(),
                expected,
                found,
            })
            .at(at)
        };
        let found = args.len();
        if found > params.len() {
            return arity_error(found);
        }
        let mut args = args.into_iter();
        for param in params {
            let value = match (args.next(), &param.default) {
                (Some(v), _) => v,
                (None, Some(default)) => self.eval(default, frame)?,
                (None, None) => return arity_error(found),
            };
            frame.define_var(&param.name, value);
        }
        Ok(())
    }

    /// Resolve and invoke a function: lexical frames first, then imported
    /// libraries (newest import first), then the builtins.
    fn call_function(
        &self,
        at: Coordinate,
        name: &str,
        args: Vec<Value>,
        env: &Rc<Environment>,
    ) -> Result<Value, SassyError> {
        if let Some((f, closure)) = env.lookup_function(name) {
            let frame = closure.child();
            self.bind_params(at, &f.name, &f.params, args, &frame)?;
            self.enter(at)?;
            let result = self.exec_function_body(&f.body, &frame);
            self.leave();
            return match result? {
                Some(ControlFlow::Return(v)) => Ok(v),
                None => Ok(Value::Null),
            };
        }
        let imported: Vec<&PatchLibrary> = env
            .global()
            .imports_newest_first()
            .iter()
            .filter_map(|lib| self.libraries.get(lib))
            .collect();
        for lib in imported.into_iter().chain(self.builtins.iter().copied()) {
            if let Some(native) = lib.native_fn(name) {
                return native(&args).at(at);
            }
        }
        Err(RuntimeError::UndefinedFunction(name.to_owned())).at(at)
    }

    fn exec_function_body(
        &self,
        body: &[FunctionStatement],
        env: &Rc<Environment>,
    ) -> Result<Option<ControlFlow>, SassyError> {
        for stmt in body {
            match stmt {
                FunctionStatement::Variable(decl) => {
                    let v = self.eval(&decl.value, env)?;
                    env.define_var(&decl.name, v);
                }
                FunctionStatement::Return { value, .. } => {
                    return Ok(Some(ControlFlow::Return(self.eval(value, env)?)));
                }
                FunctionStatement::Conditional(c) => {
                    if let Some(branch) = self.choose(c, env)? {
                        let frame = env.child();
                        if let Some(cf) = self.exec_function_body(branch, &frame)? {
                            return Ok(Some(cf));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

// ── Field access ──────────────────────────────────────────────────────────────

/// The current value of `field[path…]` on `node`; an absent field is `null`.
fn current_value(docs: &DocumentSet, node: &NodePath, field: &str, path: &[Value]) -> Result<Value, RuntimeError> {
    docs.node(node)
        .and_then(|n| n.get_field(field))
        .unwrap_or_default()
        .get_path(path)
}

/// Write `value` to `field[path…]` on `node`, or delete it when `value` is
/// `None`.  Deleting inside an absent field is a no-op.
fn store(
    docs: &mut DocumentSet,
    node: &NodePath,
    field: &str,
    path: &[Value],
    value: Option<Value>,
) -> Result<(), RuntimeError> {
    let Some(n) = docs.node_mut(node) else {
        return Ok(());
    };
    if path.is_empty() {
        match value {
            Some(v) => n.set_field(field, v),
            None => {
                n.delete_field(field);
            }
        }
        return Ok(());
    }
    let Some(mut whole) = n.get_field(field) else {
        return match value {
            Some(_) => Value::Null.set_path(path, value),
            None => Ok(()),
        };
    };
    whole.set_path(path, value)?;
    n.set_field(field, whole);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::GlobalEnvironment;
    use crate::json::JsonNode;
    use crate::library::NativeLibrary;
    use crate::parser::parse_patch;
    use crate::selectable::{Document, Selectable};

    struct Fixture {
        libraries: HashMap<String, PatchLibrary>,
        known_mods: Vec<String>,
        stages: StageTable,
        docs: DocumentSet,
    }

    impl Fixture {
        fn new() -> Self {
            let mut libraries = HashMap::new();
            for (name, lib) in builtins::libraries() {
                libraries.insert(name.to_owned(), PatchLibrary::Native(lib));
            }
            let mut root = JsonNode::new("part", "engine").with_ruleset("parts");
            root.set_field("mass", Value::Real(1.5));
            root.set_field("tags", Value::List(vec![Value::from("a")]));
            let mut tank = JsonNode::new("module", "tank");
            tank.set_field("capacity", Value::Integer(100));
            root.push_child(tank);
            root.push_child(JsonNode::new("module", "gimbal"));
            let mut docs = DocumentSet::new();
            docs.push(Document::new("parts_data", "engine", Box::new(root)));
            Fixture {
                libraries,
                known_mods: vec!["present".into()],
                stages: StageTable::new(),
                docs,
            }
        }

        fn run(&mut self, src: &str) -> Result<Vec<DeferredBlock>, SassyError> {
            let patch = parse_patch(src).expect("parse failed");
            let mut interp = Interpreter::new(&self.libraries, &self.known_mods, &mut self.stages);
            let env = Environment::root(GlobalEnvironment::new("test"));
            interp.run_patch(&patch, &env, &mut self.docs)?;
            Ok(interp.take_deferred())
        }

        fn field(&self, steps: &[usize], key: &str) -> Option<Value> {
            let path = NodePath {
                doc: 0,
                steps: steps.to_vec(),
            };
            self.docs.node(&path).and_then(|n| n.get_field(key))
        }

        fn child_count(&self, steps: &[usize]) -> usize {
            let path = NodePath {
                doc: 0,
                steps: steps.to_vec(),
            };
            self.docs.node(&path).map_or(0, |n| n.child_count())
        }
    }

    fn runtime_error(err: SassyError) -> RuntimeError {
        err.runtime_error().cloned().expect("runtime error")
    }

    #[test]
    fn indexed_fields() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            part {
                resources: { "fuel": 100, "mix": [1, 2, 3] };
                resources["fuel"]: $value / 2;
                resources["ox"]: 20;
                resources["mix"][1]: $value + 10;
                resources["mix"] +: [4];
                resources["mix"][0]: @delete;
                tags[0]: "first";
                nothing["k"]: @delete;
            }
            "#,
        )
        .unwrap();
        let mut expected = crate::value::Dictionary::new();
        expected.insert("fuel".into(), Value::Integer(50));
        expected.insert(
            "mix".into(),
            Value::List(vec![Value::Integer(12), Value::Integer(3), Value::Integer(4)]),
        );
        expected.insert("ox".into(), Value::Integer(20));
        assert_eq!(fx.field(&[], "resources"), Some(Value::Dictionary(expected)));
        assert_eq!(fx.field(&[], "tags"), Some(Value::List(vec![Value::from("first")])));
        assert_eq!(fx.field(&[], "nothing"), None);
    }

    #[test]
    fn indexed_field_errors_carry_position() {
        let mut fx = Fixture::new();
        let err = fx.run("part {\n  tags[5]: 1;\n}").unwrap_err();
        assert!(matches!(err, SassyError::Runtime { at, .. } if at.line == 2));
        assert!(matches!(runtime_error(err), RuntimeError::IndexOutOfRange { index: 5, len: 1, .. }));

        let mut fx = Fixture::new();
        let err = fx.run("part { mass[\"x\"]: 1; }").unwrap_err();
        assert!(matches!(runtime_error(err), RuntimeError::BinaryType { op: "subscript", lhs: "real", .. }));

        let mut fx = Fixture::new();
        let err = fx.run("part { absent[0]: 1; }").unwrap_err();
        assert!(matches!(runtime_error(err), RuntimeError::BinaryType { lhs: "null", .. }));
    }

    #[test]
    fn set_merge_delete() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            part {
                mass: $value * 2;
                tags +: ["b"];
                cost +: 10;
                mass-old: @delete;
            }
            #tank { capacity: @delete; missing: @delete; }
            "#,
        )
        .unwrap();
        assert_eq!(fx.field(&[], "mass"), Some(Value::Real(3.0)));
        assert_eq!(
            fx.field(&[], "tags"),
            Some(Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(fx.field(&[], "cost"), Some(Value::Integer(10)));
        assert_eq!(fx.field(&[0], "capacity"), None);
    }

    #[test]
    fn value_is_null_for_absent_field() {
        let mut fx = Fixture::new();
        fx.run("#gimbal { seen: typeof($value); }").unwrap();
        assert_eq!(fx.field(&[1], "seen"), Some(Value::from("null")));
    }

    #[test]
    fn functions_mixins_and_defaults() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            $scale: 3;
            @function scaled($x, $k: $scale) {
                @if $x > 50 { @return $x * $k; }
                @return $x;
            }
            @mixin tag($label) { label: $label; }
            #tank { capacity: scaled($value); }
            #gimbal {
                capacity: scaled(10);
                @include tag(name-of-module);
            }
            "#,
        )
        .unwrap();
        assert_eq!(fx.field(&[0], "capacity"), Some(Value::Integer(300)));
        assert_eq!(fx.field(&[1], "capacity"), Some(Value::Integer(10)));
        assert_eq!(fx.field(&[1], "label"), Some(Value::from("name-of-module")));
    }

    #[test]
    fn function_without_return_yields_null() {
        let mut fx = Fixture::new();
        fx.run("@function noop() { $x: 1; } part { r: noop(); }").unwrap();
        assert_eq!(fx.field(&[], "r"), Some(Value::Null));
    }

    #[test]
    fn call_errors() {
        let mut fx = Fixture::new();
        let err = fx.run("@function f($a) { @return $a; } part { x: f(); }").unwrap_err();
        assert!(matches!(
            runtime_error(err),
            RuntimeError::ArityMismatch { ref expected, found: 0, .. } if expected == "1"
        ));
        let err = fx.run("part { x: nope(1); }").unwrap_err();
        assert_eq!(runtime_error(err), RuntimeError::UndefinedFunction("nope".into()));
        let err = fx.run("part { @include nope; }").unwrap_err();
        assert_eq!(runtime_error(err), RuntimeError::UndefinedMixin("nope".into()));
        let err = fx.run("@use \"ghost:lib\";").unwrap_err();
        assert_eq!(runtime_error(err), RuntimeError::UnknownLibrary("ghost:lib".into()));
    }

    #[test]
    fn recursion_is_bounded() {
        let mut fx = Fixture::new();
        let err = fx
            .run("@function down($n) { @return down($n + 1); } part { x: down(0); }")
            .unwrap_err();
        assert_eq!(runtime_error(err), RuntimeError::RecursionLimit(MAX_CALL_DEPTH));

        fx.run(
            "@function fact($n) { @if $n <= 1 { @return 1; } @return $n * fact($n - 1); }
             part { f: fact(10); }",
        )
        .unwrap();
        assert_eq!(fx.field(&[], "f"), Some(Value::Integer(3_628_800)));
    }

    #[test]
    fn mod_gates() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            @require "present" part { a: 1; }
            @require "absent" part { b: 1 / 0; }
            @require-not "present" part { c: 1; }
            @require-not "absent" part { d: 1; }
            "#,
        )
        .unwrap();
        assert_eq!(fx.field(&[], "a"), Some(Value::Integer(1)));
        assert_eq!(fx.field(&[], "b"), None);
        assert_eq!(fx.field(&[], "c"), None);
        assert_eq!(fx.field(&[], "d"), Some(Value::Integer(1)));
    }

    #[test]
    fn nested_blocks_and_additions() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            #engine {
                module { touched: true; }
                +module { name: "new"; }
            }
            #tank > +resource { amount: 5; }
            "#,
        )
        .unwrap();
        assert_eq!(fx.field(&[0], "touched"), Some(Value::Boolean(true)));
        assert_eq!(fx.field(&[1], "touched"), Some(Value::Boolean(true)));
        // The added module was created after the nested `module` block ran.
        assert_eq!(fx.child_count(&[]), 3);
        assert_eq!(fx.field(&[2], "touched"), None);
        assert_eq!(fx.field(&[2], "name"), Some(Value::from("new")));
        assert_eq!(fx.child_count(&[0]), 1);
        assert_eq!(fx.field(&[0, 0], "amount"), Some(Value::Integer(5)));
    }

    #[test]
    fn nested_stage_is_an_error() {
        let mut fx = Fixture::new();
        let err = fx.run("part { @stage \"late\" module { a: 1; } }").unwrap_err();
        assert_eq!(runtime_error(err), RuntimeError::NestedStage("late".into()));
    }

    #[test]
    fn staged_blocks_are_deferred() {
        let mut fx = Fixture::new();
        let deferred = fx
            .run(
                r#"
                @define-stage "late": 5;
                $v: 7;
                @stage "late" part { late: $v; }
                part { early: 1; }
                "#,
            )
            .unwrap();
        assert_eq!(fx.field(&[], "late"), None);
        assert_eq!(fx.field(&[], "early"), Some(Value::Integer(1)));
        assert_eq!(fx.stages.priority("late"), Some(5));
        assert_eq!(deferred.len(), 1);

        let mut interp = Interpreter::new(&fx.libraries, &fx.known_mods, &mut fx.stages);
        interp.run_deferred(&deferred[0], &mut fx.docs).unwrap();
        assert_eq!(fx.field(&[], "late"), Some(Value::Integer(7)));
    }

    #[test]
    fn imports_resolve_newest_first() {
        let mut fx = Fixture::new();
        fx.libraries.insert(
            "a:lib".into(),
            PatchLibrary::Native(NativeLibrary::new().with("pick", |_| Ok(Value::from("a")))),
        );
        fx.libraries.insert(
            "b:lib".into(),
            PatchLibrary::Native(NativeLibrary::new().with("pick", |_| Ok(Value::from("b")))),
        );
        fx.run("@use \"a:lib\"; @use \"b:lib\"; part { p: pick(); }").unwrap();
        assert_eq!(fx.field(&[], "p"), Some(Value::from("b")));
        // A native library cannot shadow a user function.
        fx.run("@use \"a:lib\"; @function pick() { @return \"own\"; } part { p: pick(); }")
            .unwrap();
        assert_eq!(fx.field(&[], "p"), Some(Value::from("own")));
    }

    #[test]
    fn source_library_declarations_are_imported() {
        let mut fx = Fixture::new();
        let lib = parse_patch(
            r#"
            $factor: 4;
            @function boost($x) { @return $x * $factor; }
            @mixin mark { marked: true; }
            part { ignored: true; }
            "#,
        )
        .unwrap();
        fx.libraries
            .insert("m:tools".into(), PatchLibrary::Source(Rc::new(lib)));
        fx.run("@use \"m:tools\"; part { mass: boost(2); @include mark; }")
            .unwrap();
        assert_eq!(fx.field(&[], "mass"), Some(Value::Integer(8)));
        assert_eq!(fx.field(&[], "marked"), Some(Value::Boolean(true)));
        assert_eq!(fx.field(&[], "ignored"), None);
    }

    #[test]
    fn conditionals_pick_one_branch() {
        let mut fx = Fixture::new();
        fx.run(
            r#"
            $mode: "b";
            @if $mode == "a" { part { m: 1; } }
            @else if $mode == "b" { part { m: 2; } }
            @else { part { m: 3; } }
            module {
                @if $value == null && false { x: 1; } @else { x: 2; }
            }
            "#,
        )
        .unwrap();
        assert_eq!(fx.field(&[], "m"), Some(Value::Integer(2)));
        assert_eq!(fx.field(&[0], "x"), Some(Value::Integer(2)));
    }

    #[test]
    fn runtime_errors_carry_statement_position() {
        let mut fx = Fixture::new();
        let err = fx.run("part {\n  x: \"a\" - 1;\n}").unwrap_err();
        match err {
            SassyError::Runtime { at, error } => {
                assert_eq!(at.line, 2);
                assert!(matches!(error, RuntimeError::BinaryType { op: "subtract", .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
