//! Expression evaluator.
//!
//! Expressions are pure apart from the functions they call: evaluation never
//! touches the document tree, so the evaluator only needs an [`EvalContext`]
//! for variable lookup and function dispatch.
//!
//! Binary operators evaluate the left-hand side first and then ask
//! [`BinaryOp::short_circuit`] whether the right-hand side is needed at all.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::{At, Coordinate, RuntimeError, SassyError};
use crate::value::{Dictionary, Value};

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The [`Interpreter`](crate::interp::Interpreter) implements this over an
/// environment frame so that lookups follow the lexical scope chain.
pub trait EvalContext {
    /// Look up a variable, innermost scope first.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Invoke a user-defined, imported, or builtin function.
    fn call_fn(&self, at: Coordinate, name: &str, args: Vec<Value>) -> Result<Value, SassyError>;
}

// ── Operators ─────────────────────────────────────────────────────────────────

impl BinaryOp {
    /// The value to return without evaluating the right-hand side, if the
    /// left-hand side alone decides the result.
    pub fn short_circuit(self, lhs: &Value) -> Option<Value> {
        match self {
            BinaryOp::And if !lhs.truthy() => Some(Value::Boolean(false)),
            BinaryOp::Or if lhs.truthy() => Some(Value::Boolean(true)),
            _ => None,
        }
    }

    /// Combine two evaluated operands.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        let ordered = |op: &'static str, accept: fn(Ordering) -> bool| {
            lhs.compare(rhs, op)
                .map(|ord| Value::Boolean(ord.is_some_and(accept)))
        };
        match self {
            BinaryOp::Add => lhs.arith_add(rhs),
            BinaryOp::Subtract => lhs.arith_sub(rhs),
            BinaryOp::Multiply => lhs.arith_mul(rhs),
            BinaryOp::Divide => lhs.arith_div(rhs),
            BinaryOp::Modulus => lhs.arith_rem(rhs),
            BinaryOp::Equal => Ok(Value::Boolean(lhs.loose_eq(rhs))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!lhs.loose_eq(rhs))),
            BinaryOp::Less => ordered("compare(<)", Ordering::is_lt),
            BinaryOp::LessEqual => ordered("compare(<=)", Ordering::is_le),
            BinaryOp::Greater => ordered("compare(>)", Ordering::is_gt),
            BinaryOp::GreaterEqual => ordered("compare(>=)", Ordering::is_ge),
            // Reached only when the left-hand side did not short-circuit.
            BinaryOp::And | BinaryOp::Or => Ok(Value::Boolean(rhs.truthy())),
            BinaryOp::Subscript => lhs.subscript(rhs),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulus => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Subscript => "[]",
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given context.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<Value, SassyError> {
    match &expr.kind {
        ExprKind::Literal(v) => Ok(v.clone()),

        ExprKind::Variable(name) => ctx
            .get_var(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()))
            .at(expr.at),

        ExprKind::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(item, ctx)?);
            }
            Ok(Value::List(out))
        }

        ExprKind::Dictionary(entries) => {
            let mut out = Dictionary::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key.clone(), eval_expr(value, ctx)?);
            }
            Ok(Value::Dictionary(out))
        }

        ExprKind::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            match op {
                UnaryOp::Negate => v.arith_neg().at(expr.at),
                UnaryOp::Not => Ok(Value::Boolean(!v.truthy())),
            }
        }

        ExprKind::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if let Some(v) = op.short_circuit(&l) {
                return Ok(v);
            }
            let r = eval_expr(rhs, ctx)?;
            op.apply(&l, &r).at(expr.at)
        }

        ExprKind::Call { function, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            ctx.call_fn(expr.at, function, values)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;
    use std::cell::RefCell;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
        calls: RefCell<Vec<String>>,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx {
                vars: HashMap::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }
        fn call_fn(&self, _at: Coordinate, name: &str, args: Vec<Value>) -> Result<Value, SassyError> {
            self.calls.borrow_mut().push(name.to_owned());
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }
    }

    fn eval_ctx(src: &str, ctx: &TestCtx) -> Result<Value, SassyError> {
        let expr = parse_expr(src).expect("parse failed");
        eval_expr(&expr, ctx)
    }

    fn eval(src: &str) -> Value {
        eval_ctx(src, &TestCtx::new()).expect("eval failed")
    }

    fn eval_err(src: &str) -> RuntimeError {
        eval_ctx(src, &TestCtx::new())
            .expect_err("expected an error")
            .runtime_error()
            .cloned()
            .expect("expected a runtime error")
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Integer(42));
        assert_eq!(eval("2.5"), Value::Real(2.5));
        assert_eq!(eval("\"hello\""), Value::from("hello"));
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("true"), Value::Boolean(true));
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Integer(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Integer(20));
        assert_eq!(eval("10 / 4"), Value::Integer(2));
        assert_eq!(eval("10 / 4.0"), Value::Real(2.5));
        assert_eq!(eval("10 % 3"), Value::Integer(1));
        assert_eq!(eval("-(3 + 2)"), Value::Integer(-5));
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("3 == 3.0"), Value::Boolean(true));
        assert_eq!(eval("3 != 4"), Value::Boolean(true));
        assert_eq!(eval("2 < 3"), Value::Boolean(true));
        assert_eq!(eval("3 >= 3"), Value::Boolean(true));
        assert_eq!(eval("\"b\" > \"a\""), Value::Boolean(true));
    }

    #[test]
    fn comparison_type_error_names_operator() {
        assert_eq!(
            eval_err("\"a\" > 1"),
            RuntimeError::BinaryType {
                op: "compare(>)",
                lhs: "string",
                rhs: "integer"
            }
        );
    }

    #[test]
    fn logical_operators_yield_booleans() {
        assert_eq!(eval("1 && \"x\""), Value::Boolean(true));
        assert_eq!(eval("1 && 0"), Value::Boolean(false));
        assert_eq!(eval("0 || [1]"), Value::Boolean(true));
        assert_eq!(eval("!0"), Value::Boolean(true));
    }

    #[test]
    fn short_circuit_skips_right_hand_side() {
        let ctx = TestCtx::new();
        assert_eq!(eval_ctx("false && effect(1)", &ctx).unwrap(), Value::Boolean(false));
        assert_eq!(eval_ctx("true || effect(1)", &ctx).unwrap(), Value::Boolean(true));
        assert!(ctx.calls.borrow().is_empty());

        assert_eq!(eval_ctx("true && effect(1)", &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(*ctx.calls.borrow(), vec!["effect".to_string()]);
    }

    #[test]
    fn right_hand_errors_are_skipped_by_short_circuit() {
        assert_eq!(eval("false && 1 / 0"), Value::Boolean(false));
        assert_eq!(eval_err("true && 1 / 0"), RuntimeError::DivisionByZero);
    }

    #[test]
    fn collections_and_subscripts() {
        assert_eq!(eval("[1, 2, 3][1]"), Value::Integer(2));
        assert_eq!(eval("{ mass: 2.5, \"cost\": 10 }[\"cost\"]"), Value::Integer(10));
        assert_eq!(eval("[[1, 2], [3]][0][1]"), Value::Integer(2));
        assert!(matches!(eval_err("[1][3]"), RuntimeError::IndexOutOfRange { .. }));
        assert_eq!(eval_err("{a: 1}[\"b\"]"), RuntimeError::KeyNotFound("b".into()));
    }

    #[test]
    fn variable_lookup() {
        let ctx = TestCtx::new().with("x", Value::Integer(7));
        assert_eq!(eval_ctx("$x + 1", &ctx).unwrap(), Value::Integer(8));
        assert_eq!(eval_err("$missing"), RuntimeError::UndefinedVariable("missing".into()));
    }

    #[test]
    fn error_carries_coordinate_of_operator() {
        let err = eval_ctx("1 +\n  (\"a\" - 2)", &TestCtx::new()).unwrap_err();
        match err {
            SassyError::Runtime { at, error } => {
                assert_eq!(at.line, 2);
                assert!(matches!(error, RuntimeError::BinaryType { op: "subtract", .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
