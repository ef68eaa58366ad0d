//! Runtime value type for Sassy Patching.
//!
//! Values are dynamically typed.  Unlike a string-at-heart scripting language,
//! there is no implicit coercion: every operator spells out which operand type
//! pairs it accepts, and anything else is a [`RuntimeError::BinaryType`].
//! Conversions never mutate in place; they produce new values.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;

use crate::error::RuntimeError;

/// Insertion-ordered string-keyed map.  Equality ignores order.
pub type Dictionary = IndexMap<String, Value>;

/// A Sassy runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    List(Vec<Value>),
    Dictionary(Dictionary),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            other => write_nested(f, other),
        }
    }
}

/// Render a value the way it appears inside a container (strings quoted).
fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Boolean(b) => write!(f, "{b}"),
        Value::Integer(n) => write!(f, "{n}"),
        Value::Real(x) => {
            // Integral reals keep one fractional digit so they read back as reals.
            if x.fract() == 0.0 && x.abs() < 1e15 {
                write!(f, "{x:.1}")
            } else {
                write!(f, "{x}")
            }
        }
        Value::String(s) => write!(f, "{s:?}"),
        Value::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_nested(f, item)?;
            }
            write!(f, "]")
        }
        Value::Dictionary(map) => {
            write!(f, "{{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k:?}: ")?;
                write_nested(f, v)?;
            }
            write!(f, "}}")
        }
    }
}

/// Both operands of a numeric operator, after promotion.
enum Numeric {
    Integers(i64, i64),
    Reals(f64, f64),
}

fn numeric_pair(a: &Value, b: &Value) -> Option<Numeric> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(Numeric::Integers(*x, *y)),
        (Value::Integer(x), Value::Real(y)) => Some(Numeric::Reals(*x as f64, *y)),
        (Value::Real(x), Value::Integer(y)) => Some(Numeric::Reals(*x, *y as f64)),
        (Value::Real(x), Value::Real(y)) => Some(Numeric::Reals(*x, *y)),
        _ => None,
    }
}

impl Value {
    /// Lowercase type tag, as returned by `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Dictionary(_) => "dictionary",
        }
    }

    /// `null`, `false`, `0`, `0.0`, `""`, `[]` and `{}` are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dictionary(map) => !map.is_empty(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    // ── Conversions ─────────────────────────────────────────────────────────

    /// Convert to a real: integers widen, strings are parsed.
    pub fn to_real(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Real(x) => Ok(*x),
            Value::String(s) => s.trim().parse().map_err(|_| {
                RuntimeError::TypeConversion(format!("Cannot parse string {s:?} as real"))
            }),
            other => Err(RuntimeError::TypeConversion(format!(
                "Cannot convert value of type {} to real",
                other.type_name()
            ))),
        }
    }

    /// Convert to an integer: reals truncate toward zero, strings are parsed.
    pub fn to_integer(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Real(x) => Ok(*x as i64),
            Value::String(s) => s.trim().parse().map_err(|_| {
                RuntimeError::TypeConversion(format!("Cannot parse string {s:?} as integer"))
            }),
            other => Err(RuntimeError::TypeConversion(format!(
                "Cannot convert value of type {} to integer",
                other.type_name()
            ))),
        }
    }

    /// The string payload unchanged, or the canonical rendering otherwise.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }

    // ── Merge ───────────────────────────────────────────────────────────────

    /// Deep-merge `incoming` into `self`: dictionaries merge per key
    /// recursively, lists concatenate, anything else is overwritten.
    pub fn merged(self, incoming: Value) -> Value {
        match (self, incoming) {
            (Value::Dictionary(mut base), Value::Dictionary(incoming)) => {
                for (key, value) in incoming {
                    match base.get_mut(&key) {
                        Some(existing) => {
                            let old = std::mem::take(existing);
                            *existing = old.merged(value);
                        }
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
                Value::Dictionary(base)
            }
            (Value::List(mut base), Value::List(incoming)) => {
                base.extend(incoming);
                Value::List(base)
            }
            (_, incoming) => incoming,
        }
    }

    // ── Operators ───────────────────────────────────────────────────────────

    fn type_error(&self, op: &'static str, rhs: &Value) -> RuntimeError {
        RuntimeError::BinaryType {
            op,
            lhs: self.type_name(),
            rhs: rhs.type_name(),
        }
    }

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(n) = numeric_pair(self, rhs) {
            return Ok(match n {
                Numeric::Integers(a, b) => Value::Integer(a.wrapping_add(b)),
                Numeric::Reals(a, b) => Value::Real(a + b),
            });
        }
        match (self, rhs) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Value::Dictionary(out))
            }
            _ => Err(self.type_error("add", rhs)),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match numeric_pair(self, rhs) {
            Some(Numeric::Integers(a, b)) => Ok(Value::Integer(a.wrapping_sub(b))),
            Some(Numeric::Reals(a, b)) => Ok(Value::Real(a - b)),
            None => Err(self.type_error("subtract", rhs)),
        }
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(n) = numeric_pair(self, rhs) {
            return Ok(match n {
                Numeric::Integers(a, b) => Value::Integer(a.wrapping_mul(b)),
                Numeric::Reals(a, b) => Value::Real(a * b),
            });
        }
        match (self, rhs) {
            (Value::String(s), Value::Integer(n)) => {
                Ok(Value::String(s.repeat(repeat_count(s.len(), *n)?)))
            }
            (Value::List(items), Value::Integer(n)) => {
                let count = repeat_count(items.len(), *n)?;
                let mut out = Vec::with_capacity(items.len() * count);
                for _ in 0..count {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            _ => Err(self.type_error("multiply", rhs)),
        }
    }

    /// Integer division truncates toward zero and fails on a zero divisor;
    /// any real operand makes it IEEE-754 division.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match numeric_pair(self, rhs) {
            Some(Numeric::Integers(_, 0)) => Err(RuntimeError::DivisionByZero),
            Some(Numeric::Integers(a, b)) => Ok(Value::Integer(a.wrapping_div(b))),
            Some(Numeric::Reals(a, b)) => Ok(Value::Real(a / b)),
            None => Err(self.type_error("divide", rhs)),
        }
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match numeric_pair(self, rhs) {
            Some(Numeric::Integers(_, 0)) => Err(RuntimeError::DivisionByZero),
            Some(Numeric::Integers(a, b)) => Ok(Value::Integer(a.wrapping_rem(b))),
            Some(Numeric::Reals(a, b)) => Ok(Value::Real(a % b)),
            None => Err(self.type_error("modulo", rhs)),
        }
    }

    pub fn arith_neg(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Real(x) => Ok(Value::Real(-x)),
            other => Err(RuntimeError::UnaryType {
                op: "negate",
                operand: other.type_name(),
            }),
        }
    }

    /// `==` semantics: numbers compare by magnitude across Integer/Real,
    /// everything else structurally.  Never fails.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match numeric_pair(self, rhs) {
            Some(Numeric::Integers(a, b)) => a == b,
            Some(Numeric::Reals(a, b)) => a == b,
            None => self == rhs,
        }
    }

    /// Relational comparison for `<`, `<=`, `>`, `>=`.
    ///
    /// Numbers compare by magnitude and strings ordinally; `None` means the
    /// operands are unordered (a NaN was involved).  `op` names the operator
    /// in the error, e.g. `"compare(>)"`.
    pub fn compare(&self, rhs: &Value, op: &'static str) -> Result<Option<Ordering>, RuntimeError> {
        match numeric_pair(self, rhs) {
            Some(Numeric::Integers(a, b)) => Ok(Some(a.cmp(&b))),
            Some(Numeric::Reals(a, b)) => Ok(a.partial_cmp(&b)),
            None => match (self, rhs) {
                (Value::String(a), Value::String(b)) => Ok(Some(a.as_str().cmp(b.as_str()))),
                _ => Err(self.type_error(op, rhs)),
            },
        }
    }

    /// `lhs[rhs]`: lists and strings by integer offset, dictionaries by key.
    ///
    /// A string subscript yields the character's code point as a real.
    pub fn subscript(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::List(items), Value::Integer(i)) => usize::try_from(*i)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .ok_or(RuntimeError::IndexOutOfRange {
                    index: *i,
                    len: items.len(),
                    target: "list",
                }),
            (Value::String(s), Value::Integer(i)) => usize::try_from(*i)
                .ok()
                .and_then(|idx| s.chars().nth(idx))
                .map(|c| Value::Real(c as u32 as f64))
                .ok_or_else(|| RuntimeError::IndexOutOfRange {
                    index: *i,
                    len: s.chars().count(),
                    target: "string",
                }),
            (Value::Dictionary(map), Value::String(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| RuntimeError::KeyNotFound(key.clone())),
            _ => Err(self.type_error("subscript", rhs)),
        }
    }

    // ── Indexed fields ──────────────────────────────────────────────────────

    /// The element `path` addresses inside `self`.
    ///
    /// Each step indexes a list by integer or a dictionary by key, failing
    /// like [`Value::subscript`].  A missing key in the last step reads as
    /// `null` so that a set or merge can create it.
    pub fn get_path(&self, path: &[Value]) -> Result<Value, RuntimeError> {
        let mut cur = self;
        for (step, index) in path.iter().enumerate() {
            match cur.element(index)? {
                Some(next) => cur = next,
                None if step + 1 == path.len() => return Ok(Value::Null),
                None => return Err(RuntimeError::KeyNotFound(index.to_string())),
            }
        }
        Ok(cur.clone())
    }

    /// Store `value` at `path`, or remove the element there when `value` is
    /// `None`.  Every step but the last must already exist.  Removing a list
    /// element shifts the later ones down; removing a missing key is a no-op.
    pub fn set_path(&mut self, path: &[Value], value: Option<Value>) -> Result<(), RuntimeError> {
        let Some((last, init)) = path.split_last() else {
            if let Some(v) = value {
                *self = v;
            }
            return Ok(());
        };
        let mut cur = self;
        for index in init {
            cur = cur.element_mut(index)?;
        }
        match (cur, last) {
            (Value::List(items), Value::Integer(i)) => {
                let idx = list_slot(items.len(), *i)?;
                match value {
                    Some(v) => items[idx] = v,
                    None => {
                        items.remove(idx);
                    }
                }
            }
            (Value::Dictionary(map), Value::String(key)) => match value {
                Some(v) => {
                    map.insert(key.clone(), v);
                }
                None => {
                    map.shift_remove(key);
                }
            },
            (other, index) => return Err(other.type_error("subscript", index)),
        }
        Ok(())
    }

    fn element(&self, index: &Value) -> Result<Option<&Value>, RuntimeError> {
        match (self, index) {
            (Value::List(items), Value::Integer(i)) => Ok(Some(&items[list_slot(items.len(), *i)?])),
            (Value::Dictionary(map), Value::String(key)) => Ok(map.get(key)),
            _ => Err(self.type_error("subscript", index)),
        }
    }

    fn element_mut(&mut self, index: &Value) -> Result<&mut Value, RuntimeError> {
        match (self, index) {
            (Value::List(items), Value::Integer(i)) => {
                let idx = list_slot(items.len(), *i)?;
                Ok(&mut items[idx])
            }
            (Value::Dictionary(map), Value::String(key)) => map
                .get_mut(key)
                .ok_or_else(|| RuntimeError::KeyNotFound(key.clone())),
            (other, index) => Err(other.type_error("subscript", index)),
        }
    }
}

fn list_slot(len: usize, index: i64) -> Result<usize, RuntimeError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(RuntimeError::IndexOutOfRange {
            index,
            len,
            target: "list",
        })
}

/// Upper bound on the length of a repeated string (in bytes) or list.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

/// How many copies `value * n` makes of an operand of length `len`.
/// Negative counts and empty operands give zero copies.
fn repeat_count(len: usize, n: i64) -> Result<usize, RuntimeError> {
    if len == 0 || n <= 0 {
        return Ok(0);
    }
    let count = usize::try_from(n).unwrap_or(usize::MAX);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(RuntimeError::RepeatTooLarge {
            len,
            count: n,
            limit: MAX_REPEAT_LEN,
        }),
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Dictionary> for Value {
    fn from(map: Dictionary) -> Self {
        Value::Dictionary(map)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, Value)]) -> Value {
        Value::Dictionary(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::Real(3.25).to_string(), "3.25");
        assert_eq!(Value::Real(1.0).to_string(), "1.0");
        assert_eq!(Value::from("hello").to_string(), "hello");
    }

    #[test]
    fn display_containers_quote_strings() {
        let v = Value::List(vec![Value::from("a"), Value::Integer(1)]);
        assert_eq!(v.to_string(), "[\"a\", 1]");
        let d = dict(&[("k", Value::from("v")), ("n", Value::Null)]);
        assert_eq!(d.to_string(), "{\"k\": \"v\", \"n\": null}");
    }

    #[test]
    fn truthiness_policy() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Boolean(false).truthy());
        assert!(Value::Boolean(true).truthy());
        assert!(!Value::Integer(0).truthy());
        assert!(Value::Integer(-1).truthy());
        assert!(!Value::Real(0.0).truthy());
        assert!(Value::Real(0.5).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::List(vec![Value::Null]).truthy());
        assert!(!Value::Dictionary(Dictionary::new()).truthy());
        assert!(dict(&[("a", Value::Null)]).truthy());
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Integer(0).type_name(), "integer");
        assert_eq!(Value::Real(0.0).type_name(), "real");
        assert_eq!(Value::from("").type_name(), "string");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(Value::Dictionary(Dictionary::new()).type_name(), "dictionary");
    }

    #[test]
    fn to_real_and_integer() {
        assert_eq!(Value::Integer(3).to_real(), Ok(3.0));
        assert_eq!(Value::from(" 2.5 ").to_real(), Ok(2.5));
        assert_eq!(Value::Real(3.9).to_integer(), Ok(3));
        assert_eq!(Value::Real(-3.9).to_integer(), Ok(-3));
        assert_eq!(Value::from("42").to_integer(), Ok(42));
    }

    #[test]
    fn conversion_errors_name_source_type() {
        let err = Value::List(vec![]).to_real().unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert value of type list to real");
        let err = Value::Null.to_integer().unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert value of type null to integer");
        assert!(matches!(
            Value::from("abc").to_integer(),
            Err(RuntimeError::TypeConversion(_))
        ));
    }

    #[test]
    fn divide_semantics() {
        let i = Value::Integer;
        let r = Value::Real;
        assert_eq!(i(7).arith_div(&i(2)), Ok(i(3)));
        assert_eq!(i(-7).arith_div(&i(2)), Ok(i(-3)));
        assert_eq!(r(7.0).arith_div(&r(2.0)), Ok(r(3.5)));
        assert_eq!(i(7).arith_div(&r(2.0)), Ok(r(3.5)));
        assert_eq!(r(7.0).arith_div(&i(2)), Ok(r(3.5)));
        assert_eq!(
            Value::from("x").arith_div(&i(2)),
            Err(RuntimeError::BinaryType {
                op: "divide",
                lhs: "string",
                rhs: "integer"
            })
        );
    }

    #[test]
    fn divide_by_zero_policy() {
        assert_eq!(
            Value::Integer(1).arith_div(&Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            Value::Real(1.0).arith_div(&Value::Integer(0)),
            Ok(Value::Real(f64::INFINITY))
        );
        match Value::Real(0.0).arith_div(&Value::Real(0.0)) {
            Ok(Value::Real(x)) => assert!(x.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Value::Integer(1).arith_rem(&Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn subtract_semantics() {
        assert_eq!(Value::Integer(10).arith_sub(&Value::Integer(3)), Ok(Value::Integer(7)));
        assert_eq!(Value::Integer(10).arith_sub(&Value::Real(0.5)), Ok(Value::Real(9.5)));
        assert!(matches!(
            Value::from("a").arith_sub(&Value::from("b")),
            Err(RuntimeError::BinaryType { op: "subtract", .. })
        ));
    }

    #[test]
    fn add_concatenates_strings_and_lists() {
        assert_eq!(Value::from("ab").arith_add(&Value::from("cd")), Ok(Value::from("abcd")));
        assert_eq!(
            Value::List(vec![Value::Integer(1)]).arith_add(&Value::List(vec![Value::Integer(2)])),
            Ok(Value::List(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert!(Value::from("a").arith_add(&Value::Integer(1)).is_err());
    }

    #[test]
    fn repetition_is_bounded() {
        assert_eq!(Value::from("ab").arith_mul(&Value::Integer(3)), Ok(Value::from("ababab")));
        assert_eq!(Value::from("ab").arith_mul(&Value::Integer(-2)), Ok(Value::from("")));
        assert!(matches!(
            Value::from("ab").arith_mul(&Value::Integer(i64::MAX)),
            Err(RuntimeError::RepeatTooLarge { len: 2, .. })
        ));
        let list = Value::List(vec![Value::Integer(1), Value::Null]);
        assert_eq!(
            list.arith_mul(&Value::Integer(2)),
            Ok(Value::List(vec![Value::Integer(1), Value::Null, Value::Integer(1), Value::Null]))
        );
        assert!(matches!(
            list.arith_mul(&Value::Integer(i64::MAX)),
            Err(RuntimeError::RepeatTooLarge { .. })
        ));
        assert!(Value::List(vec![Value::Null; 2])
            .arith_mul(&Value::Integer((MAX_REPEAT_LEN / 2 + 1) as i64))
            .is_err());
    }

    #[test]
    fn repeating_empty_operands_is_immediate() {
        assert_eq!(Value::List(vec![]).arith_mul(&Value::Integer(i64::MAX)), Ok(Value::List(vec![])));
        assert_eq!(Value::from("").arith_mul(&Value::Integer(i64::MAX)), Ok(Value::from("")));
    }

    #[test]
    fn paths_read_and_write_nested_elements() {
        let mut v = dict(&[
            ("fuel", Value::Integer(100)),
            ("tanks", Value::List(vec![Value::Integer(1), Value::Integer(2)])),
        ]);
        assert_eq!(v.get_path(&[]), Ok(v.clone()));
        assert_eq!(v.get_path(&[Value::from("fuel")]), Ok(Value::Integer(100)));
        assert_eq!(v.get_path(&[Value::from("ox")]), Ok(Value::Null));
        assert_eq!(
            v.get_path(&[Value::from("tanks"), Value::Integer(1)]),
            Ok(Value::Integer(2))
        );
        assert_eq!(
            v.get_path(&[Value::from("ox"), Value::Integer(0)]),
            Err(RuntimeError::KeyNotFound("ox".into()))
        );

        v.set_path(&[Value::from("ox")], Some(Value::Integer(20))).unwrap();
        v.set_path(&[Value::from("tanks"), Value::Integer(0)], Some(Value::from("a"))).unwrap();
        v.set_path(&[Value::from("fuel")], None).unwrap();
        v.set_path(&[Value::from("missing")], None).unwrap();
        assert_eq!(
            v,
            dict(&[
                ("tanks", Value::List(vec![Value::from("a"), Value::Integer(2)])),
                ("ox", Value::Integer(20)),
            ])
        );

        v.set_path(&[Value::from("tanks"), Value::Integer(0)], None).unwrap();
        assert_eq!(v.get_path(&[Value::from("tanks")]), Ok(Value::List(vec![Value::Integer(2)])));
    }

    #[test]
    fn path_errors_follow_subscript() {
        let mut v = Value::List(vec![Value::Integer(1)]);
        assert!(matches!(
            v.set_path(&[Value::Integer(3)], Some(Value::Null)),
            Err(RuntimeError::IndexOutOfRange { index: 3, len: 1, .. })
        ));
        assert!(matches!(
            v.get_path(&[Value::from("k")]),
            Err(RuntimeError::BinaryType { op: "subscript", .. })
        ));
        assert!(matches!(
            Value::Integer(4).set_path(&[Value::Integer(0)], Some(Value::Null)),
            Err(RuntimeError::BinaryType { op: "subscript", lhs: "integer", .. })
        ));
    }

    #[test]
    fn greater_than_semantics() {
        let gt = |a: Value, b: Value| a.compare(&b, "compare(>)").map(|o| o == Some(Ordering::Greater));
        assert_eq!(gt(Value::Integer(3), Value::Real(2.5)), Ok(true));
        assert_eq!(gt(Value::from("b"), Value::from("a")), Ok(true));
        assert_eq!(gt(Value::from("B"), Value::from("a")), Ok(false));
        assert_eq!(
            gt(Value::from("a"), Value::Integer(1)),
            Err(RuntimeError::BinaryType {
                op: "compare(>)",
                lhs: "string",
                rhs: "integer"
            })
        );
    }

    #[test]
    fn loose_equality_crosses_numeric_types() {
        assert!(Value::Integer(1).loose_eq(&Value::Real(1.0)));
        assert!(!Value::Integer(1).loose_eq(&Value::from("1")));
        assert!(dict(&[("a", Value::Integer(1)), ("b", Value::Null)])
            .loose_eq(&dict(&[("b", Value::Null), ("a", Value::Integer(1))])));
    }

    #[test]
    fn subscript_list_string_dictionary() {
        let list = Value::List(vec![Value::from("x"), Value::from("y")]);
        assert_eq!(list.subscript(&Value::Integer(1)), Ok(Value::from("y")));
        assert!(matches!(
            list.subscript(&Value::Integer(2)),
            Err(RuntimeError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
        assert!(matches!(
            list.subscript(&Value::Integer(-1)),
            Err(RuntimeError::IndexOutOfRange { .. })
        ));

        let s = Value::from("AB");
        assert_eq!(s.subscript(&Value::Integer(1)), Ok(Value::Real(66.0)));
        assert!(matches!(
            s.subscript(&Value::Integer(5)),
            Err(RuntimeError::IndexOutOfRange { target: "string", .. })
        ));

        let d = dict(&[("mass", Value::Real(1.5))]);
        assert_eq!(d.subscript(&Value::from("mass")), Ok(Value::Real(1.5)));
        assert_eq!(
            d.subscript(&Value::from("cost")),
            Err(RuntimeError::KeyNotFound("cost".into()))
        );
        assert!(matches!(
            d.subscript(&Value::Integer(0)),
            Err(RuntimeError::BinaryType { op: "subscript", .. })
        ));
    }

    #[test]
    fn deep_merge() {
        let base = dict(&[
            ("a", Value::Integer(1)),
            ("nested", dict(&[("x", Value::Integer(1)), ("list", Value::List(vec![Value::Integer(1)]))])),
        ]);
        let incoming = dict(&[
            ("b", Value::Integer(2)),
            ("nested", dict(&[("y", Value::Integer(2)), ("list", Value::List(vec![Value::Integer(2)]))])),
        ]);
        let expected = dict(&[
            ("a", Value::Integer(1)),
            (
                "nested",
                dict(&[
                    ("x", Value::Integer(1)),
                    ("list", Value::List(vec![Value::Integer(1), Value::Integer(2)])),
                    ("y", Value::Integer(2)),
                ]),
            ),
            ("b", Value::Integer(2)),
        ]);
        assert_eq!(base.merged(incoming), expected);
        assert_eq!(Value::Integer(1).merged(Value::from("s")), Value::from("s"));
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Integer(42));
        let v: Value = "hi".into();
        assert_eq!(v, Value::String("hi".into()));
        let v: Value = true.into();
        assert_eq!(v, Value::Boolean(true));
    }
}
