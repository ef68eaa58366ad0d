//! Builtin libraries.
//!
//! Registered by [`Universe::new`](crate::universe::Universe::new) under the
//! `builtin` mod and implicitly available to every patch.  Each function
//! receives already-evaluated arguments and reports bad input as
//! [`RuntimeError::ArityMismatch`] or [`RuntimeError::ArgumentType`].

use regex::Regex;

use crate::error::RuntimeError;
use crate::library::NativeLibrary;
use crate::value::{Dictionary, Value};

/// Qualified names of the builtin libraries, in resolution order.
pub const LIBRARIES: [&str; 5] = [
    "builtin:reflection",
    "builtin:type-conversion",
    "builtin:math",
    "builtin:string",
    "builtin:list",
];

/// Every builtin library as `(qualified name, library)`.
pub fn libraries() -> Vec<(&'static str, NativeLibrary)> {
    LIBRARIES
        .into_iter()
        .zip([reflection(), type_conversion(), math(), string(), list()])
        .collect()
}

// ── Libraries ─────────────────────────────────────────────────────────────────

fn reflection() -> NativeLibrary {
    NativeLibrary::new().with("typeof", |args| {
        let [v] = exactly::<1>("typeof", args)?;
        Ok(Value::from(v.type_name()))
    })
}

fn type_conversion() -> NativeLibrary {
    NativeLibrary::new()
        .with("to-bool", |args| {
            let [v] = exactly::<1>("to-bool", args)?;
            Ok(Value::Boolean(v.truthy()))
        })
        .with("to-real", |args| {
            let [v] = exactly::<1>("to-real", args)?;
            v.to_real().map(Value::Real)
        })
        .with("to-integer", |args| {
            let [v] = exactly::<1>("to-integer", args)?;
            v.to_integer().map(Value::Integer)
        })
        .with("to-string", |args| {
            let [v] = exactly::<1>("to-string", args)?;
            Ok(Value::String(v.to_display_string()))
        })
}

fn math() -> NativeLibrary {
    NativeLibrary::new()
        .with("abs", |args| {
            let [v] = exactly::<1>("abs", args)?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(n.wrapping_abs())),
                Value::Real(x) => Ok(Value::Real(x.abs())),
                other => Err(argument("abs", 0, "a number", other)),
            }
        })
        .with("min", |args| extremum("min", args, |a, b| b < a))
        .with("max", |args| extremum("max", args, |a, b| b > a))
        .with("floor", |args| rounding("floor", args, f64::floor))
        .with("ceil", |args| rounding("ceil", args, f64::ceil))
        .with("round", |args| rounding("round", args, f64::round))
        .with("sqrt", |args| {
            let [v] = exactly::<1>("sqrt", args)?;
            Ok(Value::Real(number("sqrt", v, 0)?.to_real()?.sqrt()))
        })
        .with("pow", |args| {
            let [base, exp] = exactly::<2>("pow", args)?;
            Ok(match (number("pow", base, 0)?, number("pow", exp, 1)?) {
                (Value::Integer(b), Value::Integer(e)) if (0..=u32::MAX as i64).contains(e) => {
                    Value::Integer(b.wrapping_pow(*e as u32))
                }
                (b, e) => Value::Real(b.to_real()?.powf(e.to_real()?)),
            })
        })
}

fn string() -> NativeLibrary {
    NativeLibrary::new()
        .with("length", |args| {
            let [v] = exactly::<1>("length", args)?;
            let len = match v {
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dictionary(map) => map.len(),
                other => return Err(argument("length", 0, "a string, list or dictionary", other)),
            };
            Ok(Value::Integer(len as i64))
        })
        .with("to-upper", |args| {
            let [v] = exactly::<1>("to-upper", args)?;
            Ok(Value::String(text("to-upper", v, 0)?.to_uppercase()))
        })
        .with("to-lower", |args| {
            let [v] = exactly::<1>("to-lower", args)?;
            Ok(Value::String(text("to-lower", v, 0)?.to_lowercase()))
        })
        .with("contains", |args| {
            let [haystack, needle] = exactly::<2>("contains", args)?;
            Ok(Value::Boolean(match haystack {
                Value::List(items) => items.iter().any(|item| item.loose_eq(needle)),
                Value::String(s) => s.contains(text("contains", needle, 1)?),
                other => return Err(argument("contains", 0, "a string or list", other)),
            }))
        })
        .with("starts-with", |args| {
            let [s, prefix] = exactly::<2>("starts-with", args)?;
            Ok(Value::Boolean(
                text("starts-with", s, 0)?.starts_with(text("starts-with", prefix, 1)?),
            ))
        })
        .with("ends-with", |args| {
            let [s, suffix] = exactly::<2>("ends-with", args)?;
            Ok(Value::Boolean(
                text("ends-with", s, 0)?.ends_with(text("ends-with", suffix, 1)?),
            ))
        })
        .with("replace", |args| {
            let [s, from, to] = exactly::<3>("replace", args)?;
            Ok(Value::String(text("replace", s, 0)?.replace(
                text("replace", from, 1)?,
                text("replace", to, 2)?,
            )))
        })
        .with("regex-match", |args| {
            let [s, pattern] = exactly::<2>("regex-match", args)?;
            let re = compile("regex-match", text("regex-match", pattern, 1)?)?;
            Ok(Value::Boolean(re.is_match(text("regex-match", s, 0)?)))
        })
        .with("regex-replace", |args| {
            let [s, pattern, replacement] = exactly::<3>("regex-replace", args)?;
            let re = compile("regex-replace", text("regex-replace", pattern, 1)?)?;
            Ok(Value::String(
                re.replace_all(
                    text("regex-replace", s, 0)?,
                    text("regex-replace", replacement, 2)?,
                )
                .into_owned(),
            ))
        })
}

fn list() -> NativeLibrary {
    NativeLibrary::new()
        .with("append", |args| {
            let [items, v] = exactly::<2>("append", args)?;
            let Value::List(items) = items else {
                return Err(argument("append", 0, "a list", items));
            };
            let mut out = items.clone();
            out.push(v.clone());
            Ok(Value::List(out))
        })
        .with("keys", |args| {
            let [map] = exactly::<1>("keys", args)?;
            Ok(Value::List(
                dictionary("keys", map, 0)?.keys().map(|k| Value::from(k.as_str())).collect(),
            ))
        })
        .with("values", |args| {
            let [map] = exactly::<1>("values", args)?;
            Ok(Value::List(dictionary("values", map, 0)?.values().cloned().collect()))
        })
        .with("has-key", |args| {
            let [map, key] = exactly::<2>("has-key", args)?;
            Ok(Value::Boolean(
                dictionary("has-key", map, 0)?.contains_key(text("has-key", key, 1)?),
            ))
        })
        .with("remove-key", |args| {
            let [map, key] = exactly::<2>("remove-key", args)?;
            let mut out = dictionary("remove-key", map, 0)?.clone();
            out.shift_remove(text("remove-key", key, 1)?);
            Ok(Value::Dictionary(out))
        })
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn exactly<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<&'a [Value; N], RuntimeError> {
    args.try_into().map_err(|_| RuntimeError::ArityMismatch {
        name: name.to_owned(),
        expected: N.to_string(),
        found: args.len(),
    })
}

fn argument(function: &str, index: usize, expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::ArgumentType {
        function: function.to_owned(),
        index: index + 1,
        expected,
        found: found.type_name(),
    }
}

fn number<'a>(function: &str, v: &'a Value, index: usize) -> Result<&'a Value, RuntimeError> {
    if v.is_number() {
        Ok(v)
    } else {
        Err(argument(function, index, "a number", v))
    }
}

fn text<'a>(function: &str, v: &'a Value, index: usize) -> Result<&'a str, RuntimeError> {
    v.as_str().ok_or_else(|| argument(function, index, "a string", v))
}

fn dictionary<'a>(function: &str, v: &'a Value, index: usize) -> Result<&'a Dictionary, RuntimeError> {
    match v {
        Value::Dictionary(map) => Ok(map),
        other => Err(argument(function, index, "a dictionary", other)),
    }
}

fn compile(function: &str, pattern: &str) -> Result<Regex, RuntimeError> {
    Regex::new(pattern).map_err(|e| RuntimeError::Native(format!("{function}: {e}")))
}

/// `min`/`max`: one or more numbers, or a single list of numbers.
fn extremum(name: &str, args: &[Value], replace: fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    let items = match args {
        [Value::List(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<(&Value, f64)> = None;
    for (i, v) in items.iter().enumerate() {
        let x = number(name, v, i)?.to_real()?;
        if best.map_or(true, |(_, b)| replace(b, x)) {
            best = Some((v, x));
        }
    }
    best.map(|(v, _)| v.clone())
        .ok_or_else(|| RuntimeError::ArityMismatch {
            name: name.to_owned(),
            expected: "at least 1".into(),
            found: 0,
        })
}

/// `floor`/`ceil`/`round`: integers pass through, reals are rounded.
fn rounding(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, RuntimeError> {
    let [v] = exactly::<1>(name, args)?;
    Ok(match number(name, v, 0)? {
        Value::Real(x) => Value::Real(f(*x)),
        other => other.clone(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
