use crate::errors::{EvalError, Result};
use itertools::Itertools;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        },
        _ => None,
    }
}

fn cmp_nums(a: Num, b: Num) -> Ordering {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.cmp(&y),
        _ => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
    }
}

/// Name of the value's type as it appears in error messages.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Source-like rendering: strings quoted, `None`/`True`/`False` spelled out.
pub fn repr(v: &Value) -> String {
    match v {
        Value::Null => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e16 => format!("{f:.1}"),
            _ => n.to_string(),
        },
        Value::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n");
            format!("'{escaped}'")
        }
        Value::Array(a) => format!("[{}]", a.iter().map(repr).join(", ")),
        Value::Object(m) => format!(
            "{{{}}}",
            m.iter()
                .map(|(k, v)| format!("{}: {}", repr(&Value::String(k.clone())), repr(v)))
                .join(", ")
        ),
    }
}

/// Like `repr`, but strings are emitted as-is.
pub fn to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return cmp_nums(x, y) == Ordering::Equal;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).map(|r| values_equal(l, r)).unwrap_or(false))
        }
        _ => false,
    }
}

/// `is`: identity for the singletons, otherwise same kind and equal.
pub fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x.is_f64() == y.is_f64() && values_equal(a, b),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

fn order(a: &Value, b: &Value, op: &str) -> Result<Ordering> {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return Ok(cmp_nums(x, y));
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                if !values_equal(l, r) {
                    return order(l, r, op);
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(EvalError::Type(format!(
            "'{op}' not supported between instances of '{}' and '{}'",
            type_name(a),
            type_name(b)
        ))),
    }
}

/// Ordered comparison; `pred_on_ord` decides what the ordering means for `op`.
pub fn cmp_values<F>(a: &Value, b: &Value, op: &str, pred_on_ord: F) -> Result<bool>
where
    F: Fn(Ordering) -> bool,
{
    order(a, b, op).map(pred_on_ord)
}

pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Array(a) => Ok(a.iter().any(|v| values_equal(v, item))),
        Value::String(s) => match item {
            Value::String(needle) => Ok(s.contains(needle.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::Object(m) => Ok(item.as_str().map(|k| m.contains_key(k)).unwrap_or(false)),
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn numeric_equality_spans_bool_int_float() {
        assert!(values_equal(&json!(true), &json!(1)));
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!("1"), &json!(1)));
        assert!(values_equal(&json!(["a", 1]), &json!(["a", 1.0])));
    }

    #[test]
    fn ordering_rejects_mixed_kinds() {
        let err = cmp_values(&json!("a"), &json!(1), "<", |o| o.is_lt()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'str' and 'int'"
        );
        assert!(cmp_values(&json!("1.10"), &json!("1.9"), "<", |o| o.is_lt()).unwrap());
        assert!(cmp_values(&json!([1, 2]), &json!([1, 3]), "<", |o| o.is_lt()).unwrap());
    }

    #[test]
    fn membership() {
        assert!(contains(&json!(["A", "B"]), &json!("A")).unwrap());
        // a parenthesised single string is still a string: substring test
        assert!(contains(&json!("Company B"), &json!("B")).unwrap());
        assert!(contains(&json!({"k": 1}), &json!("k")).unwrap());
        assert!(contains(&json!("abc"), &json!(1)).is_err());
        assert_eq!(
            contains(&json!(3), &json!(1)).unwrap_err().to_string(),
            "TypeError: argument of type 'int' is not iterable"
        );
    }

    #[test]
    fn repr_matches_source_spelling() {
        assert_eq!(repr(&json!(null)), "None");
        assert_eq!(repr(&json!(["a", true, 1.0, 2])), "['a', True, 1.0, 2]");
        assert_eq!(repr(&json!("it's")), r"'it\'s'");
        assert_eq!(to_display(&json!("plain")), "plain");
    }

    #[test]
    fn identity() {
        assert!(identical(&json!(null), &json!(null)));
        assert!(!identical(&json!(1), &json!(true)));
        assert!(!identical(&json!(1), &json!(1.0)));
    }
}
