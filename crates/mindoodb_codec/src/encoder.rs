//! Canonical JSON serialization.
//!
//! Canonical JSON is the wire form used for signing and for the metadata
//! segment files: object keys are sorted recursively, `Undefined` values are
//! elided from objects, and arrays preserve order with `Undefined` elements
//! written as `null`. Two semantically identical documents always serialize
//! to the same bytes, which is the whole point: signatures are computed over
//! this output.

use crate::value::{key_order, Number, Value};
use std::fmt::Write as _;

/// Serializes a value to its canonical JSON string form.
#[must_use]
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Undefined | Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(Number::Int(i)) => {
            let _ = write!(out, "{i}");
        }
        Value::Number(Number::Float(f)) => {
            if f.is_finite() {
                let _ = write!(out, "{f}");
            } else {
                out.push_str("null");
            }
        }
        Value::Text(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(pairs) => {
            let mut sorted: Vec<&(String, Value)> = pairs
                .iter()
                .filter(|(_, v)| !matches!(v, Value::Undefined))
                .collect();
            sorted.sort_by(|a, b| key_order(&a.0, &b.0));
            out.push('{');
            for (i, (k, v)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, k);
                out.push(':');
                write_value(out, v);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_object_keys() {
        let value = Value::object(vec![("b", Value::from(2i64)), ("a", Value::from(1i64))]);
        assert_eq!(to_canonical_json(&value), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn sorts_nested_objects() {
        let value = Value::object(vec![(
            "outer",
            Value::object(vec![("z", Value::from(1i64)), ("a", Value::from(2i64))]),
        )]);
        assert_eq!(to_canonical_json(&value), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn elides_undefined_from_objects() {
        let value = Value::object(vec![
            ("present", Value::from(1i64)),
            ("missing", Value::Undefined),
        ]);
        assert_eq!(to_canonical_json(&value), r#"{"present":1}"#);
    }

    #[test]
    fn nulls_undefined_in_arrays() {
        let value = Value::Array(vec![Value::from(1i64), Value::Undefined, Value::from(2i64)]);
        assert_eq!(to_canonical_json(&value), "[1,null,2]");
    }

    #[test]
    fn escapes_control_characters() {
        let value = Value::from("line\nbreak\"quote");
        assert_eq!(to_canonical_json(&value), r#""line\nbreak\"quote""#);
    }

    #[test]
    fn deterministic_across_field_orderings() {
        let a = Value::object(vec![("x", Value::from(1i64)), ("y", Value::from(2i64))]);
        let b = Value::object(vec![("y", Value::from(2i64)), ("x", Value::from(1i64))]);
        assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
    }
}
