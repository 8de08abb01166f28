//! Dynamic JSON-like value type used for document payloads and signing.

use std::cmp::Ordering;

/// A dynamic value mirroring the JSON data model used by MindooDB documents.
///
/// This is the wire representation for `MindooDocPayload`: a tagged union of
/// null/bool/number/string/array/object, plus an [`Value::Undefined`] marker
/// that exists only transiently (selected document fields that are absent
/// collapse to `Undefined`, which canonicalization then treats specially).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JavaScript-style `undefined`: present during field extraction, never
    /// serialized as a real value. Dropped from objects, nulled in arrays.
    Undefined,
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number. JSON has one numeric type; we keep it as `f64` plus a
    /// fast-path integer tag so whole numbers don't grow a trailing `.0`.
    Number(Number),
    /// UTF-8 string.
    Text(String),
    /// Ordered array of values.
    Array(Vec<Value>),
    /// Object with string keys. Insertion order is preserved; canonical
    /// serialization sorts keys recursively at encode time.
    Object(Vec<(String, Value)>),
}

/// A JSON number, preserving whether it originated as an integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
}

impl Value {
    /// Builds an object value, keys given in any order (sorted at encode time).
    pub fn object(pairs: Vec<(impl Into<String>, Value)>) -> Self {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true if this is `Null` or `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Looks up a key in an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns this value as text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Converts from `serde_json::Value`.
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Number::Int(i))
                } else {
                    Value::Number(Number::Float(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(a) => Value::Array(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(m) => {
                Value::Object(m.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }

    /// Converts to `serde_json::Value`. `Undefined` becomes `Null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(Number::Int(i)) => serde_json::Value::from(*i),
            Value::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Object(pairs) => serde_json::Value::Object(
                pairs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::Float(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// Orders object keys for canonical serialization: plain lexicographic
/// (byte-wise) comparison of the UTF-8 key, matching `Array.prototype.sort`
/// on strings in the reference implementation.
pub fn key_order(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_via_json() {
        let value = Value::object(vec![
            ("name", Value::from("Alice")),
            ("age", Value::from(30i64)),
            ("tags", Value::from(vec!["a", "b"])),
        ]);
        let json = value.to_json();
        let back = Value::from_json(&json);
        assert_eq!(back.get("name").and_then(Value::as_text), Some("Alice"));
    }

    #[test]
    fn undefined_becomes_null_in_json() {
        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn key_order_is_lexicographic() {
        let mut keys = vec!["z", "a", "ab", "aa"];
        keys.sort_by(|a, b| key_order(a, b));
        assert_eq!(keys, vec!["a", "aa", "ab", "z"]);
    }

    #[test]
    fn get_missing_key() {
        let value = Value::object(vec![("a", Value::from(1i64))]);
        assert!(value.get("missing").is_none());
    }
}
