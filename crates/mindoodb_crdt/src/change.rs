//! Change wire format: a causal, content-hashed unit of mutation.

use mindoodb_codec::{to_canonical_json, Value};
use mindoodb_crypto::sha256_hex;
use serde::{Deserialize, Serialize};

/// An opaque, content-derived change identifier.
pub type ChangeId = String;

/// A single field mutation within a [`Change`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Sets `key` to `value`.
    Set {
        /// Field name.
        key: String,
        /// New value, JSON-encoded.
        value: serde_json::Value,
    },
    /// Removes `key`.
    Delete {
        /// Field name.
        key: String,
    },
}

/// One causal unit of document mutation: an ordered list of field
/// operations, the actor that produced them, and the change ids this
/// change causally depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Identifies the writer; used with `counter` to break LWW ties deterministically.
    pub actor_id: String,
    /// Per-actor monotonically increasing sequence number.
    pub counter: u64,
    /// Change ids this change was created on top of (the heads at write time).
    pub deps: Vec<ChangeId>,
    /// The field mutations this change applies.
    pub ops: Vec<Op>,
}

impl Change {
    /// Computes this change's deterministic, content-derived id.
    ///
    /// Two changes with identical `(actor_id, counter, deps, ops)` always
    /// hash to the same id, regardless of serialization order.
    #[must_use]
    pub fn id(&self) -> ChangeId {
        sha256_hex(to_canonical_json(&self.canonical_value()).as_bytes())
    }

    fn canonical_value(&self) -> Value {
        let mut deps = self.deps.clone();
        deps.sort();
        let ops: Vec<Value> = self
            .ops
            .iter()
            .map(|op| match op {
                Op::Set { key, value } => Value::object(vec![
                    ("op", Value::from("set")),
                    ("key", Value::from(key.as_str())),
                    ("value", Value::from_json(value)),
                ]),
                Op::Delete { key } => {
                    Value::object(vec![("op", Value::from("delete")), ("key", Value::from(key.as_str()))])
                }
            })
            .collect();

        Value::object(vec![
            ("actorId", Value::from(self.actor_id.as_str())),
            ("counter", Value::from(self.counter as i64)),
            ("deps", Value::Array(deps.into_iter().map(|d| Value::from(d)).collect())),
            ("ops", Value::Array(ops)),
        ])
    }

    /// Serializes this change to its binary wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Change serialization cannot fail")
    }

    /// Parses a change produced by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> crate::error::CrdtResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::error::CrdtError::malformed_change(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let change = Change {
            actor_id: "actor1".to_string(),
            counter: 1,
            deps: vec!["dep2".to_string(), "dep1".to_string()],
            ops: vec![Op::Set {
                key: "title".to_string(),
                value: serde_json::json!("hello"),
            }],
        };
        let reordered = Change {
            deps: vec!["dep1".to_string(), "dep2".to_string()],
            ..change.clone()
        };
        assert_eq!(change.id(), reordered.id());
    }

    #[test]
    fn different_ops_different_id() {
        let base = Change {
            actor_id: "a".to_string(),
            counter: 1,
            deps: vec![],
            ops: vec![Op::Set {
                key: "x".to_string(),
                value: serde_json::json!(1),
            }],
        };
        let other = Change {
            ops: vec![Op::Set {
                key: "x".to_string(),
                value: serde_json::json!(2),
            }],
            ..base.clone()
        };
        assert_ne!(base.id(), other.id());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let change = Change {
            actor_id: "actor1".to_string(),
            counter: 3,
            deps: vec!["dep1".to_string()],
            ops: vec![Op::Delete { key: "old".to_string() }],
        };
        let bytes = change.encode();
        assert_eq!(Change::decode(&bytes).unwrap(), change);
    }
}
