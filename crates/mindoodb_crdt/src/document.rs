//! The CRDT document contract and a concrete causal LWW-register
//! implementation.

use crate::change::{Change, ChangeId, Op};
use crate::error::CrdtResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The operations the rest of MindooDB needs from a CRDT document: create
/// an empty one, apply and emit binary changes, snapshot/restore, and
/// expose the current causal frontier.
pub trait CrdtDocument: Sized {
    /// Creates a new, empty document.
    fn empty() -> Self;

    /// Applies a binary-encoded change produced by [`CrdtDocument::emit_change`]
    /// (possibly by a different actor or process). Applying the same change
    /// twice is a no-op.
    fn apply_change(&mut self, change: &[u8]) -> CrdtResult<()>;

    /// Builds and applies a local change from `ops`, returning its binary
    /// encoding (to be signed, encrypted, and appended to the EntryStore).
    fn emit_change(&mut self, actor_id: &str, ops: Vec<Op>) -> CrdtResult<Vec<u8>>;

    /// Serializes the full current state as a restorable snapshot.
    fn snapshot(&self) -> Vec<u8>;

    /// Rebuilds a document from a snapshot produced by [`Self::snapshot`].
    fn restore(snapshot: &[u8]) -> CrdtResult<Self>;

    /// The current causal frontier: change ids with no applied successor,
    /// in a deterministic order.
    fn heads(&self) -> Vec<ChangeId>;

    /// Reads the current value of `key`, if set.
    fn get(&self, key: &str) -> Option<&serde_json::Value>;

    /// Lists all currently-set keys.
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Register {
    value: Option<serde_json::Value>,
    actor_id: String,
    counter: u64,
}

/// A causal last-writer-wins document: each field is a register resolved
/// by `(counter, actor_id)` — higher counter wins, ties broken by actor id
/// so resolution is deterministic regardless of application order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LwwDocument {
    fields: HashMap<String, Register>,
    applied: HashSet<ChangeId>,
    heads: HashSet<ChangeId>,
    counters: HashMap<String, u64>,
}

impl LwwDocument {
    fn apply_parsed(&mut self, change: Change) -> CrdtResult<()> {
        let id = change.id();
        if self.applied.contains(&id) {
            return Ok(());
        }

        for op in &change.ops {
            let (key, new_value) = match op {
                Op::Set { key, value } => (key.clone(), Some(value.clone())),
                Op::Delete { key } => (key.clone(), None),
            };
            let candidate = Register {
                value: new_value,
                actor_id: change.actor_id.clone(),
                counter: change.counter,
            };
            let replace = match self.fields.get(&key) {
                None => true,
                Some(existing) => {
                    (candidate.counter, &candidate.actor_id) > (existing.counter, &existing.actor_id)
                }
            };
            if replace {
                self.fields.insert(key, candidate);
            }
        }

        let counter_entry = self.counters.entry(change.actor_id.clone()).or_insert(0);
        *counter_entry = (*counter_entry).max(change.counter);

        for dep in &change.deps {
            self.heads.remove(dep);
        }
        self.heads.insert(id.clone());
        self.applied.insert(id);
        Ok(())
    }
}

impl CrdtDocument for LwwDocument {
    fn empty() -> Self {
        Self::default()
    }

    fn apply_change(&mut self, change: &[u8]) -> CrdtResult<()> {
        let change = Change::decode(change)?;
        self.apply_parsed(change)
    }

    fn emit_change(&mut self, actor_id: &str, ops: Vec<Op>) -> CrdtResult<Vec<u8>> {
        let mut deps: Vec<ChangeId> = self.heads.iter().cloned().collect();
        deps.sort();
        let counter = self.counters.get(actor_id).copied().unwrap_or(0) + 1;

        let change = Change {
            actor_id: actor_id.to_string(),
            counter,
            deps,
            ops,
        };
        let encoded = change.encode();
        self.apply_parsed(change)?;
        Ok(encoded)
    }

    fn snapshot(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("LwwDocument snapshot serialization cannot fail")
    }

    fn restore(snapshot: &[u8]) -> CrdtResult<Self> {
        serde_json::from_slice(snapshot).map_err(|e| crate::error::CrdtError::malformed_snapshot(e.to_string()))
    }

    fn heads(&self) -> Vec<ChangeId> {
        let mut heads: Vec<ChangeId> = self.heads.iter().cloned().collect();
        heads.sort();
        heads
    }

    fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key).and_then(|r| r.value.as_ref())
    }

    fn keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, r)| r.value.is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_change_is_visible_immediately() {
        let mut doc = LwwDocument::empty();
        doc.emit_change(
            "actor1",
            vec![Op::Set {
                key: "title".to_string(),
                value: serde_json::json!("hello"),
            }],
        )
        .unwrap();
        assert_eq!(doc.get("title"), Some(&serde_json::json!("hello")));
    }

    #[test]
    fn applying_same_change_twice_is_idempotent() {
        let mut doc = LwwDocument::empty();
        let change = doc
            .emit_change(
                "actor1",
                vec![Op::Set {
                    key: "title".to_string(),
                    value: serde_json::json!("hello"),
                }],
            )
            .unwrap();

        let mut replica = LwwDocument::empty();
        replica.apply_change(&change).unwrap();
        replica.apply_change(&change).unwrap();
        assert_eq!(replica.get("title"), Some(&serde_json::json!("hello")));
        assert_eq!(replica.heads().len(), 1);
    }

    #[test]
    fn concurrent_writes_resolve_deterministically_on_both_replicas() {
        let mut doc_a = LwwDocument::empty();
        let mut doc_b = LwwDocument::empty();

        let change_a = doc_a
            .emit_change(
                "alice",
                vec![Op::Set {
                    key: "title".to_string(),
                    value: serde_json::json!("from alice"),
                }],
            )
            .unwrap();
        let change_b = doc_b
            .emit_change(
                "bob",
                vec![Op::Set {
                    key: "title".to_string(),
                    value: serde_json::json!("from bob"),
                }],
            )
            .unwrap();

        doc_a.apply_change(&change_b).unwrap();
        doc_b.apply_change(&change_a).unwrap();

        assert_eq!(doc_a.get("title"), doc_b.get("title"));
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut doc = LwwDocument::empty();
        doc.emit_change(
            "actor1",
            vec![Op::Set {
                key: "a".to_string(),
                value: serde_json::json!(1),
            }],
        )
        .unwrap();
        let snapshot = doc.snapshot();
        let restored = LwwDocument::restore(&snapshot).unwrap();
        assert_eq!(restored.get("a"), doc.get("a"));
        assert_eq!(restored.heads(), doc.heads());
    }

    #[test]
    fn delete_removes_key() {
        let mut doc = LwwDocument::empty();
        doc.emit_change(
            "actor1",
            vec![Op::Set {
                key: "a".to_string(),
                value: serde_json::json!(1),
            }],
        )
        .unwrap();
        doc.emit_change("actor1", vec![Op::Delete { key: "a".to_string() }]).unwrap();
        assert_eq!(doc.get("a"), None);
    }

    #[test]
    fn heads_advance_as_changes_apply() {
        let mut doc = LwwDocument::empty();
        let c1 = doc
            .emit_change(
                "actor1",
                vec![Op::Set {
                    key: "a".to_string(),
                    value: serde_json::json!(1),
                }],
            )
            .unwrap();
        assert_eq!(doc.heads().len(), 1);

        let mut replica = LwwDocument::empty();
        replica.apply_change(&c1).unwrap();
        replica
            .emit_change(
                "actor2",
                vec![Op::Set {
                    key: "b".to_string(),
                    value: serde_json::json!(2),
                }],
            )
            .unwrap();
        // actor2's change depends on c1's head, so only the new head remains.
        assert_eq!(replica.heads().len(), 1);
    }
}
