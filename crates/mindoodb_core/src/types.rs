//! Core data types shared across the change engine: document identifiers,
//! payloads, cursors, and attachment references.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A document identifier: a UUIDv7 so ids sort roughly by creation time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(Uuid);

impl DocId {
    /// Generates a new UUIDv7 document id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID as a document id (used when restoring from storage).
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a document id from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DocId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

/// A document's plaintext payload: an arbitrary JSON value, CRDT-merged
/// field by field.
pub type MindooDocPayload = serde_json::Value;

/// Resume point for [`crate::Database::process_changes_since`] and friends:
/// the `(createdAt, id)` of the last entry consumed.
pub type Cursor = mindoodb_entrystore::Cursor;

/// A reference to one named attachment on a document: the head of its
/// `attachment_chunk` dependency chain plus bookkeeping needed to stream it
/// back out without re-walking the whole chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentReference {
    /// The attachment's name within the owning document.
    pub name: String,
    /// A stable id for this attachment's chunk chain (the `fileUuid7` used
    /// in every `attachment_chunk` entry id for this attachment).
    pub file_uuid: String,
    /// Id of the newest chunk in the chain (dependency walks start here).
    pub head_chunk_id: String,
    /// Total plaintext byte length across all chunks.
    pub total_size: u64,
    /// Declared content/MIME type, if known.
    pub content_type: Option<String>,
}

/// A document's full engine-side state: its CRDT contents plus the
/// bookkeeping the [`crate::Database`] needs to serve reads and route
/// incoming entries.
#[derive(Debug, Clone)]
pub struct DocumentState {
    /// The document's id.
    pub doc_id: DocId,
    /// Milliseconds since epoch of the first entry that created this document.
    pub created_at: i64,
    /// Milliseconds since epoch of the most recently applied entry.
    pub last_modified: i64,
    /// Whether a `doc_delete` tombstone has been applied.
    pub is_deleted: bool,
    /// Named attachments currently referenced by this document.
    pub attachments: Vec<AttachmentReference>,
    /// Number of `doc_change`/`doc_create` entries applied since the last
    /// `doc_snapshot` (drives the snapshot-emission heuristic).
    pub changes_since_snapshot: u32,
}

impl DocumentState {
    /// Creates a fresh, empty document state.
    #[must_use]
    pub fn new(doc_id: DocId, created_at: i64) -> Self {
        Self {
            doc_id,
            created_at,
            last_modified: created_at,
            is_deleted: false,
            attachments: Vec::new(),
            changes_since_snapshot: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_roundtrips_through_string() {
        let id = DocId::new();
        let parsed = DocId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn doc_id_is_unique() {
        assert_ne!(DocId::new(), DocId::new());
    }
}
