//! `StoreEntry` and related wire types.

use serde::{Deserialize, Serialize};

/// The kind of a [`StoreEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// First entry for a document: establishes its CRDT state.
    DocCreate,
    /// Incremental CRDT change applied on top of prior entries.
    DocChange,
    /// A full CRDT state snapshot, used to cap dependency walks.
    DocSnapshot,
    /// Tombstone marking a document deleted.
    DocDelete,
    /// One chunk of an attachment's byte stream.
    AttachmentChunk,
}

impl EntryType {
    /// Returns the single-character infix used in entry ids: `d` for
    /// document entries, `a` for attachment chunks.
    #[must_use]
    pub fn id_infix(self) -> &'static str {
        match self {
            EntryType::AttachmentChunk => "a",
            _ => "d",
        }
    }
}

/// An immutable, signed, encrypted append-only log record.
///
/// Fields are listed in wire order: this ordering is significant for
/// hashing and signing (`contentHash = SHA-256(encryptedData)`,
/// `signature = Ed25519.sign(encryptedData)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    /// The kind of entry.
    pub entry_type: EntryType,
    /// Globally unique id, matching `^[A-Za-z0-9_-]+_(d|a)_[A-Za-z0-9_-]+$`.
    pub id: String,
    /// `SHA-256(encrypted_data)` hex digest; payload bytes are deduplicated
    /// at rest by this value.
    pub content_hash: String,
    /// The document this entry belongs to.
    pub doc_id: String,
    /// Ids of entries this one causally depends on (CRDT heads at write time).
    pub dependency_ids: Vec<String>,
    /// Creation time, milliseconds since epoch.
    pub created_at: i64,
    /// SPKI/PEM-encoded Ed25519 public key of the signer.
    pub created_by_public_key: String,
    /// Which KeyBag entry decrypts `encrypted_data` (`"default"` or a named key id).
    pub decryption_key_id: String,
    /// 64-byte Ed25519 signature over `encrypted_data`, base64-encoded.
    pub signature: String,
    /// Plaintext payload size in bytes.
    pub original_size: i64,
    /// Encrypted payload size in bytes.
    pub encrypted_size: i64,
    /// `iv(12) || ciphertext || tag(16)`, or the attachment frame
    /// `mode || iv || ciphertext || tag`.
    pub encrypted_data: Vec<u8>,
}

impl StoreEntry {
    /// Validates the entry id grammar: `^[A-Za-z0-9_-]+_(d|a)_[A-Za-z0-9_-]+$`.
    #[must_use]
    pub fn id_is_well_formed(id: &str) -> bool {
        fn is_token_char(c: char) -> bool {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        }

        for infix in ["_d_", "_a_"] {
            if let Some(pos) = id.find(infix) {
                let (head, tail) = (&id[..pos], &id[pos + infix.len()..]);
                if !head.is_empty()
                    && !tail.is_empty()
                    && head.chars().all(is_token_char)
                    && tail.chars().all(is_token_char)
                {
                    return true;
                }
            }
        }
        false
    }

    /// The metadata half of this entry, excluding the payload bytes, as
    /// persisted in a metadata segment.
    #[must_use]
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            entry_type: self.entry_type,
            id: self.id.clone(),
            content_hash: self.content_hash.clone(),
            doc_id: self.doc_id.clone(),
            dependency_ids: self.dependency_ids.clone(),
            created_at: self.created_at,
            created_by_public_key: self.created_by_public_key.clone(),
            decryption_key_id: self.decryption_key_id.clone(),
            signature: self.signature.clone(),
            original_size: self.original_size,
            encrypted_size: self.encrypted_size,
        }
    }
}

/// `StoreEntry` without `encrypted_data`, as persisted in a metadata
/// segment file; the payload lives in a separate content-addressed blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The kind of entry.
    pub entry_type: EntryType,
    /// Entry id.
    pub id: String,
    /// Content hash of the associated payload blob.
    pub content_hash: String,
    /// Document this entry belongs to.
    pub doc_id: String,
    /// Causal dependency ids.
    pub dependency_ids: Vec<String>,
    /// Creation time, milliseconds since epoch.
    pub created_at: i64,
    /// Signer's public key.
    pub created_by_public_key: String,
    /// Decryption key id.
    pub decryption_key_id: String,
    /// Base64-encoded signature.
    pub signature: String,
    /// Plaintext size.
    pub original_size: i64,
    /// Ciphertext size.
    pub encrypted_size: i64,
}

impl EntryMetadata {
    /// Re-attaches payload bytes, producing a full [`StoreEntry`].
    #[must_use]
    pub fn with_payload(self, encrypted_data: Vec<u8>) -> StoreEntry {
        StoreEntry {
            entry_type: self.entry_type,
            id: self.id,
            content_hash: self.content_hash,
            doc_id: self.doc_id,
            dependency_ids: self.dependency_ids,
            created_at: self.created_at,
            created_by_public_key: self.created_by_public_key,
            decryption_key_id: self.decryption_key_id,
            signature: self.signature,
            original_size: self.original_size,
            encrypted_size: self.encrypted_size,
            encrypted_data,
        }
    }
}

/// A strict total order marker over `(createdAt, id)`, used to resume
/// [`crate::EntryStore::scan_entries_since`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    /// `createdAt` of the last entry yielded.
    pub created_at: i64,
    /// `id` of the last entry yielded, breaking ties on `createdAt`.
    pub id: String,
}

/// Result of a [`crate::EntryStore::scan_entries_since`] call.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Entries in `(createdAt ASC, id ASC)` order.
    pub entries: Vec<EntryMetadata>,
    /// Cursor to resume from, if any entries were returned.
    pub next_cursor: Option<Cursor>,
    /// Whether more entries exist strictly after `next_cursor`.
    pub has_more: bool,
}

/// Filters accepted by [`crate::EntryStore::scan_entries_since`].
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    /// Restrict to entries of this type.
    pub entry_type: Option<EntryType>,
    /// Restrict to entries belonging to this document.
    pub doc_id: Option<String>,
}

/// Options for [`crate::EntryStore::resolve_dependencies`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Stop descending past an entry of this type (typically `DocSnapshot`).
    pub stop_at_entry_type: Option<EntryType>,
    /// Maximum BFS depth to explore.
    pub max_depth: Option<u32>,
    /// Whether to include the starting entry itself in the result.
    pub include_start: bool,
}

/// A probabilistic summary of the id set, used to prune exact reconciliation
/// before a full `findNewEntries` round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomSummary {
    /// Format tag, currently always `"bloom-v1"`.
    pub version: String,
    /// Number of ids folded into the filter.
    pub total_ids: usize,
    /// Size of the bitset in bits.
    pub bit_count: usize,
    /// Number of hash functions used.
    pub hash_count: u32,
    /// Random salt mixed into each hash to avoid cross-store collisions.
    pub salt: u64,
    /// Base64-encoded bitset.
    pub bitset_base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_doc_entry_id() {
        assert!(StoreEntry::id_is_well_formed("doc123_d_0001"));
    }

    #[test]
    fn valid_attachment_entry_id() {
        assert!(StoreEntry::id_is_well_formed("att-abc_a_chunk-1"));
    }

    #[test]
    fn rejects_missing_infix() {
        assert!(!StoreEntry::id_is_well_formed("doc123-0001"));
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(!StoreEntry::id_is_well_formed("_d_0001"));
        assert!(!StoreEntry::id_is_well_formed("doc123_d_"));
    }

    #[test]
    fn id_infix_matches_entry_type() {
        assert_eq!(EntryType::DocCreate.id_infix(), "d");
        assert_eq!(EntryType::AttachmentChunk.id_infix(), "a");
    }
}
