//! Entry id construction, following the grammar enforced by
//! [`mindoodb_entrystore::StoreEntry::id_is_well_formed`]:
//! `^[A-Za-z0-9_-]+_(d|a)_[A-Za-z0-9_-]+$`.

use crate::types::DocId;
use mindoodb_crypto::sha256_hex;
use uuid::Uuid;

/// Builds a `doc_*` entry id: `<docId>_d_<depsFingerprint>_<crdtHash>`.
///
/// `depsFingerprint` is the first 16 hex characters of
/// `SHA-256(sorted(dependencyIds).join(","))`; `crdtHash` is the change's
/// own content-derived id (already hex, from [`mindoodb_crdt::Change::id`]).
#[must_use]
pub fn doc_entry_id(doc_id: &DocId, dependency_ids: &[String], crdt_hash: &str) -> String {
    let fingerprint = deps_fingerprint(dependency_ids);
    format!("{doc_id}_d_{fingerprint}_{crdt_hash}")
}

/// Computes the `depsFingerprint` used in `doc_*` entry ids.
#[must_use]
pub fn deps_fingerprint(dependency_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = dependency_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let joined = sorted.join(",");
    sha256_hex(joined.as_bytes())[..16].to_string()
}

/// Builds an `attachment_chunk` entry id:
/// `<docId>_a_<fileUuid7>_<base62(chunkUuid7)>`.
#[must_use]
pub fn attachment_chunk_id(doc_id: &DocId, file_uuid: &str, chunk_uuid: Uuid) -> String {
    format!("{doc_id}_a_{file_uuid}_{}", base62_uuid(chunk_uuid))
}

/// Generates a fresh UUIDv7 suitable for use as a `fileUuid`, rendered as
/// plain hyphenless hex to stay within the id grammar's token alphabet.
#[must_use]
pub fn new_file_uuid() -> String {
    Uuid::now_v7().simple().to_string()
}

fn base62_uuid(uuid: Uuid) -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut value = u128::from_be_bytes(*uuid.as_bytes());
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % 62) as usize;
        digits.push(ALPHABET[digit]);
        value /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base62 alphabet is ASCII")
}
