//! # MindooDB KeyBag
//!
//! A namespaced container of symmetric keys addressable by
//! `(keyKind, keyId)`, e.g. `("tenant", tenantId)` or `("doc", "$publicinfos")`.
//! Holds an in-memory `keyId -> Vec<KeyEntry>` map per kind, newest-first,
//! so a document re-keyed mid-life can still decrypt older entries signed
//! under a previous key version.
//!
//! Persisted as a single AES-256-GCM blob, encrypted with a key derived
//! from `(userPassword, "key-bag-encryption")` via PBKDF2-SHA256. See
//! [`blob`] for the on-disk framing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod error;

pub use error::{KeyBagError, KeyBagResult};

use mindoodb_crypto::signing::EncryptedPrivateKey;
use mindoodb_crypto::{derive_key, resolve_iterations, SymmetricKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Domain-separation string used to derive the blob's own wrapping key.
pub const KEY_BAG_ENCRYPTION_SALT: &str = "key-bag-encryption";
/// Default `saltString` for `decryptAndImportKey` when the caller does not
/// supply one.
pub const DEFAULT_SALT_STRING: &str = "default";

/// A single versioned key, with an optional creation timestamp preserved
/// across rotation and re-export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Raw symmetric key bytes.
    pub bytes: Vec<u8>,
    /// Milliseconds since epoch, if known.
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KeyTable {
    // keyKind -> keyId -> versions, newest-first.
    entries: HashMap<String, HashMap<String, Vec<KeyEntry>>>,
}

/// Password-encrypted container of symmetric keys.
pub struct KeyBag {
    table: RwLock<KeyTable>,
}

impl KeyBag {
    /// Creates a new, empty KeyBag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(KeyTable::default()),
        }
    }

    /// Returns the newest key for `(kind, keyId)`, if any.
    #[must_use]
    pub fn get(&self, kind: &str, key_id: &str) -> Option<Vec<u8>> {
        self.table
            .read()
            .entries
            .get(kind)
            .and_then(|m| m.get(key_id))
            .and_then(|versions| versions.first())
            .map(|e| e.bytes.clone())
    }

    /// Returns all versions for `(kind, keyId)`, newest-first.
    #[must_use]
    pub fn get_all(&self, kind: &str, key_id: &str) -> Vec<KeyEntry> {
        self.table
            .read()
            .entries
            .get(kind)
            .and_then(|m| m.get(key_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Appends a new version of `(kind, keyId)`, making it the newest.
    pub fn set(&self, kind: &str, key_id: &str, bytes: Vec<u8>, created_at: Option<i64>) {
        let mut table = self.table.write();
        let versions = table
            .entries
            .entry(kind.to_string())
            .or_default()
            .entry(key_id.to_string())
            .or_default();
        versions.insert(0, KeyEntry { bytes, created_at });
    }

    /// Decrypts an [`EncryptedPrivateKey`] with `password` (and `saltString`,
    /// defaulting to [`DEFAULT_SALT_STRING`]) and imports it as the newest
    /// version of `(kind, keyId)`.
    pub fn decrypt_and_import_key(
        &self,
        kind: &str,
        key_id: &str,
        encrypted: &EncryptedPrivateKey,
        password: &[u8],
        salt_string: Option<&str>,
    ) -> KeyBagResult<()> {
        let salt_string = salt_string.unwrap_or(DEFAULT_SALT_STRING);
        let key = mindoodb_crypto::signing::decrypt_symmetric_key(encrypted, password, salt_string)?;
        self.set(kind, key_id, key.as_bytes().to_vec(), encrypted.created_at);
        Ok(())
    }

    /// Re-encrypts the newest version of `(kind, keyId)` under `password`,
    /// using PBKDF2 with `keyId` as the salt string, preserving `createdAt`.
    pub fn encrypt_and_export_key(
        &self,
        kind: &str,
        key_id: &str,
        password: &[u8],
    ) -> KeyBagResult<EncryptedPrivateKey> {
        let versions = self.get_all(kind, key_id);
        let newest = versions
            .first()
            .ok_or_else(|| KeyBagError::key_not_found(kind, key_id))?;
        let key = SymmetricKey::from_bytes(&newest.bytes)?;
        let mut encrypted = mindoodb_crypto::signing::encrypt_symmetric_key(
            &key,
            password,
            key_id,
            resolve_iterations(None),
        )?;
        encrypted.created_at = newest.created_at;
        Ok(encrypted)
    }

    /// Deletes all versions of `(kind, keyId)`.
    pub fn delete_key(&self, kind: &str, key_id: &str) {
        if let Some(m) = self.table.write().entries.get_mut(kind) {
            m.remove(key_id);
        }
    }

    /// Lists all key ids registered under `kind`.
    #[must_use]
    pub fn list_keys(&self, kind: &str) -> Vec<String> {
        self.table
            .read()
            .entries
            .get(kind)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Serializes and encrypts the whole table to bytes, ready to write to
    /// disk. `password` derives the wrapping key with
    /// [`KEY_BAG_ENCRYPTION_SALT`].
    pub fn save_to_bytes(&self, password: &[u8]) -> KeyBagResult<Vec<u8>> {
        let plaintext = serde_json::to_vec(&*self.table.read())?;
        let salt = mindoodb_crypto::pbkdf::generate_salt();
        let key = derive_key(password, &salt, KEY_BAG_ENCRYPTION_SALT, resolve_iterations(None));
        let ciphertext = blob::encrypt_blob(&plaintext, &key);

        // Salt travels alongside the blob: prefix with its length so `load`
        // can recompute the same wrapping key.
        let mut out = Vec::with_capacity(1 + salt.len() + ciphertext.len());
        out.push(salt.len() as u8);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts and loads a table previously produced by [`save_to_bytes`].
    pub fn load_from_bytes(bytes: &[u8], password: &[u8]) -> KeyBagResult<Self> {
        let (&salt_len, rest) = bytes
            .split_first()
            .ok_or_else(|| KeyBagError::corrupt("empty key bag blob"))?;
        let salt_len = salt_len as usize;
        if rest.len() < salt_len {
            return Err(KeyBagError::corrupt("key bag blob truncated before salt end"));
        }
        let (salt, ciphertext) = rest.split_at(salt_len);
        let key = derive_key(password, salt, KEY_BAG_ENCRYPTION_SALT, resolve_iterations(None));
        let plaintext = blob::decrypt_blob(ciphertext, &key)?;
        let table: KeyTable = serde_json::from_slice(&plaintext)?;
        Ok(Self {
            table: RwLock::new(table),
        })
    }

    /// Saves the KeyBag to `path` atomically (temp file + rename), mirroring
    /// the crash-safe write pattern used for metadata and manifest files.
    pub fn save(&self, path: &Path, password: &[u8]) -> KeyBagResult<()> {
        let bytes = self.save_to_bytes(password)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Loads a KeyBag previously written with [`save`](Self::save).
    pub fn load(path: &Path, password: &[u8]) -> KeyBagResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, password)
    }
}

impl Default for KeyBag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_newest() {
        let bag = KeyBag::new();
        bag.set("tenant", "t1", vec![1, 2, 3], Some(100));
        bag.set("tenant", "t1", vec![4, 5, 6], Some(200));
        assert_eq!(bag.get("tenant", "t1"), Some(vec![4, 5, 6]));
    }

    #[test]
    fn get_all_is_newest_first() {
        let bag = KeyBag::new();
        bag.set("doc", "d1", vec![1], Some(1));
        bag.set("doc", "d1", vec![2], Some(2));
        let versions = bag.get_all("doc", "d1");
        assert_eq!(versions[0].bytes, vec![2]);
        assert_eq!(versions[1].bytes, vec![1]);
    }

    #[test]
    fn missing_key_returns_none() {
        let bag = KeyBag::new();
        assert_eq!(bag.get("tenant", "missing"), None);
    }

    #[test]
    fn delete_key_removes_all_versions() {
        let bag = KeyBag::new();
        bag.set("doc", "d1", vec![1], None);
        bag.delete_key("doc", "d1");
        assert!(bag.get_all("doc", "d1").is_empty());
    }

    #[test]
    fn import_and_export_roundtrip() {
        let bag = KeyBag::new();
        let key = SymmetricKey::generate();
        let encrypted =
            mindoodb_crypto::signing::encrypt_symmetric_key(&key, b"pw", "default", 60_000).unwrap();
        bag.decrypt_and_import_key("tenant", "t1", &encrypted, b"pw", None).unwrap();
        assert_eq!(bag.get("tenant", "t1"), Some(key.as_bytes().to_vec()));

        let exported = bag.encrypt_and_export_key("tenant", "t1", b"new-pw").unwrap();
        let restored = mindoodb_crypto::signing::decrypt_symmetric_key(&exported, b"new-pw", "t1").unwrap();
        assert_eq!(restored.as_bytes(), key.as_bytes());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let bag = KeyBag::new();
        bag.set("tenant", "t1", vec![9, 9, 9], Some(42));
        let bytes = bag.save_to_bytes(b"hunter2").unwrap();
        let loaded = KeyBag::load_from_bytes(&bytes, b"hunter2").unwrap();
        assert_eq!(loaded.get("tenant", "t1"), Some(vec![9, 9, 9]));
    }

    #[test]
    fn wrong_password_fails_load() {
        let bag = KeyBag::new();
        bag.set("tenant", "t1", vec![9], None);
        let bytes = bag.save_to_bytes(b"hunter2").unwrap();
        assert!(KeyBag::load_from_bytes(&bytes, b"wrong").is_err());
    }

    #[test]
    fn save_and_load_via_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keybag.bin");
        let bag = KeyBag::new();
        bag.set("doc", "$publicinfos", vec![1, 2, 3], None);
        bag.save(&path, b"pw").unwrap();

        let loaded = KeyBag::load(&path, b"pw").unwrap();
        assert_eq!(loaded.get("doc", "$publicinfos"), Some(vec![1, 2, 3]));
    }
}
