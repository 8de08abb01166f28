//! [`LocalCacheStore`] and its in-memory, file-backed, and encrypted
//! implementations.
//!
//! The store is a flat, opaque byte map keyed by `(type, id)` — it does not
//! interpret what it stores. `type` groups related entries (`"db-meta"`,
//! `"doc"`, `"vv"`); `id` identifies one entry within that group.

use crate::error::CacheResult;
use mindoodb_crypto::aead::{self, SymmetricKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// An opaque byte store keyed by `(type, id)`.
///
/// Implementations must be `Send + Sync`: the [`crate::CacheManager`] flushes
/// cacheables from a background task while the application thread may read
/// concurrently.
pub trait LocalCacheStore: Send + Sync {
    /// Reads the bytes stored for `(kind, id)`, or `None` if absent.
    fn get(&self, kind: &str, id: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Writes `value` for `(kind, id)`, overwriting any existing entry.
    fn put(&self, kind: &str, id: &str, value: &[u8]) -> CacheResult<()>;

    /// Removes the entry for `(kind, id)`, if present. Removing a missing
    /// entry is not an error.
    fn delete(&self, kind: &str, id: &str) -> CacheResult<()>;

    /// Lists the ids currently stored under `kind`.
    fn list(&self, kind: &str) -> CacheResult<Vec<String>>;

    /// Removes every entry under `kind`.
    fn clear(&self, kind: &str) -> CacheResult<()>;
}

/// An in-memory cache store. Useful for tests and for databases that opt
/// out of disk-backed caching.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCacheStore for MemoryCacheStore {
    fn get(&self, kind: &str, id: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(&(kind.to_string(), id.to_string())).cloned())
    }

    fn put(&self, kind: &str, id: &str, value: &[u8]) -> CacheResult<()> {
        self.entries
            .write()
            .insert((kind.to_string(), id.to_string()), value.to_vec());
        Ok(())
    }

    fn delete(&self, kind: &str, id: &str) -> CacheResult<()> {
        self.entries.write().remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }

    fn list(&self, kind: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|(k, _)| k == kind)
            .map(|(_, id)| id.clone())
            .collect())
    }

    fn clear(&self, kind: &str) -> CacheResult<()> {
        self.entries.write().retain(|(k, _), _| k != kind);
        Ok(())
    }
}

/// Percent-encodes an id for use as a filename: everything but
/// `[A-Za-z0-9_-]` becomes `%XX`.
fn percent_encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => out.push(*byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode_id(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// A cache store backed by plain files under `<base_path>/<kind>/<id>.bin`.
///
/// Writes go through a temp-file-then-rename, matching the EntryStore's
/// crash-safety pattern: a reader never observes a partially written file.
#[derive(Debug)]
pub struct FileCacheStore {
    base_path: PathBuf,
}

impl FileCacheStore {
    /// Opens (creating if needed) a file-backed cache store rooted at `base_path`.
    pub fn open(base_path: impl Into<PathBuf>) -> CacheResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn kind_dir(&self, kind: &str) -> PathBuf {
        self.base_path.join(kind)
    }

    fn entry_path(&self, kind: &str, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.bin", percent_encode_id(id)))
    }
}

impl LocalCacheStore for FileCacheStore {
    fn get(&self, kind: &str, id: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.entry_path(kind, id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, kind: &str, id: &str, value: &[u8]) -> CacheResult<()> {
        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)?;
        let final_path = self.entry_path(kind, id);
        let tmp_path = dir.join(format!(".{}.tmp", percent_encode_id(id)));

        {
            let mut file = fs::File::create(&tmp_path)?;
            use std::io::Write;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        if let Ok(dir_handle) = fs::File::open(&dir) {
            let _ = dir_handle.sync_all();
        }
        Ok(())
    }

    fn delete(&self, kind: &str, id: &str) -> CacheResult<()> {
        let path = self.entry_path(kind, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, kind: &str) -> CacheResult<Vec<String>> {
        let dir = self.kind_dir(kind);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".bin") {
                if let Some(id) = percent_decode_id(stem) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    fn clear(&self, kind: &str) -> CacheResult<()> {
        let dir = self.kind_dir(kind);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A cache store wrapper that encrypts every value at rest with AES-256-GCM
/// before delegating to an inner store. Keys and ids are left in the clear
/// (they only ever name a `(db, doc)` pair, never document content).
pub struct EncryptedCacheStore<S: LocalCacheStore> {
    inner: S,
    key: SymmetricKey,
}

impl<S: LocalCacheStore> EncryptedCacheStore<S> {
    /// Wraps `inner`, encrypting every value written through it with `key`.
    pub fn new(inner: S, key: SymmetricKey) -> Self {
        Self { inner, key }
    }
}

impl<S: LocalCacheStore> LocalCacheStore for EncryptedCacheStore<S> {
    fn get(&self, kind: &str, id: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.inner.get(kind, id)? {
            Some(ciphertext) => match aead::decrypt_payload(&ciphertext, &self.key) {
                Ok(plaintext) => Ok(Some(plaintext)),
                Err(_) => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn put(&self, kind: &str, id: &str, value: &[u8]) -> CacheResult<()> {
        let ciphertext = aead::encrypt_payload(value, &self.key)?;
        self.inner.put(kind, id, &ciphertext)
    }

    fn delete(&self, kind: &str, id: &str) -> CacheResult<()> {
        self.inner.delete(kind, id)
    }

    fn list(&self, kind: &str) -> CacheResult<Vec<String>> {
        self.inner.list(kind)
    }

    fn clear(&self, kind: &str) -> CacheResult<()> {
        self.inner.clear(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryCacheStore::new();
        store.put("doc", "abc", b"hello").unwrap();
        assert_eq!(store.get("doc", "abc").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("doc", "missing").unwrap(), None);
    }

    #[test]
    fn memory_store_list_and_clear() {
        let store = MemoryCacheStore::new();
        store.put("doc", "a", b"1").unwrap();
        store.put("doc", "b", b"2").unwrap();
        store.put("db-meta", "a", b"3").unwrap();

        let mut ids = store.list("doc").unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        store.clear("doc").unwrap();
        assert!(store.list("doc").unwrap().is_empty());
        assert_eq!(store.get("db-meta", "a").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn memory_store_delete_missing_is_ok() {
        let store = MemoryCacheStore::new();
        store.delete("doc", "missing").unwrap();
    }

    #[test]
    fn percent_encoding_roundtrips_unsafe_ids() {
        let id = "tenant/db:A 1";
        let encoded = percent_encode_id(id);
        assert!(!encoded.contains('/'));
        assert_eq!(percent_decode_id(&encoded).unwrap(), id);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::open(dir.path()).unwrap();

        store.put("doc", "tenant/db:1", b"snapshot bytes").unwrap();
        assert_eq!(
            store.get("doc", "tenant/db:1").unwrap(),
            Some(b"snapshot bytes".to_vec())
        );

        let ids = store.list("doc").unwrap();
        assert_eq!(ids, vec!["tenant/db:1".to_string()]);

        store.delete("doc", "tenant/db:1").unwrap();
        assert_eq!(store.get("doc", "tenant/db:1").unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCacheStore::open(dir.path()).unwrap();
            store.put("db-meta", "main", b"cursor=42").unwrap();
        }
        let store = FileCacheStore::open(dir.path()).unwrap();
        assert_eq!(store.get("db-meta", "main").unwrap(), Some(b"cursor=42".to_vec()));
    }

    #[test]
    fn file_store_clear_removes_kind_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::open(dir.path()).unwrap();
        store.put("doc", "a", b"1").unwrap();
        store.put("db-meta", "a", b"2").unwrap();

        store.clear("doc").unwrap();
        assert!(store.list("doc").unwrap().is_empty());
        assert_eq!(store.get("db-meta", "a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn encrypted_store_hides_plaintext_from_inner() {
        let inner = MemoryCacheStore::new();
        let key = SymmetricKey::generate();
        let encrypted = EncryptedCacheStore::new(inner, key);

        encrypted.put("doc", "a", b"plaintext payload").unwrap();
        assert_eq!(encrypted.get("doc", "a").unwrap(), Some(b"plaintext payload".to_vec()));
    }

    #[test]
    fn encrypted_store_wrong_key_fails_to_decrypt() {
        let inner = MemoryCacheStore::new();
        let key = SymmetricKey::generate();
        let encrypted = EncryptedCacheStore::new(inner, key);
        encrypted.put("doc", "a", b"secret").unwrap();

        let raw = encrypted.inner.get("doc", "a").unwrap().unwrap();
        let wrong_key = SymmetricKey::generate();
        assert!(aead::decrypt_payload(&raw, &wrong_key).is_err());
    }

    #[test]
    fn encrypted_store_get_returns_none_for_tampered_or_wrong_key_entry() {
        let inner = MemoryCacheStore::new();
        let key = SymmetricKey::generate();
        let encrypted = EncryptedCacheStore::new(inner, key);
        encrypted.put("doc", "a", b"secret").unwrap();

        let wrong_key = SymmetricKey::generate();
        let reader = EncryptedCacheStore { inner: encrypted.inner, key: wrong_key };
        assert_eq!(reader.get("doc", "a").unwrap(), None);
    }
}
