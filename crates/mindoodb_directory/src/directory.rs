//! [`TenantDirectory`]: the distinguished admin-only database recording
//! trust, groups, settings, and purge requests.

use crate::cache::{PurgeRequest, UnifiedCache};
use crate::error::{DirectoryError, DirectoryResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mindoodb_core::Database;
use mindoodb_crypto::hybrid::PublicEncryptionKey;
use mindoodb_crypto::signing::{PublicSigningKey, SigningKeyPair};
use mindoodb_crypto::hash_username;
use mindoodb_entrystore::EntryMetadata;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const SCAN_BATCH: usize = 256;

fn encode_signing_key(key: &PublicSigningKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Computes the hashes a username's group memberships may be recorded
/// under: the literal username, progressively wildcarded DN suffixes
/// (`*/OU=.../O=...`), and the global wildcard `*`.
fn username_hash_variants(username: &str) -> Vec<String> {
    let mut variants = vec![hash_username(username)];
    let parts: Vec<&str> = username.split('/').collect();
    for i in 1..parts.len() {
        let variant = format!("*/{}", parts[i..].join("/"));
        variants.push(hash_username(&variant));
    }
    variants.push(hash_username("*"));
    variants
}

/// The tenant's distinguished admin-only database: grants, revokes, groups,
/// settings, and purge requests, with a unified trust cache built
/// incrementally from its document stream.
pub struct TenantDirectory {
    db: Arc<Database>,
    admin_public_key: PublicSigningKey,
    cache: RwLock<UnifiedCache>,
}

impl TenantDirectory {
    /// Wraps an admin-only [`Database`] as a directory. Fails if the
    /// database was not opened with `adminOnlyDb=true` — a defensive check
    /// against accidentally treating an ordinary database as the directory.
    pub fn open(db: Arc<Database>, admin_public_key: PublicSigningKey) -> DirectoryResult<Self> {
        if !db.is_admin_only_db() {
            return Err(DirectoryError::NotAdminOnly { db_id: db.db_id().to_string() });
        }
        Ok(Self {
            db,
            admin_public_key,
            cache: RwLock::new(UnifiedCache::default()),
        })
    }

    /// The underlying admin-only database.
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Advances the unified cache to reflect every document entry written
    /// so far, processing strictly in `(createdAt, id)` order.
    pub fn advance_cache(&self) -> DirectoryResult<()> {
        let mut cache = self.cache.write();
        loop {
            let scan_cursor = cache.last_cursor.clone();
            let result = self.db.process_changes_since(scan_cursor, SCAN_BATCH);
            for meta in &result.entries {
                self.process_entry(&mut cache, meta);
            }
            cache.last_cursor = result.next_cursor.clone();
            if !result.has_more {
                break;
            }
        }
        Ok(())
    }

    /// Forces a full rebuild of the unified cache from scratch.
    pub fn rebuild_cache(&self) -> DirectoryResult<()> {
        self.cache.write().invalidate();
        self.advance_cache()
    }

    fn process_entry(&self, cache: &mut UnifiedCache, meta: &EntryMetadata) {
        let Ok(doc_id) = mindoodb_core::DocId::parse(&meta.doc_id) else {
            tracing::warn!(doc_id = %meta.doc_id, "directory entry has malformed docId, skipping");
            return;
        };
        let Some(document) = self.db.get_document(doc_id) else {
            return;
        };
        let payload = &document.payload;
        let form = payload.get("form").and_then(Value::as_str).unwrap_or("");
        let kind = payload.get("type").and_then(Value::as_str).unwrap_or("");

        match (form, kind) {
            ("useroperation", "grantaccess") => {
                let (Some(username_hash), Some(signing_pk), Some(encryption_pk)) = (
                    payload.get("username_hash").and_then(Value::as_str),
                    payload.get("userSigningPublicKey").and_then(Value::as_str),
                    payload.get("userEncryptionPublicKey").and_then(Value::as_str),
                ) else {
                    tracing::warn!(doc_id = %meta.doc_id, "grantaccess document missing required fields");
                    return;
                };
                cache.apply_grant(username_hash, signing_pk, encryption_pk, &meta.doc_id);
            }
            ("useroperation", "revokeaccess") => {
                let Some(revoke_doc_id) = payload.get("revokeDocId").and_then(Value::as_str) else {
                    tracing::warn!(doc_id = %meta.doc_id, "revokeaccess document missing revokeDocId");
                    return;
                };
                cache.apply_revoke(revoke_doc_id);
            }
            ("group", "group") => {
                let Some(group_name) = payload.get("groupName").and_then(Value::as_str) else {
                    tracing::warn!(doc_id = %meta.doc_id, "group document missing groupName");
                    return;
                };
                let members_hashes: Vec<String> = payload
                    .get("members_hashes")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                let deleted = document.is_deleted
                    || payload.get("_deleted").and_then(Value::as_bool).unwrap_or(false);
                cache.apply_group(&meta.doc_id, &group_name.to_lowercase(), &members_hashes, deleted);
            }
            ("tenantsettings", _) => {
                cache.apply_tenant_settings(payload.clone());
            }
            ("dbsettings", _) => {
                if let Some(db_id) = payload.get("dbId").and_then(Value::as_str) {
                    cache.apply_db_settings(db_id, payload.clone());
                }
            }
            ("useroperation", "requestdochistorypurge") => {
                let (Some(db_id), Some(doc_id_field)) = (
                    payload.get("dbId").and_then(Value::as_str),
                    payload.get("docId").and_then(Value::as_str),
                ) else {
                    tracing::warn!(doc_id = %meta.doc_id, "purge request missing dbId/docId");
                    return;
                };
                cache.apply_purge_request(PurgeRequest {
                    db_id: db_id.to_string(),
                    doc_id: doc_id_field.to_string(),
                    reason: payload.get("reason").and_then(Value::as_str).map(str::to_string),
                    requested_at: payload.get("requestedAt").and_then(Value::as_i64).unwrap_or(document.created_at),
                });
            }
            _ => {}
        }
    }

    /// Decides whether `public_key` is currently trusted: the
    /// administration key always is; keys present in `additional_trusted_keys`
    /// use that out-of-band verdict; otherwise the unified cache (advanced
    /// first) is consulted.
    pub fn validate_public_signing_key(
        &self,
        public_key: &PublicSigningKey,
        additional_trusted_keys: Option<&HashMap<String, bool>>,
    ) -> DirectoryResult<bool> {
        if public_key.as_bytes() == self.admin_public_key.as_bytes() {
            return Ok(true);
        }
        let encoded = encode_signing_key(public_key);
        if let Some(extra) = additional_trusted_keys {
            if let Some(&trusted) = extra.get(&encoded) {
                return Ok(trusted);
            }
        }
        self.advance_cache()?;
        Ok(self.cache.read().trusted_key_state(&encoded).unwrap_or(false))
    }

    /// Resolves the group names `username` currently belongs to, following
    /// nested group membership upward with a visited-set cycle guard.
    pub fn resolve_groups_for_user(&self, username: &str) -> DirectoryResult<Vec<String>> {
        self.advance_cache()?;
        let cache = self.cache.read();
        let variants = username_hash_variants(username);

        let mut visited = std::collections::HashSet::new();
        let mut frontier = Vec::new();
        for name in cache.group_names() {
            if let Some(members) = cache.group_members(&name) {
                if variants.iter().any(|v| members.contains(v)) && visited.insert(name.clone()) {
                    frontier.push(name.clone());
                }
            }
        }

        let mut idx = 0;
        while idx < frontier.len() {
            let name = frontier[idx].clone();
            idx += 1;
            let group_as_member_hash = hash_username(&name);
            for parent in cache.group_names() {
                if visited.contains(&parent) {
                    continue;
                }
                if let Some(members) = cache.group_members(&parent) {
                    if members.contains(&group_as_member_hash) && visited.insert(parent.clone()) {
                        frontier.push(parent);
                    }
                }
            }
        }
        Ok(frontier)
    }

    /// Registers `username` with the given key pair, signed by the
    /// directory's default signer (expected to be the administration key).
    /// A case-insensitive username already registered under different keys
    /// fails with [`DirectoryError::DuplicateUser`]; identical keys are a
    /// no-op.
    pub fn register_user(
        &self,
        username: &str,
        signing_public_key: &PublicSigningKey,
        encryption_public_key: &PublicEncryptionKey,
        admin_encryption_public_key: &PublicEncryptionKey,
        signer: &SigningKeyPair,
    ) -> DirectoryResult<()> {
        self.advance_cache()?;
        let username_hash = hash_username(username);
        let signing_encoded = encode_signing_key(signing_public_key);
        let encryption_der = encryption_public_key
            .to_der()
            .map_err(mindoodb_core::CoreError::from)?;
        let encryption_encoded = BASE64.encode(&encryption_der);

        if let Some(existing) = self.cache.read().user_record(&username_hash) {
            if existing.signing_public_key == signing_encoded && existing.encryption_public_key == encryption_encoded {
                return Ok(());
            }
            return Err(DirectoryError::DuplicateUser { username: username.to_string() });
        }

        let username_encrypted = admin_encryption_public_key
            .encrypt_hybrid(username.as_bytes())
            .map_err(mindoodb_core::CoreError::from)?;

        let payload = serde_json::json!({
            "form": "useroperation",
            "type": "grantaccess",
            "username_hash": username_hash,
            "username_encrypted": BASE64.encode(&username_encrypted),
            "userSigningPublicKey": signing_encoded,
            "userEncryptionPublicKey": encryption_encoded,
        });
        self.db.create_document_with_signing_key(payload, signer, "$publicinfos")?;
        self.advance_cache()?;
        Ok(())
    }

    /// Reads, without advancing the cache, every purge request observed so
    /// far.
    pub fn pending_purge_requests(&self) -> DirectoryResult<Vec<crate::cache::PurgeRequest>> {
        self.advance_cache()?;
        Ok(self.cache.read().purge_requests().to_vec())
    }
}
