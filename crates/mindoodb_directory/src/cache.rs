//! The directory's unified cache: trust state, group membership, and
//! settings, built incrementally from the underlying admin-only database's
//! documents in modification order.

use mindoodb_core::Cursor;
use std::collections::{HashMap, HashSet};

/// A purge request recorded by a `useroperation / requestdochistorypurge`
/// document, surfaced for the tenant to act on.
#[derive(Debug, Clone)]
pub struct PurgeRequest {
    /// The database the purge targets.
    pub db_id: String,
    /// The document to purge.
    pub doc_id: String,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Milliseconds since epoch the request was recorded.
    pub requested_at: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GroupEntry {
    pub(crate) doc_id: String,
    pub(crate) members_hashes: HashSet<String>,
}

/// A registered user's identity as recorded by their grant document,
/// tracked per `username_hash` so re-registration can be checked for
/// key consistency.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Base64-encoded Ed25519 signing public key.
    pub signing_public_key: String,
    /// Base64-encoded DER RSA encryption public key.
    pub encryption_public_key: String,
    /// The grant document's id.
    pub doc_id: String,
}

/// The four caches described in the spec, plus the cursor driving their
/// incremental construction.
#[derive(Debug, Default)]
pub struct UnifiedCache {
    pub(crate) last_cursor: Option<Cursor>,
    /// `publicKey (base64) -> isActive`.
    pub(crate) trusted_keys: HashMap<String, bool>,
    /// `docId -> publicKey`, so a revoke can locate the key its grant doc named.
    pub(crate) grant_doc_id_to_public_key: HashMap<String, String>,
    /// `lowercased groupName -> group state`.
    pub(crate) groups: HashMap<String, GroupEntry>,
    /// Tenant-wide settings document, last-write-wins.
    pub(crate) tenant_settings: Option<serde_json::Value>,
    /// `dbId -> settings document`, last-write-wins per db.
    pub(crate) db_settings: HashMap<String, serde_json::Value>,
    /// Purge requests observed so far, oldest first.
    pub(crate) purge_requests: Vec<PurgeRequest>,
    /// `username_hash -> first-seen identity`, used to detect re-registration
    /// under different keys.
    pub(crate) users_by_hash: HashMap<String, UserRecord>,
}

impl UnifiedCache {
    /// Invalidates the cache entirely, forcing a rebuild from scratch on
    /// the next consult.
    pub(crate) fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn apply_grant(&mut self, username_hash: &str, signing_public_key: &str, encryption_public_key: &str, doc_id: &str) {
        let already_revoked = self.trusted_keys.get(signing_public_key) == Some(&false);
        if !already_revoked {
            self.trusted_keys.insert(signing_public_key.to_string(), true);
        }
        self.grant_doc_id_to_public_key.insert(doc_id.to_string(), signing_public_key.to_string());
        self.users_by_hash.entry(username_hash.to_string()).or_insert_with(|| UserRecord {
            signing_public_key: signing_public_key.to_string(),
            encryption_public_key: encryption_public_key.to_string(),
            doc_id: doc_id.to_string(),
        });
    }

    /// The first-registered identity for `username_hash`, if any.
    #[must_use]
    pub fn user_record(&self, username_hash: &str) -> Option<&UserRecord> {
        self.users_by_hash.get(username_hash)
    }

    pub(crate) fn apply_revoke(&mut self, revoke_doc_id: &str) {
        match self.grant_doc_id_to_public_key.get(revoke_doc_id).cloned() {
            Some(public_key) => {
                self.trusted_keys.insert(public_key, false);
            }
            None => {
                tracing::warn!(revoke_doc_id, "revoke references unknown grant doc; will resolve on full rebuild");
            }
        }
    }

    pub(crate) fn apply_group(&mut self, doc_id: &str, group_name_lower: &str, members_hashes: &[String], deleted: bool) {
        if deleted {
            self.groups.remove(group_name_lower);
            return;
        }
        let entry = self.groups.entry(group_name_lower.to_string()).or_insert_with(|| GroupEntry {
            doc_id: doc_id.to_string(),
            members_hashes: HashSet::new(),
        });
        entry.members_hashes.extend(members_hashes.iter().cloned());
    }

    pub(crate) fn apply_tenant_settings(&mut self, payload: serde_json::Value) {
        self.tenant_settings = Some(payload);
    }

    pub(crate) fn apply_db_settings(&mut self, db_id: &str, payload: serde_json::Value) {
        self.db_settings.insert(db_id.to_string(), payload);
    }

    pub(crate) fn apply_purge_request(&mut self, request: PurgeRequest) {
        self.purge_requests.push(request);
    }

    /// Current trust state for `public_key`, if the cache has seen it.
    #[must_use]
    pub fn trusted_key_state(&self, public_key: &str) -> Option<bool> {
        self.trusted_keys.get(public_key).copied()
    }

    /// All purge requests observed so far.
    #[must_use]
    pub fn purge_requests(&self) -> &[PurgeRequest] {
        &self.purge_requests
    }

    /// A group's current member hashes, if it exists.
    #[must_use]
    pub fn group_members(&self, group_name_lower: &str) -> Option<&HashSet<String>> {
        self.groups.get(group_name_lower).map(|g| &g.members_hashes)
    }

    /// Every group name currently recorded (lowercased).
    #[must_use]
    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }
}
