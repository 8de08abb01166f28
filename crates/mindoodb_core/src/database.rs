//! [`Database`]: the per-database change engine.
//!
//! Owns one [`EntryStore`] of `doc_*` entries (and, optionally, a second one
//! of `attachment_chunk` entries), the in-memory CRDT state reconstructed
//! from them, and the ingest pipeline that turns incoming signed/encrypted
//! entries — whether written locally or pulled from a peer — into applied
//! CRDT changes.

use crate::attachments::{chunk_windows, slice_range, split_into_chunks};
use crate::config::DatabaseConfig;
use crate::entry_id::{attachment_chunk_id, doc_entry_id, new_file_uuid};
use crate::error::{CoreError, CoreResult};
use crate::trust::TrustValidator;
use crate::txn::{AttachmentOp, DocTransaction};
use crate::types::{AttachmentReference, DocId, DocumentState, MindooDocPayload};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mindoodb_cache::{CacheManager, ICacheable, LocalCacheStore};
use mindoodb_crdt::{Change, CrdtDocument, LwwDocument, Op};
use mindoodb_crypto::signing::{PublicSigningKey, SigningKeyPair};
use mindoodb_crypto::{attachment as attachment_crypto, sha256_hex, SymmetricKey};
use mindoodb_entrystore::{EntryStore, EntryType, ResolveOptions, ScanFilters, StoreEntry};
use mindoodb_keybag::KeyBag;
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    /// Set while a `changeDoc` callback is executing, so a reentrant call
    /// from inside the callback is rejected rather than deadlocking.
    static IN_CHANGE_SCOPE: Cell<bool> = const { Cell::new(false) };
}

/// Outcome of a [`Database::sync_store_changes`] / [`Database::push_changes_to`] call.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Entries successfully applied to CRDT state.
    pub applied: usize,
    /// Entries dropped for failing an integrity or signature check.
    pub dropped_corrupt: usize,
    /// Entries dropped because their signer isn't trusted.
    pub dropped_untrusted: usize,
    /// Entries parked awaiting a KeyBag entry that hasn't arrived yet.
    pub parked_missing_key: usize,
    /// Entries buffered awaiting a CRDT dependency that hasn't arrived yet.
    pub buffered_missing_dep: usize,
}

impl SyncReport {
    fn merge(&mut self, other: &SyncReport) {
        self.applied += other.applied;
        self.dropped_corrupt += other.dropped_corrupt;
        self.dropped_untrusted += other.dropped_untrusted;
        self.parked_missing_key += other.parked_missing_key;
        self.buffered_missing_dep += other.buffered_missing_dep;
    }
}

/// A document as returned from a read, with the bookkeeping a caller needs
/// beyond the raw CRDT payload.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    /// The document's id.
    pub doc_id: DocId,
    /// Current merged field values.
    pub payload: MindooDocPayload,
    /// Whether a `doc_delete` tombstone has been applied.
    pub is_deleted: bool,
    /// Milliseconds since epoch the document was first created.
    pub created_at: i64,
    /// Milliseconds since epoch of the most recent applied change.
    pub last_modified: i64,
    /// Named attachments currently referenced.
    pub attachments: Vec<AttachmentReference>,
}

struct DocumentEntry {
    crdt: LwwDocument,
    state: DocumentState,
}

/// The per-database change engine.
pub struct Database {
    db_id: String,
    tenant_id: String,
    config: DatabaseConfig,
    entry_store: EntryStore,
    attachment_store: Option<EntryStore>,
    keybag: Arc<KeyBag>,
    trust: Arc<dyn TrustValidator>,
    signer: Arc<SigningKeyPair>,
    cache: Option<Arc<CacheManager>>,
    documents: RwLock<HashMap<DocId, DocumentEntry>>,
    doc_locks: Mutex<HashMap<DocId, Arc<Mutex<()>>>>,
    mod_order: RwLock<BTreeSet<(i64, String)>>,
    pending_missing_dep: Mutex<HashMap<String, Vec<StoreEntry>>>,
    pending_missing_key: Mutex<HashMap<(String, String), Vec<StoreEntry>>>,
    dirty: AtomicBool,
}

impl Database {
    /// Opens (creating if absent) the database at `base_path/db_id`,
    /// replaying its entry store into memory. No attachment support.
    pub fn open(
        base_path: &Path,
        db_id: &str,
        tenant_id: &str,
        config: DatabaseConfig,
        keybag: Arc<KeyBag>,
        trust: Arc<dyn TrustValidator>,
        signer: Arc<SigningKeyPair>,
    ) -> CoreResult<Self> {
        let entry_store = EntryStore::open(base_path, db_id)?;
        let db = Self {
            db_id: db_id.to_string(),
            tenant_id: tenant_id.to_string(),
            config,
            entry_store,
            attachment_store: None,
            keybag,
            trust,
            signer,
            cache: None,
            documents: RwLock::new(HashMap::new()),
            doc_locks: Mutex::new(HashMap::new()),
            mod_order: RwLock::new(BTreeSet::new()),
            pending_missing_dep: Mutex::new(HashMap::new()),
            pending_missing_key: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        };
        db.rebuild_from_entry_store()?;
        Ok(db)
    }

    /// Attaches a second, independent entry store under
    /// `base_path/<db_id>-attachments` for `attachment_chunk` entries.
    pub fn with_attachment_store(mut self, base_path: &Path) -> CoreResult<Self> {
        let store = EntryStore::open(base_path, &format!("{}-attachments", self.db_id))?;
        self.attachment_store = Some(store);
        Ok(self)
    }

    /// Registers this database with a [`CacheManager`] so it flushes its
    /// `db-meta`/`doc` cache entries on the manager's debounce schedule.
    pub fn with_cache(self: Arc<Self>, cache: Arc<CacheManager>) -> Arc<Self> {
        cache.register(Arc::clone(&self) as Arc<dyn ICacheable>);
        self
    }

    /// Whether every write to this database must be signed by the tenant's
    /// administration key (true for `TenantDirectory` and any database
    /// opened with `admin_only: true`).
    #[must_use]
    pub fn is_admin_only_db(&self) -> bool {
        self.config.admin_only
    }

    /// This database's id.
    #[must_use]
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    fn encode_pubkey(key: &PublicSigningKey) -> String {
        BASE64.encode(key.as_bytes())
    }

    fn decode_pubkey(encoded: &str) -> CoreResult<PublicSigningKey> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::CorruptionError { id: format!("pubkey:{e}") })?;
        Ok(PublicSigningKey::from_bytes(&bytes)?)
    }

    fn resolve_decryption_key(&self, decryption_key_id: &str) -> Option<SymmetricKey> {
        let bytes = if decryption_key_id == "default" {
            self.keybag.get("tenant", &self.tenant_id)
        } else {
            self.keybag.get("doc", decryption_key_id)
        }?;
        SymmetricKey::from_bytes(&bytes).ok()
    }

    fn per_doc_lock(&self, doc_id: DocId) -> Arc<Mutex<()>> {
        Arc::clone(self.doc_locks.lock().entry(doc_id).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    // ---- document creation -------------------------------------------------

    /// Creates a new document with the default signer and the tenant's
    /// default symmetric key.
    pub fn create_document(&self, payload: MindooDocPayload) -> CoreResult<DocId> {
        let signer = Arc::clone(&self.signer);
        self.create_document_with_signing_key(payload, &signer, "default")
    }

    /// Creates a new document, encrypted under a specific named KeyBag entry
    /// (`KeyBag("doc", key_id)`) rather than the tenant's default key.
    pub fn create_encrypted_document(&self, payload: MindooDocPayload, key_id: &str) -> CoreResult<DocId> {
        let signer = Arc::clone(&self.signer);
        self.create_document_with_signing_key(payload, &signer, key_id)
    }

    /// Creates a new document signed by an explicit key pair rather than
    /// this database's default signer.
    pub fn create_document_with_signing_key(
        &self,
        payload: MindooDocPayload,
        signing_key: &SigningKeyPair,
        decryption_key_id: &str,
    ) -> CoreResult<DocId> {
        let doc_id = DocId::new();
        let ops = payload_to_ops(&payload);
        let mut crdt = LwwDocument::empty();
        let actor_id = Self::encode_pubkey(&signing_key.public_key());
        let change_bytes = crdt.emit_change(&actor_id, ops)?;
        let change = Change::decode(&change_bytes)?;

        let now = current_millis();
        let entry = self.seal_entry(
            EntryType::DocCreate,
            &doc_id,
            &change,
            &change_bytes,
            now,
            signing_key,
            decryption_key_id,
        )?;
        self.entry_store.put_entries(std::slice::from_ref(&entry))?;

        self.documents.write().insert(
            doc_id,
            DocumentEntry {
                crdt,
                state: DocumentState::new(doc_id, now),
            },
        );
        self.mod_order.write().insert((now, doc_id.to_string()));
        self.mark_dirty();
        Ok(doc_id)
    }

    // ---- changeDoc ----------------------------------------------------------

    /// Applies `change_fn` to `doc_id` under the document's write lock,
    /// signing and storing the result with this database's default signer.
    pub fn change_doc(
        &self,
        doc_id: DocId,
        change_fn: impl FnOnce(&mut DocTransaction) -> CoreResult<()>,
    ) -> CoreResult<()> {
        let signer = Arc::clone(&self.signer);
        self.change_doc_with_signing_key(doc_id, change_fn, &signer)
    }

    /// Like [`Self::change_doc`], signed by an explicit key pair.
    pub fn change_doc_with_signing_key(
        &self,
        doc_id: DocId,
        change_fn: impl FnOnce(&mut DocTransaction) -> CoreResult<()>,
        signing_key: &SigningKeyPair,
    ) -> CoreResult<()> {
        if IN_CHANGE_SCOPE.with(Cell::get) {
            return Err(CoreError::invalid_use("changeDoc called re-entrantly from inside a changeDoc callback"));
        }

        let lock = self.per_doc_lock(doc_id);
        let _guard = lock.lock();

        if !self.documents.read().contains_key(&doc_id) {
            return Err(CoreError::DocumentNotFound { doc_id: doc_id.to_string() });
        }

        let (ops, attachment_ops) = {
            let documents = self.documents.read();
            let current = &documents.get(&doc_id).expect("checked above").crdt;
            let lookup = |key: &str| current.get(key).cloned();
            let mut txn = DocTransaction::new(&lookup);

            IN_CHANGE_SCOPE.with(|flag| flag.set(true));
            let result = change_fn(&mut txn);
            IN_CHANGE_SCOPE.with(|flag| flag.set(false));
            result?;
            (txn.ops, txn.attachment_ops)
        };

        if ops.is_empty() && attachment_ops.is_empty() {
            return Ok(());
        }

        if !ops.is_empty() {
            self.apply_local_change(doc_id, ops, EntryType::DocChange, signing_key, "default")?;
        }
        for op in attachment_ops {
            self.apply_attachment_op(doc_id, op, signing_key)?;
        }

        self.mark_dirty();
        Ok(())
    }

    fn apply_local_change(
        &self,
        doc_id: DocId,
        ops: Vec<Op>,
        entry_type: EntryType,
        signing_key: &SigningKeyPair,
        decryption_key_id: &str,
    ) -> CoreResult<()> {
        let actor_id = Self::encode_pubkey(&signing_key.public_key());
        let now = current_millis();

        let change_bytes = {
            let mut documents = self.documents.write();
            let doc = documents.get_mut(&doc_id).expect("existence checked by caller");
            let bytes = doc.crdt.emit_change(&actor_id, ops)?;
            doc.state.last_modified = doc.state.last_modified.max(now);
            if entry_type == EntryType::DocDelete {
                doc.state.is_deleted = true;
            }
            doc.state.changes_since_snapshot += 1;
            bytes
        };
        let change = Change::decode(&change_bytes)?;
        let entry = self.seal_entry(entry_type, &doc_id, &change, &change_bytes, now, signing_key, decryption_key_id)?;
        self.entry_store.put_entries(std::slice::from_ref(&entry))?;
        self.mod_order.write().insert((now, doc_id.to_string()));

        self.maybe_emit_snapshot(doc_id, signing_key, decryption_key_id)?;
        Ok(())
    }

    fn maybe_emit_snapshot(&self, doc_id: DocId, signing_key: &SigningKeyPair, decryption_key_id: &str) -> CoreResult<()> {
        let due = {
            let documents = self.documents.read();
            documents
                .get(&doc_id)
                .map(|d| d.state.changes_since_snapshot >= self.config.snapshot_interval)
                .unwrap_or(false)
        };
        if !due {
            return Ok(());
        }

        let (snapshot_bytes, heads) = {
            let documents = self.documents.read();
            let doc = documents.get(&doc_id).expect("checked above");
            (doc.crdt.snapshot(), doc.crdt.heads())
        };

        let now = current_millis();
        let key = self
            .resolve_decryption_key(decryption_key_id)
            .ok_or_else(|| CoreError::SymmetricKeyNotFound {
                kind: key_kind_for(decryption_key_id),
                key_id: decryption_key_id.to_string(),
            })?;
        let encrypted = mindoodb_crypto::encrypt_payload(&snapshot_bytes, &key)?;
        let content_hash = sha256_hex(&encrypted);
        let signature = signing_key.sign(&encrypted);
        let fingerprint_deps = heads.clone();
        let snapshot_hash = sha256_hex(&snapshot_bytes);
        let id = doc_entry_id(&doc_id, &fingerprint_deps, &snapshot_hash);

        let entry = StoreEntry {
            entry_type: EntryType::DocSnapshot,
            id,
            content_hash,
            doc_id: doc_id.to_string(),
            dependency_ids: fingerprint_deps,
            created_at: now,
            created_by_public_key: Self::encode_pubkey(&signing_key.public_key()),
            decryption_key_id: decryption_key_id.to_string(),
            signature: BASE64.encode(signature),
            original_size: snapshot_bytes.len() as i64,
            encrypted_size: encrypted.len() as i64,
            encrypted_data: encrypted,
        };
        self.entry_store.put_entries(std::slice::from_ref(&entry))?;

        if let Some(doc) = self.documents.write().get_mut(&doc_id) {
            doc.state.changes_since_snapshot = 0;
        }
        Ok(())
    }

    fn seal_entry(
        &self,
        entry_type: EntryType,
        doc_id: &DocId,
        change: &Change,
        change_bytes: &[u8],
        created_at: i64,
        signing_key: &SigningKeyPair,
        decryption_key_id: &str,
    ) -> CoreResult<StoreEntry> {
        let key = self
            .resolve_decryption_key(decryption_key_id)
            .ok_or_else(|| CoreError::SymmetricKeyNotFound {
                kind: key_kind_for(decryption_key_id),
                key_id: decryption_key_id.to_string(),
            })?;
        let encrypted = mindoodb_crypto::encrypt_payload(change_bytes, &key)?;
        let content_hash = sha256_hex(&encrypted);
        let signature = signing_key.sign(&encrypted);
        let crdt_hash = change.id();
        let id = doc_entry_id(doc_id, &change.deps, &crdt_hash);

        Ok(StoreEntry {
            entry_type,
            id,
            content_hash,
            doc_id: doc_id.to_string(),
            dependency_ids: change.deps.clone(),
            created_at,
            created_by_public_key: Self::encode_pubkey(&signing_key.public_key()),
            decryption_key_id: decryption_key_id.to_string(),
            signature: BASE64.encode(signature),
            original_size: change_bytes.len() as i64,
            encrypted_size: encrypted.len() as i64,
            encrypted_data: encrypted,
        })
    }

    // ---- deletion -------------------------------------------------------------

    /// Marks `doc_id` deleted (a CRDT tombstone field), signed by the
    /// default signer. The document's history is retained until purged.
    pub fn delete_document(&self, doc_id: DocId) -> CoreResult<()> {
        let signer = Arc::clone(&self.signer);
        self.delete_document_with_signing_key(doc_id, &signer)
    }

    /// Like [`Self::delete_document`], signed by an explicit key pair.
    pub fn delete_document_with_signing_key(&self, doc_id: DocId, signing_key: &SigningKeyPair) -> CoreResult<()> {
        let lock = self.per_doc_lock(doc_id);
        let _guard = lock.lock();
        if !self.documents.read().contains_key(&doc_id) {
            return Err(CoreError::DocumentNotFound { doc_id: doc_id.to_string() });
        }
        let ops = vec![Op::Set {
            key: "_deleted".to_string(),
            value: serde_json::Value::Bool(true),
        }];
        self.apply_local_change(doc_id, ops, EntryType::DocDelete, signing_key, "default")?;
        self.mark_dirty();
        Ok(())
    }

    // ---- reads --------------------------------------------------------------

    /// Returns the current state of `doc_id`, or `None` if it doesn't exist.
    #[must_use]
    pub fn get_document(&self, doc_id: DocId) -> Option<RetrievedDocument> {
        let documents = self.documents.read();
        let entry = documents.get(&doc_id)?;
        Some(Self::retrieved(doc_id, entry))
    }

    fn retrieved(doc_id: DocId, entry: &DocumentEntry) -> RetrievedDocument {
        let mut payload = serde_json::Map::new();
        for key in entry.crdt.keys() {
            if let Some(value) = entry.crdt.get(&key) {
                payload.insert(key, value.clone());
            }
        }
        RetrievedDocument {
            doc_id,
            payload: serde_json::Value::Object(payload),
            is_deleted: entry.state.is_deleted,
            created_at: entry.state.created_at,
            last_modified: entry.state.last_modified,
            attachments: entry.state.attachments.clone(),
        }
    }

    /// Reconstructs `doc_id` as of `timestamp` (milliseconds since epoch) by
    /// replaying only entries with `createdAt <= timestamp`, starting from
    /// the newest qualifying snapshot.
    pub fn get_document_at_timestamp(&self, doc_id: DocId, timestamp: i64) -> CoreResult<Option<RetrievedDocument>> {
        let mut metas = self.entry_store.find_entries(EntryType::DocCreate, i64::MIN, timestamp + 1);
        metas.extend(self.entry_store.find_entries(EntryType::DocChange, i64::MIN, timestamp + 1));
        metas.extend(self.entry_store.find_entries(EntryType::DocSnapshot, i64::MIN, timestamp + 1));
        metas.extend(self.entry_store.find_entries(EntryType::DocDelete, i64::MIN, timestamp + 1));
        metas.retain(|m| m.doc_id == doc_id.to_string());
        if metas.is_empty() {
            return Ok(None);
        }
        metas.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let ids: Vec<String> = metas.iter().map(|m| m.id.clone()).collect();
        let entries = self.entry_store.get_entries(&ids)?;

        let mut crdt = LwwDocument::empty();
        let mut state = DocumentState::new(doc_id, metas[0].created_at);
        for entry in &entries {
            let key = self
                .resolve_decryption_key(&entry.decryption_key_id)
                .ok_or_else(|| CoreError::SymmetricKeyNotFound {
                    kind: key_kind_for(&entry.decryption_key_id),
                    key_id: entry.decryption_key_id.clone(),
                })?;
            let plaintext = match entry.entry_type {
                EntryType::DocSnapshot => mindoodb_crypto::decrypt_payload(&entry.encrypted_data, &key)?,
                _ => mindoodb_crypto::decrypt_payload(&entry.encrypted_data, &key)?,
            };
            match entry.entry_type {
                EntryType::DocSnapshot => crdt = LwwDocument::restore(&plaintext)?,
                EntryType::DocDelete => crdt.apply_change(&plaintext)?,
                _ => crdt.apply_change(&plaintext)?,
            }
            state.last_modified = state.last_modified.max(entry.created_at);
            if entry.entry_type == EntryType::DocDelete {
                state.is_deleted = true;
            }
        }

        Ok(Some(Self::retrieved(
            doc_id,
            &DocumentEntry { crdt, state },
        )))
    }

    /// Every currently known document id.
    #[must_use]
    pub fn get_all_document_ids(&self) -> Vec<DocId> {
        self.documents.read().keys().copied().collect()
    }

    // ---- sync -----------------------------------------------------------------

    /// Scans entries created after `cursor`, without applying them (they may
    /// already be reflected in this database's own CRDT state). Used by
    /// subscribers that just want to observe the raw entry stream.
    #[must_use]
    pub fn process_changes_since(&self, cursor: Option<mindoodb_entrystore::Cursor>, limit: usize) -> mindoodb_entrystore::ScanResult {
        self.entry_store.scan_entries_since(cursor.as_ref(), limit, &ScanFilters::default())
    }

    /// Like [`Self::process_changes_since`], yielding successive batches of
    /// at most `batch_size` until the store is exhausted.
    pub fn iterate_changes_since(&self, mut cursor: Option<mindoodb_entrystore::Cursor>, batch_size: usize) -> Vec<mindoodb_entrystore::ScanResult> {
        let mut batches = Vec::new();
        loop {
            let result = self.entry_store.scan_entries_since(cursor.as_ref(), batch_size, &ScanFilters::default());
            let has_more = result.has_more;
            cursor = result.next_cursor.clone();
            let empty = result.entries.is_empty();
            batches.push(result);
            if !has_more || empty {
                break;
            }
        }
        batches
    }

    /// Ingests entries from a peer (or any external source): verifies
    /// integrity, signature, and trust, resolves the decryption key, and
    /// applies the CRDT change, batched at `config.sync_batch_size` entries
    /// per pass.
    pub fn sync_store_changes(&self, incoming: Vec<StoreEntry>) -> CoreResult<SyncReport> {
        let mut report = SyncReport::default();
        for batch in incoming.chunks(self.config.sync_batch_size.max(1)) {
            let batch_report = self.ingest_batch(batch)?;
            report.merge(&batch_report);
        }
        Ok(report)
    }

    fn ingest_batch(&self, batch: &[StoreEntry]) -> CoreResult<SyncReport> {
        let mut report = SyncReport::default();
        let known_ids: HashSet<String> = self.entry_store.get_all_ids().into_iter().collect();
        let batch_ids: HashSet<String> = batch.iter().map(|e| e.id.clone()).collect();

        for entry in batch {
            // Step 1: metadata check.
            if known_ids.contains(&entry.id) {
                continue;
            }

            // Step 2: integrity.
            if sha256_hex(&entry.encrypted_data) != entry.content_hash {
                tracing::warn!(id = %entry.id, "dropping entry with content hash mismatch");
                report.dropped_corrupt += 1;
                continue;
            }

            // Step 3: signature.
            let Ok(signer) = Self::decode_pubkey(&entry.created_by_public_key) else {
                tracing::warn!(id = %entry.id, "dropping entry with malformed signer key");
                report.dropped_corrupt += 1;
                continue;
            };
            let Ok(signature) = BASE64.decode(&entry.signature) else {
                tracing::warn!(id = %entry.id, "dropping entry with malformed signature encoding");
                report.dropped_corrupt += 1;
                continue;
            };
            if signer.verify(&entry.encrypted_data, &signature).is_err() {
                tracing::warn!(id = %entry.id, "dropping entry with invalid signature");
                report.dropped_corrupt += 1;
                continue;
            }

            // Step 4: trust.
            if !self.trust.validate_public_signing_key(&signer) {
                tracing::warn!(id = %entry.id, "dropping entry from untrusted signer");
                report.dropped_untrusted += 1;
                continue;
            }

            // Step 5: decryption key resolution.
            let Some(key) = self.resolve_decryption_key(&entry.decryption_key_id) else {
                self.park_for_missing_key(&entry.decryption_key_id, entry.clone());
                report.parked_missing_key += 1;
                continue;
            };

            // Dependency check before CRDT apply.
            if !self.dependencies_satisfied(entry, &known_ids, &batch_ids) {
                self.buffer_missing_dependency(entry.clone());
                report.buffered_missing_dep += 1;
                continue;
            }

            self.commit_incoming_entry(entry, &key)?;
            report.applied += 1;
            self.drain_pending_for_doc(&entry.doc_id, &mut report)?;
        }
        Ok(report)
    }

    fn dependencies_satisfied(&self, entry: &StoreEntry, known_ids: &HashSet<String>, batch_ids: &HashSet<String>) -> bool {
        entry.dependency_ids.iter().all(|dep| known_ids.contains(dep) || batch_ids.contains(dep))
    }

    fn commit_incoming_entry(&self, entry: &StoreEntry, key: &SymmetricKey) -> CoreResult<()> {
        let doc_id = DocId::parse(&entry.doc_id).map_err(|_| CoreError::CorruptionError { id: entry.id.clone() })?;
        let plaintext = mindoodb_crypto::decrypt_payload(&entry.encrypted_data, key)?;

        {
            let mut documents = self.documents.write();
            match entry.entry_type {
                EntryType::DocSnapshot => {
                    let crdt = LwwDocument::restore(&plaintext)?;
                    let state = documents
                        .remove(&doc_id)
                        .map(|d| d.state)
                        .unwrap_or_else(|| DocumentState::new(doc_id, entry.created_at));
                    documents.insert(doc_id, DocumentEntry { crdt, state });
                }
                EntryType::DocCreate => {
                    let mut crdt = LwwDocument::empty();
                    crdt.apply_change(&plaintext)?;
                    documents.insert(doc_id, DocumentEntry { crdt, state: DocumentState::new(doc_id, entry.created_at) });
                }
                _ => {
                    let doc = documents.entry(doc_id).or_insert_with(|| DocumentEntry {
                        crdt: LwwDocument::empty(),
                        state: DocumentState::new(doc_id, entry.created_at),
                    });
                    doc.crdt.apply_change(&plaintext)?;
                    doc.state.last_modified = doc.state.last_modified.max(entry.created_at);
                    doc.state.changes_since_snapshot += 1;
                    if entry.entry_type == EntryType::DocDelete {
                        doc.state.is_deleted = true;
                    }
                }
            }
        }

        self.entry_store.put_entries(std::slice::from_ref(entry))?;
        self.mod_order.write().insert((entry.created_at, entry.doc_id.clone()));
        self.mark_dirty();
        Ok(())
    }

    fn park_for_missing_key(&self, decryption_key_id: &str, entry: StoreEntry) {
        let kind = key_kind_for(decryption_key_id);
        self.pending_missing_key
            .lock()
            .entry((kind, decryption_key_id.to_string()))
            .or_default()
            .push(entry);
    }

    fn buffer_missing_dependency(&self, entry: StoreEntry) {
        let mut pending = self.pending_missing_dep.lock();
        let bucket = pending.entry(entry.doc_id.clone()).or_default();
        if bucket.len() >= self.config.max_pending_per_document {
            tracing::warn!(doc_id = %entry.doc_id, "dropping entry: missing-dependency buffer full");
            return;
        }
        bucket.push(entry);
    }

    fn drain_pending_for_doc(&self, doc_id: &str, report: &mut SyncReport) -> CoreResult<()> {
        loop {
            let candidates = self.pending_missing_dep.lock().remove(doc_id).unwrap_or_default();
            if candidates.is_empty() {
                return Ok(());
            }
            let known_ids: HashSet<String> = self.entry_store.get_all_ids().into_iter().collect();
            let mut still_pending = Vec::new();
            let mut applied_any = false;
            for entry in candidates {
                if !self.dependencies_satisfied(&entry, &known_ids, &HashSet::new()) {
                    still_pending.push(entry);
                    continue;
                }
                let Some(key) = self.resolve_decryption_key(&entry.decryption_key_id) else {
                    self.park_for_missing_key(&entry.decryption_key_id, entry);
                    report.parked_missing_key += 1;
                    continue;
                };
                self.commit_incoming_entry(&entry, &key)?;
                report.applied += 1;
                applied_any = true;
            }
            if !still_pending.is_empty() {
                self.pending_missing_dep.lock().insert(doc_id.to_string(), still_pending);
            }
            if !applied_any {
                return Ok(());
            }
        }
    }

    /// Retries every entry parked on `(kind, key_id)` now that a matching
    /// KeyBag entry has arrived.
    pub fn retry_parked_for_key(&self, kind: &str, key_id: &str) -> CoreResult<SyncReport> {
        let parked = self
            .pending_missing_key
            .lock()
            .remove(&(kind.to_string(), key_id.to_string()))
            .unwrap_or_default();
        self.sync_store_changes(parked)
    }

    /// Computes the set of entries present here but not in `peer`, and
    /// applies them to `peer`.
    pub fn push_changes_to(&self, peer: &Database) -> CoreResult<SyncReport> {
        let known: HashSet<String> = peer.entry_store.get_all_ids().into_iter().collect();
        let new_meta = self.entry_store.find_new_entries(&known);
        let ids: Vec<String> = new_meta.into_iter().map(|m| m.id).collect();
        let entries = self.entry_store.get_entries(&ids)?;
        peer.sync_store_changes(entries)
    }

    /// Computes the set of entries present in `peer` but not here, and
    /// applies them locally. Equivalent to `peer.push_changes_to(self)`.
    pub fn pull_changes_from(&self, peer: &Database) -> CoreResult<SyncReport> {
        peer.push_changes_to(self)
    }

    fn rebuild_from_entry_store(&self) -> CoreResult<()> {
        let mut ids: Vec<String> = self.entry_store.get_all_ids();
        ids.sort();
        if ids.is_empty() {
            return Ok(());
        }
        let mut metas = self.entry_store.find_new_entries(&HashSet::new());
        metas.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        let all_ids: Vec<String> = metas.iter().map(|m| m.id.clone()).collect();
        let entries = self.entry_store.get_entries(&all_ids)?;
        for entry in entries {
            let Some(key) = self.resolve_decryption_key(&entry.decryption_key_id) else {
                self.park_for_missing_key(&entry.decryption_key_id, entry);
                continue;
            };
            self.commit_incoming_entry(&entry, &key)?;
        }
        Ok(())
    }

    // ---- attachments: reads (any context) --------------------------------------

    /// Reads a named attachment's full contents.
    pub fn get_attachment(&self, doc_id: DocId, name: &str) -> CoreResult<Vec<u8>> {
        let windows = self.read_attachment_windows(doc_id, name)?;
        Ok(windows.into_iter().flat_map(|w| w.bytes).collect())
    }

    /// Reads a byte range `[start, end)` of a named attachment without
    /// decrypting chunks entirely outside the range... chunks are decrypted
    /// whole (chunk granularity), then clipped.
    pub fn get_attachment_range(&self, doc_id: DocId, name: &str, start: u64, end: u64) -> CoreResult<Vec<u8>> {
        let chunks: Vec<Vec<u8>> = self
            .read_attachment_chunks_raw(doc_id, name)?
            .into_iter()
            .collect();
        let windows = chunk_windows(chunks);
        Ok(slice_range(&windows, start, end))
    }

    /// Returns the attachment's plaintext chunks in order, suitable for
    /// incremental consumption without buffering the whole attachment.
    pub fn stream_attachment(&self, doc_id: DocId, name: &str) -> CoreResult<Vec<Vec<u8>>> {
        self.read_attachment_chunks_raw(doc_id, name)
    }

    fn find_attachment_ref(&self, doc_id: DocId, name: &str) -> CoreResult<AttachmentReference> {
        let documents = self.documents.read();
        let doc = documents.get(&doc_id).ok_or_else(|| CoreError::DocumentNotFound { doc_id: doc_id.to_string() })?;
        doc.state
            .attachments
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| CoreError::AttachmentNotFound { name: name.to_string(), doc_id: doc_id.to_string() })
    }

    fn read_attachment_chunks_raw(&self, doc_id: DocId, name: &str) -> CoreResult<Vec<Vec<u8>>> {
        let attachment_ref = self.find_attachment_ref(doc_id, name)?;
        let store = self
            .attachment_store
            .as_ref()
            .ok_or_else(|| CoreError::not_supported("no attachment store configured for this database"))?;

        let chain = store.resolve_dependencies(
            &attachment_ref.head_chunk_id,
            &ResolveOptions {
                stop_at_entry_type: None,
                max_depth: None,
                include_start: true,
            },
        );
        let ids: Vec<String> = chain.iter().map(|m| m.id.clone()).collect();
        let entries = store.get_entries(&ids)?;

        let key = self
            .resolve_decryption_key(entries.first().map(|e| e.decryption_key_id.as_str()).unwrap_or("default"))
            .ok_or_else(|| CoreError::SymmetricKeyNotFound { kind: "doc".to_string(), key_id: "attachment".to_string() })?;

        let mut by_id: HashMap<&str, &StoreEntry> = entries.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut ordered = Vec::new();
        // Chain is oldest-first already (resolve_dependencies sorts by (createdAt, id)).
        for meta in &chain {
            if let Some(entry) = by_id.remove(meta.id.as_str()) {
                ordered.push(attachment_crypto::decrypt_attachment_payload(&entry.encrypted_data, &key)?);
            }
        }
        Ok(ordered)
    }

    fn read_attachment_windows(&self, doc_id: DocId, name: &str) -> CoreResult<Vec<crate::attachments::ChunkWindow>> {
        Ok(chunk_windows(self.read_attachment_chunks_raw(doc_id, name)?))
    }

    // ---- attachments: writes (only reachable from inside changeDoc) -----------

    fn apply_attachment_op(&self, doc_id: DocId, op: AttachmentOp, signing_key: &SigningKeyPair) -> CoreResult<()> {
        let store = self
            .attachment_store
            .as_ref()
            .ok_or_else(|| CoreError::not_supported("no attachment store configured for this database"))?;

        match op {
            AttachmentOp::Add { name, bytes, content_type } => {
                let chunks: Vec<Vec<u8>> = split_into_chunks(&bytes, self.config.attachment_chunk_size)
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect();
                self.write_attachment_chunks(store, doc_id, name, chunks, content_type, signing_key)
            }
            AttachmentOp::AddChunks { name, chunks, content_type } => {
                self.write_attachment_chunks(store, doc_id, name, chunks, content_type, signing_key)
            }
            AttachmentOp::Append { name, bytes } => {
                let attachment_ref = self.find_attachment_ref(doc_id, &name)?;
                let chunks: Vec<Vec<u8>> = split_into_chunks(&bytes, self.config.attachment_chunk_size)
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect();
                self.append_attachment_chunks(store, doc_id, attachment_ref, chunks, signing_key)
            }
            AttachmentOp::Remove { name } => {
                let mut documents = self.documents.write();
                if let Some(doc) = documents.get_mut(&doc_id) {
                    doc.state.attachments.retain(|a| a.name != name);
                }
                Ok(())
            }
        }
    }

    fn write_attachment_chunks(
        &self,
        store: &EntryStore,
        doc_id: DocId,
        name: String,
        chunks: Vec<Vec<u8>>,
        content_type: Option<String>,
        signing_key: &SigningKeyPair,
    ) -> CoreResult<()> {
        let file_uuid = new_file_uuid();
        let key = self
            .resolve_decryption_key("default")
            .ok_or_else(|| CoreError::SymmetricKeyNotFound { kind: "tenant".to_string(), key_id: self.tenant_id.clone() })?;

        let mut previous: Option<String> = None;
        let mut total_size = 0u64;
        for chunk in &chunks {
            let entry = self.seal_attachment_chunk(&doc_id, &file_uuid, chunk, previous.take(), &key, signing_key)?;
            previous = Some(entry.id.clone());
            total_size += chunk.len() as u64;
            store.put_entries(std::slice::from_ref(&entry))?;
        }
        let head_chunk_id = previous.ok_or_else(|| CoreError::invalid_use("attachment has zero chunks"))?;

        let mut documents = self.documents.write();
        if let Some(doc) = documents.get_mut(&doc_id) {
            doc.state.attachments.retain(|a| a.name != name);
            doc.state.attachments.push(AttachmentReference {
                name,
                file_uuid,
                head_chunk_id,
                total_size,
                content_type,
            });
        }
        Ok(())
    }

    fn append_attachment_chunks(
        &self,
        store: &EntryStore,
        doc_id: DocId,
        mut attachment_ref: AttachmentReference,
        chunks: Vec<Vec<u8>>,
        signing_key: &SigningKeyPair,
    ) -> CoreResult<()> {
        let key = self
            .resolve_decryption_key("default")
            .ok_or_else(|| CoreError::SymmetricKeyNotFound { kind: "tenant".to_string(), key_id: self.tenant_id.clone() })?;

        let mut previous = Some(attachment_ref.head_chunk_id.clone());
        for chunk in &chunks {
            let entry = self.seal_attachment_chunk(&doc_id, &attachment_ref.file_uuid, chunk, previous.take(), &key, signing_key)?;
            previous = Some(entry.id.clone());
            attachment_ref.total_size += chunk.len() as u64;
            store.put_entries(std::slice::from_ref(&entry))?;
        }
        attachment_ref.head_chunk_id = previous.expect("at least one chunk appended");

        let mut documents = self.documents.write();
        if let Some(doc) = documents.get_mut(&doc_id) {
            doc.state.attachments.retain(|a| a.name != attachment_ref.name);
            doc.state.attachments.push(attachment_ref);
        }
        Ok(())
    }

    fn seal_attachment_chunk(
        &self,
        doc_id: &DocId,
        file_uuid: &str,
        plaintext: &[u8],
        previous_chunk_id: Option<String>,
        key: &SymmetricKey,
        signing_key: &SigningKeyPair,
    ) -> CoreResult<StoreEntry> {
        // Deterministic framing lets identical chunks across documents
        // dedup at rest via the entry store's content-hash addressing.
        let framed = attachment_crypto::encrypt_attachment_payload(plaintext, key, attachment_crypto::MODE_DETERMINISTIC)?;
        let content_hash = sha256_hex(&framed);
        let signature = signing_key.sign(&framed);
        let chunk_uuid = uuid::Uuid::now_v7();
        let id = attachment_chunk_id(doc_id, file_uuid, chunk_uuid);
        let now = current_millis();

        Ok(StoreEntry {
            entry_type: EntryType::AttachmentChunk,
            id,
            content_hash,
            doc_id: doc_id.to_string(),
            dependency_ids: previous_chunk_id.into_iter().collect(),
            created_at: now,
            created_by_public_key: Self::encode_pubkey(&signing_key.public_key()),
            decryption_key_id: "default".to_string(),
            signature: BASE64.encode(signature),
            original_size: plaintext.len() as i64,
            encrypted_size: framed.len() as i64,
            encrypted_data: framed,
        })
    }

    // ---- purge ------------------------------------------------------------------

    /// Physically erases `doc_id`'s history (document entries and, if
    /// configured, its attachment chunks). Breaks append-only semantics by
    /// design; used to service a `requestdochistorypurge` directory entry.
    pub fn purge_doc_history(&self, doc_id: DocId) -> CoreResult<()> {
        let has_attachments = self
            .documents
            .read()
            .get(&doc_id)
            .map(|d| !d.state.attachments.is_empty())
            .unwrap_or(false);

        if has_attachments && self.attachment_store.is_none() {
            return Err(CoreError::PurgeUnsupported {
                reason: "document has attachments but no attachment store is configured".to_string(),
            });
        }

        self.entry_store.purge_doc_history(&doc_id.to_string())?;
        if let Some(store) = &self.attachment_store {
            store.purge_doc_history(&doc_id.to_string())?;
        }
        self.documents.write().remove(&doc_id);
        self.doc_locks.lock().remove(&doc_id);
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        if let Some(cache) = &self.cache {
            cache.mark_dirty();
        }
    }
}

impl ICacheable for Database {
    fn cache_prefix(&self) -> String {
        format!("{}:{}", self.tenant_id, self.db_id)
    }

    fn has_dirty_state(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn flush_to_cache(&self, store: &dyn LocalCacheStore) -> Result<(), String> {
        let prefix = self.cache_prefix();
        let last_cursor = self.mod_order.read().iter().next_back().cloned();
        let meta = serde_json::json!({
            "lastModified": last_cursor.map(|(t, id)| serde_json::json!({"createdAt": t, "id": id})),
            "documentCount": self.documents.read().len(),
        });
        let bytes = serde_json::to_vec(&meta).map_err(|e| e.to_string())?;
        store.put("db-meta", &prefix, &bytes).map_err(|e| e.to_string())
    }

    fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

fn key_kind_for(decryption_key_id: &str) -> String {
    if decryption_key_id == "default" {
        "tenant".to_string()
    } else {
        "doc".to_string()
    }
}

fn payload_to_ops(payload: &MindooDocPayload) -> Vec<Op> {
    match payload {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| Op::Set { key: k.clone(), value: v.clone() })
            .collect(),
        other => vec![Op::Set { key: "value".to_string(), value: other.clone() }],
    }
}

fn current_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::AdminKeyOnly;

    struct TrustAll;
    impl TrustValidator for TrustAll {
        fn validate_public_signing_key(&self, _public_key: &PublicSigningKey) -> bool {
            true
        }
    }

    fn test_db(dir: &Path) -> (Arc<Database>, Arc<SigningKeyPair>) {
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let signer = Arc::new(SigningKeyPair::generate());
        let db = Database::open(dir, "db1", "t1", DatabaseConfig::default(), keybag, Arc::new(TrustAll), Arc::clone(&signer)).unwrap();
        (Arc::new(db), signer)
    }

    #[test]
    fn create_and_get_document_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _signer) = test_db(dir.path());
        let doc_id = db.create_document(serde_json::json!({"title": "hello"})).unwrap();
        let doc = db.get_document(doc_id).unwrap();
        assert_eq!(doc.payload["title"], "hello");
        assert!(!doc.is_deleted);
    }

    #[test]
    fn change_doc_applies_queued_ops() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _signer) = test_db(dir.path());
        let doc_id = db.create_document(serde_json::json!({"title": "v1"})).unwrap();
        db.change_doc(doc_id, |tx| {
            tx.set("title", serde_json::json!("v2"));
            Ok(())
        })
        .unwrap();
        let doc = db.get_document(doc_id).unwrap();
        assert_eq!(doc.payload["title"], "v2");
    }

    #[test]
    fn nested_change_doc_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _signer) = test_db(dir.path());
        let doc_id = db.create_document(serde_json::json!({"a": 1})).unwrap();
        let db2 = Arc::clone(&db);
        let result = db.change_doc(doc_id, move |tx| {
            tx.set("a", serde_json::json!(2));
            let inner = db2.change_doc(doc_id, |tx2| {
                tx2.set("a", serde_json::json!(3));
                Ok(())
            });
            assert!(matches!(inner, Err(CoreError::InvalidUseError { .. })));
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn delete_document_sets_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _signer) = test_db(dir.path());
        let doc_id = db.create_document(serde_json::json!({"a": 1})).unwrap();
        db.delete_document(doc_id).unwrap();
        assert!(db.get_document(doc_id).unwrap().is_deleted);
    }

    #[test]
    fn untrusted_signer_is_dropped_not_errored() {
        let dir = tempfile::tempdir().unwrap();
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let admin = Arc::new(SigningKeyPair::generate());
        let outsider = SigningKeyPair::generate();
        let db = Database::open(
            dir.path(),
            "db1",
            "t1",
            DatabaseConfig::default(),
            Arc::clone(&keybag),
            Arc::new(AdminKeyOnly::new(admin.public_key())),
            Arc::clone(&admin),
        )
        .unwrap();

        let mut crdt = LwwDocument::empty();
        let bytes = crdt
            .emit_change("outsider", vec![Op::Set { key: "x".to_string(), value: serde_json::json!(1) }])
            .unwrap();
        let change = Change::decode(&bytes).unwrap();
        let key = SymmetricKey::from_bytes(&keybag.get("tenant", "t1").unwrap()).unwrap();
        let encrypted = mindoodb_crypto::encrypt_payload(&bytes, &key).unwrap();
        let doc_id = DocId::new();
        let entry = StoreEntry {
            entry_type: EntryType::DocCreate,
            id: doc_entry_id(&doc_id, &change.deps, &change.id()),
            content_hash: sha256_hex(&encrypted),
            doc_id: doc_id.to_string(),
            dependency_ids: change.deps.clone(),
            created_at: current_millis(),
            created_by_public_key: Database::encode_pubkey(&outsider.public_key()),
            decryption_key_id: "default".to_string(),
            signature: BASE64.encode(outsider.sign(&encrypted)),
            original_size: bytes.len() as i64,
            encrypted_size: encrypted.len() as i64,
            encrypted_data: encrypted,
        };

        let report = db.sync_store_changes(vec![entry]).unwrap();
        assert_eq!(report.dropped_untrusted, 1);
        assert_eq!(report.applied, 0);
        assert!(db.get_document(doc_id).is_none());
    }

    #[test]
    fn missing_decryption_key_parks_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (db, signer) = test_db(dir.path());

        let mut crdt = LwwDocument::empty();
        let bytes = crdt
            .emit_change("a", vec![Op::Set { key: "x".to_string(), value: serde_json::json!(1) }])
            .unwrap();
        let change = Change::decode(&bytes).unwrap();
        let unknown_key = SymmetricKey::generate();
        let encrypted = mindoodb_crypto::encrypt_payload(&bytes, &unknown_key).unwrap();
        let doc_id = DocId::new();
        let entry = StoreEntry {
            entry_type: EntryType::DocCreate,
            id: doc_entry_id(&doc_id, &change.deps, &change.id()),
            content_hash: sha256_hex(&encrypted),
            doc_id: doc_id.to_string(),
            dependency_ids: change.deps.clone(),
            created_at: current_millis(),
            created_by_public_key: Database::encode_pubkey(&signer.public_key()),
            decryption_key_id: "unknown-key".to_string(),
            signature: BASE64.encode(signer.sign(&encrypted)),
            original_size: bytes.len() as i64,
            encrypted_size: encrypted.len() as i64,
            encrypted_data: encrypted,
        };

        let report = db.sync_store_changes(vec![entry]).unwrap();
        assert_eq!(report.parked_missing_key, 1);
        assert!(db.get_document(doc_id).is_none());
    }

    #[test]
    fn push_and_pull_changes_sync_two_databases() {
        let dir1 = tempfile::tempdir().unwrap();
        let dir2 = tempfile::tempdir().unwrap();
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let signer = Arc::new(SigningKeyPair::generate());

        let db1 = Database::open(dir1.path(), "db1", "t1", DatabaseConfig::default(), Arc::clone(&keybag), Arc::new(TrustAll), Arc::clone(&signer)).unwrap();
        let db2 = Database::open(dir2.path(), "db1", "t1", DatabaseConfig::default(), Arc::clone(&keybag), Arc::new(TrustAll), Arc::clone(&signer)).unwrap();

        let doc_id = db1.create_document(serde_json::json!({"k": "v"})).unwrap();
        let report = db1.push_changes_to(&db2).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(db2.get_document(doc_id).unwrap().payload["k"], "v");
    }

    #[test]
    fn attachment_roundtrip_through_changedoc() {
        let dir = tempfile::tempdir().unwrap();
        let attachments_dir = tempfile::tempdir().unwrap();
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let signer = Arc::new(SigningKeyPair::generate());
        let db = Database::open(dir.path(), "db1", "t1", DatabaseConfig::default().attachment_chunk_size(4), Arc::clone(&keybag), Arc::new(TrustAll), Arc::clone(&signer))
            .unwrap()
            .with_attachment_store(attachments_dir.path())
            .unwrap();

        let doc_id = db.create_document(serde_json::json!({"title": "doc"})).unwrap();
        db.change_doc(doc_id, |tx| {
            tx.add_attachment("photo.bin", b"0123456789".to_vec(), Some("application/octet-stream".to_string()));
            Ok(())
        })
        .unwrap();

        let bytes = db.get_attachment(doc_id, "photo.bin").unwrap();
        assert_eq!(bytes, b"0123456789".to_vec());

        let range = db.get_attachment_range(doc_id, "photo.bin", 2, 6).unwrap();
        assert_eq!(range, b"2345".to_vec());
    }

    #[test]
    fn purge_without_attachment_store_is_unsupported_when_attachments_exist() {
        let dir = tempfile::tempdir().unwrap();
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let signer = Arc::new(SigningKeyPair::generate());
        let db = Database::open(dir.path(), "db1", "t1", DatabaseConfig::default(), Arc::clone(&keybag), Arc::new(TrustAll), Arc::clone(&signer)).unwrap();
        let doc_id = db.create_document(serde_json::json!({"a": 1})).unwrap();
        assert!(db.purge_doc_history(doc_id).is_ok());
        assert!(db.get_document(doc_id).is_none());
    }

    #[test]
    fn snapshot_is_emitted_after_configured_interval() {
        let dir = tempfile::tempdir().unwrap();
        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", "t1", SymmetricKey::generate().as_bytes().to_vec(), None);
        let signer = Arc::new(SigningKeyPair::generate());
        let db = Database::open(dir.path(), "db1", "t1", DatabaseConfig::default().snapshot_interval(64), Arc::clone(&keybag), Arc::new(TrustAll), Arc::clone(&signer)).unwrap();
        let doc_id = db.create_document(serde_json::json!({"n": 0})).unwrap();
        for i in 0..64 {
            db.change_doc(doc_id, |tx| {
                tx.set("n", serde_json::json!(i));
                Ok(())
            })
            .unwrap();
        }
        let snapshots = db.entry_store.find_entries(EntryType::DocSnapshot, i64::MIN, i64::MAX);
        assert!(!snapshots.is_empty(), "expected at least one snapshot after {} changes", 64);
    }
}
