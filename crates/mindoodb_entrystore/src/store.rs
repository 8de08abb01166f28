//! [`EntryStore`]: the content-addressed append-only entry log.

use crate::error::{StoreError, StoreResult};
use crate::segment::{self, CompactionConfig, CompactionStatus, DEFAULT_ROTATE_BYTES};
use crate::types::{BloomSummary, Cursor, EntryMetadata, EntryType, ResolveOptions, ScanFilters, ScanResult, StoreEntry};
use mindoodb_crypto::sha256_hex;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// Status of the metadata index build, exposed for callers that want to
/// wait for it before issuing reads (all builds here are synchronous, so
/// this is always ready immediately after [`EntryStore::open`] returns).
#[derive(Debug, Clone, Copy)]
pub struct IndexBuildStatus {
    /// Whether the index has finished loading.
    pub ready: bool,
    /// Number of entries currently indexed.
    pub entries_indexed: usize,
}

/// Content-addressed, append-only log of [`StoreEntry`] records for one
/// database, with a segmented metadata index and cursor-based scans.
pub struct EntryStore {
    base_path: PathBuf,
    segments_dir: PathBuf,
    data_dir: PathBuf,
    index: RwLock<HashMap<String, EntryMetadata>>,
    ordered: RwLock<BTreeSet<(i64, String)>>,
    content_refs: RwLock<HashMap<String, u32>>,
    current_records: RwLock<Vec<EntryMetadata>>,
    current_segment_path: RwLock<Option<PathBuf>>,
    compaction_config: CompactionConfig,
    compaction_status: RwLock<CompactionStatus>,
}

impl EntryStore {
    /// Opens (creating if absent) the entry store rooted at
    /// `<base_path>/<db_id>`, replaying metadata segments into memory.
    pub fn open(base_path: &Path, db_id: &str) -> StoreResult<Self> {
        Self::open_with_config(base_path, db_id, CompactionConfig::default())
    }

    /// Like [`Self::open`], with an explicit compaction configuration.
    pub fn open_with_config(base_path: &Path, db_id: &str, compaction_config: CompactionConfig) -> StoreResult<Self> {
        let root = base_path.join(db_id);
        let segments_dir = root.join("metadata-segments");
        let data_dir = root.join("data");
        fs::create_dir_all(&segments_dir)?;
        fs::create_dir_all(&data_dir)?;

        let store = Self {
            base_path: root,
            segments_dir,
            data_dir,
            index: RwLock::new(HashMap::new()),
            ordered: RwLock::new(BTreeSet::new()),
            content_refs: RwLock::new(HashMap::new()),
            current_records: RwLock::new(Vec::new()),
            current_segment_path: RwLock::new(None),
            compaction_config,
            compaction_status: RwLock::new(CompactionStatus::default()),
        };

        store.replay_segments()?;
        Ok(store)
    }

    fn replay_segments(&self) -> StoreResult<()> {
        let files = segment::list_segment_files(&self.segments_dir)?;
        let mut loaded: Vec<EntryMetadata> = Vec::new();
        for file in &files {
            match segment::read_segment(file) {
                Ok(records) => loaded.extend(records),
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "dropping unreadable metadata segment");
                }
            }
        }

        let mut stale_dropped = false;
        let mut index = HashMap::new();
        let mut ordered = BTreeSet::new();
        let mut content_refs: HashMap<String, u32> = HashMap::new();

        for record in loaded {
            if !self.data_path(&record.content_hash).exists() {
                tracing::warn!(id = %record.id, "dropping crash-stale metadata row with no matching data blob");
                stale_dropped = true;
                continue;
            }
            *content_refs.entry(record.content_hash.clone()).or_insert(0) += 1;
            ordered.insert((record.created_at, record.id.clone()));
            index.insert(record.id.clone(), record);
        }

        *self.index.write() = index;
        *self.ordered.write() = ordered;
        *self.content_refs.write() = content_refs;

        if stale_dropped {
            self.rewrite_all_segments()?;
        }
        Ok(())
    }

    fn data_path(&self, content_hash: &str) -> PathBuf {
        let prefix = &content_hash[..content_hash.len().min(2)];
        self.data_dir.join(prefix).join(format!("{content_hash}.bin"))
    }

    /// Inserts `entries`, skipping any whose id is already present.
    /// Durable before returning: metadata is fsynced and payload bytes are
    /// written (deduplicated by `contentHash`) before the in-memory index
    /// is updated.
    pub fn put_entries(&self, entries: &[StoreEntry]) -> StoreResult<()> {
        let mut accepted = Vec::new();
        {
            let index = self.index.read();
            for entry in entries {
                if !index.contains_key(&entry.id) {
                    accepted.push(entry.clone());
                }
            }
        }
        if accepted.is_empty() {
            return Ok(());
        }

        for entry in &accepted {
            let path = self.data_path(&entry.content_hash);
            if !path.exists() {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let tmp = path.with_extension("bin.tmp");
                fs::write(&tmp, &entry.encrypted_data)?;
                fs::File::open(&tmp)?.sync_all()?;
                fs::rename(&tmp, &path)?;
            }
        }

        let mut current_records = self.current_records.write();
        let mut current_path = self.current_segment_path.write();
        current_records.extend(accepted.iter().map(StoreEntry::metadata));

        let path = match current_path.as_ref() {
            Some(p) => p.clone(),
            None => {
                let oldest = current_records.first().map_or(0, |r| r.created_at);
                segment::new_segment_path(&self.segments_dir, oldest)
            }
        };
        segment::write_segment_atomic(&path, &current_records)?;
        *current_path = Some(path.clone());

        {
            let mut index = self.index.write();
            let mut ordered = self.ordered.write();
            let mut content_refs = self.content_refs.write();
            for entry in &accepted {
                *content_refs.entry(entry.content_hash.clone()).or_insert(0) += 1;
                ordered.insert((entry.created_at, entry.id.clone()));
                index.insert(entry.id.clone(), entry.metadata());
            }
        }

        if fs::metadata(&path).map(|m| m.len()).unwrap_or(0) >= DEFAULT_ROTATE_BYTES {
            current_records.clear();
            *current_path = None;
        }
        drop(current_records);
        drop(current_path);

        self.maybe_compact()?;
        Ok(())
    }

    /// Returns entries present, in the order requested.
    pub fn get_entries(&self, ids: &[String]) -> StoreResult<Vec<StoreEntry>> {
        let index = self.index.read();
        let mut out = Vec::new();
        for id in ids {
            if let Some(metadata) = index.get(id) {
                let data = fs::read(self.data_path(&metadata.content_hash))?;
                let actual_hash = sha256_hex(&data);
                if actual_hash != metadata.content_hash {
                    return Err(StoreError::corruption(id.clone(), metadata.content_hash.clone(), actual_hash));
                }
                out.push(metadata.clone().with_payload(data));
            }
        }
        Ok(out)
    }

    /// Returns the subset of `ids` present in the store.
    #[must_use]
    pub fn has_entries(&self, ids: &[String]) -> Vec<String> {
        let index = self.index.read();
        ids.iter().filter(|id| index.contains_key(*id)).cloned().collect()
    }

    /// Every stored id, order unspecified.
    #[must_use]
    pub fn get_all_ids(&self) -> Vec<String> {
        self.index.read().keys().cloned().collect()
    }

    /// Metadata for entries not present in `known_ids`.
    #[must_use]
    pub fn find_new_entries(&self, known_ids: &HashSet<String>) -> Vec<EntryMetadata> {
        self.index
            .read()
            .values()
            .filter(|m| !known_ids.contains(&m.id))
            .cloned()
            .collect()
    }

    /// Like [`Self::find_new_entries`], restricted to one document.
    #[must_use]
    pub fn find_new_entries_for_doc(&self, known_ids: &HashSet<String>, doc_id: &str) -> Vec<EntryMetadata> {
        self.index
            .read()
            .values()
            .filter(|m| m.doc_id == doc_id && !known_ids.contains(&m.id))
            .cloned()
            .collect()
    }

    /// Metadata filtered by type and half-open `[from, until)` on `createdAt`.
    #[must_use]
    pub fn find_entries(&self, entry_type: EntryType, from: i64, until: i64) -> Vec<EntryMetadata> {
        self.index
            .read()
            .values()
            .filter(|m| m.entry_type as u8 == entry_type as u8 && m.created_at >= from && m.created_at < until)
            .cloned()
            .collect()
    }

    /// Deterministic cursor scan ordered by `(createdAt ASC, id ASC)`,
    /// strictly after `cursor`.
    #[must_use]
    pub fn scan_entries_since(&self, cursor: Option<&Cursor>, limit: usize, filters: &ScanFilters) -> ScanResult {
        let ordered = self.ordered.read();
        let index = self.index.read();

        let start: Box<dyn Iterator<Item = &(i64, String)>> = match cursor {
            Some(c) => Box::new(ordered.iter().filter(move |(created_at, id)| {
                (*created_at, id.as_str()) > (c.created_at, c.id.as_str())
            })),
            None => Box::new(ordered.iter()),
        };

        let mut entries = Vec::new();
        let mut last_key: Option<(i64, String)> = None;
        let mut exhausted = true;

        for key in start {
            let Some(metadata) = index.get(&key.1) else { continue };
            if let Some(t) = filters.entry_type {
                if metadata.entry_type as u8 != t as u8 {
                    continue;
                }
            }
            if let Some(doc_id) = &filters.doc_id {
                if &metadata.doc_id != doc_id {
                    continue;
                }
            }
            if entries.len() == limit {
                exhausted = false;
                break;
            }
            entries.push(metadata.clone());
            last_key = Some(key.clone());
        }
        if entries.len() < limit {
            exhausted = true;
        }

        let next_cursor = last_key.map(|(created_at, id)| Cursor { created_at, id });
        ScanResult {
            entries,
            next_cursor,
            has_more: !exhausted,
        }
    }

    /// A probabilistic summary (`bloom-v1`) of the full id set.
    #[must_use]
    pub fn get_id_bloom_summary(&self) -> BloomSummary {
        let ids: Vec<String> = self.get_all_ids();
        let bit_count = (ids.len().max(1) * 10).next_power_of_two().max(64);
        let hash_count = 4u32;
        let salt = {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            self.base_path.hash(&mut hasher);
            std::hash::Hasher::finish(&hasher)
        };

        let mut bits = vec![0u8; bit_count.div_ceil(8)];
        for id in &ids {
            for k in 0..hash_count {
                let bit = bloom_bit_index(id, salt, k, bit_count);
                bits[bit / 8] |= 1 << (bit % 8);
            }
        }

        BloomSummary {
            version: "bloom-v1".to_string(),
            total_ids: ids.len(),
            bit_count,
            hash_count,
            salt,
            bitset_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bits),
        }
    }

    /// BFS back along `dependencyIds` from `start_id`, oldest first.
    #[must_use]
    pub fn resolve_dependencies(&self, start_id: &str, options: &ResolveOptions) -> Vec<EntryMetadata> {
        let index = self.index.read();
        let Some(start) = index.get(start_id) else { return Vec::new() };

        let mut visited = HashSet::new();
        visited.insert(start_id.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((start.clone(), 0u32));
        let mut collected = vec![start.clone()];

        while let Some((current, depth)) = queue.pop_front() {
            if let Some(max_depth) = options.max_depth {
                if depth >= max_depth {
                    continue;
                }
            }
            if let Some(stop_type) = options.stop_at_entry_type {
                if current.entry_type as u8 == stop_type as u8 {
                    continue;
                }
            }
            for dep_id in &current.dependency_ids {
                if visited.insert(dep_id.clone()) {
                    if let Some(dep) = index.get(dep_id) {
                        collected.push(dep.clone());
                        queue.push_back((dep.clone(), depth + 1));
                    }
                }
            }
        }

        if !options.include_start {
            collected.retain(|m| m.id != start_id);
        }
        collected.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        collected
    }

    /// Physically removes every entry for `doc_id`, and any payload bytes
    /// no longer referenced by a remaining entry. Breaks append-only
    /// semantics by design (right to be forgotten).
    pub fn purge_doc_history(&self, doc_id: &str) -> StoreResult<()> {
        let removed_ids: Vec<String> = {
            let index = self.index.read();
            index.values().filter(|m| m.doc_id == doc_id).map(|m| m.id.clone()).collect()
        };
        if removed_ids.is_empty() {
            return Ok(());
        }

        let mut index = self.index.write();
        let mut ordered = self.ordered.write();
        let mut content_refs = self.content_refs.write();

        for id in &removed_ids {
            if let Some(metadata) = index.remove(id) {
                ordered.remove(&(metadata.created_at, metadata.id.clone()));
                if let Some(count) = content_refs.get_mut(&metadata.content_hash) {
                    *count -= 1;
                    if *count == 0 {
                        content_refs.remove(&metadata.content_hash);
                        let _ = fs::remove_file(self.data_path(&metadata.content_hash));
                    }
                }
            }
        }

        let remaining: Vec<EntryMetadata> = index.values().cloned().collect();
        drop(index);
        drop(ordered);
        drop(content_refs);

        self.current_records.write().clear();
        *self.current_segment_path.write() = None;
        self.rewrite_with(remaining)?;
        Ok(())
    }

    fn rewrite_all_segments(&self) -> StoreResult<()> {
        let remaining: Vec<EntryMetadata> = self.index.read().values().cloned().collect();
        self.rewrite_with(remaining)
    }

    fn rewrite_with(&self, records: Vec<EntryMetadata>) -> StoreResult<()> {
        let newest = records.iter().map(|r| r.created_at).max().unwrap_or(0);
        let (bytes_before, merged_path) = segment::compact(&self.segments_dir, &records, newest)?;
        self.record_compaction(bytes_before, &merged_path)?;
        Ok(())
    }

    fn maybe_compact(&self) -> StoreResult<()> {
        let files = segment::list_segment_files(&self.segments_dir)?;
        let total_bytes: u64 = files.iter().filter_map(|p| fs::metadata(p).ok()).map(|m| m.len()).sum();
        let min_files_hit = self.compaction_config.min_files > 0 && files.len() as i64 >= self.compaction_config.min_files;
        let max_bytes_hit = total_bytes >= self.compaction_config.max_bytes;
        if !min_files_hit && !max_bytes_hit {
            return Ok(());
        }

        let records: Vec<EntryMetadata> = self.index.read().values().cloned().collect();
        self.current_records.write().clear();
        *self.current_segment_path.write() = None;
        self.rewrite_with(records)
    }

    fn record_compaction(&self, bytes_before: u64, merged_path: &Path) -> StoreResult<()> {
        let bytes_after = fs::metadata(merged_path).map(|m| m.len()).unwrap_or(0);
        let mut status = self.compaction_status.write();
        status.total_compactions += 1;
        status.last_compacted_bytes = bytes_before.saturating_sub(bytes_after);
        status.last_compacted_at = Some(current_millis());
        status.last_duration_ms = 0;
        Ok(())
    }

    /// Deletes all on-disk state for this store (GDPR-style full wipe).
    pub fn clear_all_local_data(&self) -> StoreResult<()> {
        if self.base_path.exists() {
            fs::remove_dir_all(&self.base_path)?;
        }
        fs::create_dir_all(&self.segments_dir)?;
        fs::create_dir_all(&self.data_dir)?;
        self.index.write().clear();
        self.ordered.write().clear();
        self.content_refs.write().clear();
        self.current_records.write().clear();
        *self.current_segment_path.write() = None;
        Ok(())
    }

    /// The metadata index is always fully built synchronously by
    /// [`Self::open`]; this resolves immediately.
    pub fn await_index_ready(&self) {}

    /// Current index build status.
    #[must_use]
    pub fn get_index_build_status(&self) -> IndexBuildStatus {
        IndexBuildStatus {
            ready: true,
            entries_indexed: self.index.read().len(),
        }
    }

    /// Current compaction observability counters.
    #[must_use]
    pub fn get_compaction_status(&self) -> CompactionStatus {
        *self.compaction_status.read()
    }
}

fn bloom_bit_index(id: &str, salt: u64, k: u32, bit_count: usize) -> usize {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    salt.hash(&mut hasher);
    k.hash(&mut hasher);
    id.hash(&mut hasher);
    (hasher.finish() as usize) % bit_count
}

fn current_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
