//! Metadata segment files: append-only JSON arrays of [`EntryMetadata`],
//! rotated by size and periodically compacted.

use crate::error::{StoreError, StoreResult};
use crate::types::EntryMetadata;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Segment files rotate once the active file would exceed this many bytes.
pub const DEFAULT_ROTATE_BYTES: u64 = 4 * 1024 * 1024;

/// Observability counters for metadata segment compaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactionStatus {
    /// Number of compaction passes run over this store's lifetime.
    pub total_compactions: u64,
    /// Bytes reclaimed (pre-compaction total minus post-compaction size) by
    /// the most recent compaction.
    pub last_compacted_bytes: u64,
    /// Wall-clock timestamp (millis since epoch) the last compaction finished.
    pub last_compacted_at: Option<i64>,
    /// Duration of the most recent compaction pass, in milliseconds.
    pub last_duration_ms: u64,
}

/// Configuration for when metadata segments are merged.
#[derive(Debug, Clone, Copy)]
pub struct CompactionConfig {
    /// Trigger compaction once at least this many segment files exist.
    /// A value `<= 0` disables file-count-triggered compaction.
    pub min_files: i64,
    /// Trigger compaction once the total segment byte size reaches this.
    pub max_bytes: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            min_files: 8,
            max_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Lists metadata segment files in a directory, sorted lexicographically
/// (which sorts by creation time, by construction of the file name).
pub fn list_segment_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Reads and parses one segment file's records.
pub fn read_segment(path: &Path) -> StoreResult<Vec<EntryMetadata>> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        StoreError::segment_corruption(path.display().to_string(), e.to_string())
    })
}

/// Writes `records` to `path` as a JSON array, via temp-file + fsync +
/// rename so a crash mid-write never leaves a partially-written segment
/// visible at `path`.
pub fn write_segment_atomic(path: &Path, records: &[EntryMetadata]) -> StoreResult<()> {
    let bytes = serde_json::to_vec(records)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = fs::File::create(&tmp_path)?;
        use std::io::Write;
        let mut file = file;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

static SEGMENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Builds a new segment file name that sorts lexicographically by creation
/// time: a zero-padded millisecond timestamp followed by a monotonic
/// in-process sequence number to break ties within the same millisecond.
#[must_use]
pub fn new_segment_path(dir: &Path, created_at_millis: i64) -> PathBuf {
    let seq = SEGMENT_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{created_at_millis:020}-{seq:010}.json"))
}

/// Merges all segment files in `dir` into a single fresh segment,
/// deleting the originals once the merged file is durably written.
///
/// Returns the compaction status delta (bytes before, bytes after).
pub fn compact(dir: &Path, merged_records: &[EntryMetadata], newest_created_at: i64) -> StoreResult<(u64, PathBuf)> {
    let old_files = list_segment_files(dir)?;
    let bytes_before: u64 = old_files
        .iter()
        .filter_map(|p| fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();

    let merged_path = new_segment_path(dir, newest_created_at);
    write_segment_atomic(&merged_path, merged_records)?;

    for old in &old_files {
        let _ = fs::remove_file(old);
    }

    Ok((bytes_before, merged_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryType;

    fn sample(id: &str, created_at: i64) -> EntryMetadata {
        EntryMetadata {
            entry_type: EntryType::DocCreate,
            id: id.to_string(),
            content_hash: "hash".to_string(),
            doc_id: "doc1".to_string(),
            dependency_ids: vec![],
            created_at,
            created_by_public_key: "pk".to_string(),
            decryption_key_id: "default".to_string(),
            signature: "sig".to_string(),
            original_size: 1,
            encrypted_size: 1,
        }
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = new_segment_path(dir.path(), 1000);
        write_segment_atomic(&path, &[sample("id1", 1000)]).unwrap();
        let records = read_segment(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "id1");
    }

    #[test]
    fn segment_names_sort_by_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let a = new_segment_path(dir.path(), 1000);
        let b = new_segment_path(dir.path(), 2000);
        assert!(a < b);
    }

    #[test]
    fn list_segment_files_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = new_segment_path(dir.path(), 2000);
        let p2 = new_segment_path(dir.path(), 1000);
        write_segment_atomic(&p1, &[]).unwrap();
        write_segment_atomic(&p2, &[]).unwrap();
        let files = list_segment_files(dir.path()).unwrap();
        assert_eq!(files, vec![p2, p1]);
    }

    #[test]
    fn corrupt_segment_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00000000000000001000-0000000000.json");
        fs::write(&path, b"not json").unwrap();
        assert!(read_segment(&path).is_err());
    }

    #[test]
    fn compact_merges_and_removes_originals() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = new_segment_path(dir.path(), 1000);
        let p2 = new_segment_path(dir.path(), 2000);
        write_segment_atomic(&p1, &[sample("id1", 1000)]).unwrap();
        write_segment_atomic(&p2, &[sample("id2", 2000)]).unwrap();

        let merged = vec![sample("id1", 1000), sample("id2", 2000)];
        let (_bytes_before, merged_path) = compact(dir.path(), &merged, 2000).unwrap();

        let files = list_segment_files(dir.path()).unwrap();
        assert_eq!(files, vec![merged_path.clone()]);
        let records = read_segment(&merged_path).unwrap();
        assert_eq!(records.len(), 2);
    }
}
