//! Attachment chunking: splitting plaintext into chunk-sized slices and
//! reassembling a chunk chain back into a byte range.
//!
//! Chunks are stored as a dependency chain of `attachment_chunk` entries
//! (newest chunk's `dependencyIds = [previousChunkId]`); [`crate::Database`]
//! owns reading/writing them through the entry store, this module only
//! shapes the bytes.

/// Splits `data` into chunks of at most `chunk_size` bytes, oldest-first
/// (the order chunks should be appended to the store in).
#[must_use]
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if chunk_size == 0 {
        return vec![data];
    }
    data.chunks(chunk_size.max(1)).collect()
}

/// One chunk's plaintext bytes plus the byte offset it starts at within the
/// reassembled attachment, used to serve [`crate::Database::get_attachment_range`]
/// without decrypting chunks outside the requested range.
#[derive(Debug, Clone)]
pub struct ChunkWindow {
    /// Offset of this chunk's first byte within the full attachment.
    pub start: u64,
    /// Offset one past this chunk's last byte.
    pub end: u64,
    /// This chunk's plaintext bytes.
    pub bytes: Vec<u8>,
}

/// Computes `[start, end)` byte windows for a sequence of chunk lengths, in
/// the order the chunks were written (oldest first).
#[must_use]
pub fn chunk_windows(chunks: Vec<Vec<u8>>) -> Vec<ChunkWindow> {
    let mut offset = 0u64;
    chunks
        .into_iter()
        .map(|bytes| {
            let start = offset;
            offset += bytes.len() as u64;
            ChunkWindow { start, end: offset, bytes }
        })
        .collect()
}

/// Extracts the `[range_start, range_end)` slice of plaintext from ordered
/// chunk windows, clipping each chunk to the requested range.
#[must_use]
pub fn slice_range(windows: &[ChunkWindow], range_start: u64, range_end: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for window in windows {
        if window.end <= range_start || window.start >= range_end {
            continue;
        }
        let local_start = range_start.saturating_sub(window.start) as usize;
        let local_end = (range_end.min(window.end) - window.start) as usize;
        out.extend_from_slice(&window.bytes[local_start..local_end]);
    }
    out
}
