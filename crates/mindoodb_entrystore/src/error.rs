//! Error types for EntryStore operations.

use thiserror::Error;

/// Result type for EntryStore operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by [`crate::EntryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A content-addressed blob's hash did not match its id on read.
    #[error("content hash mismatch for {id}: expected {expected}, found {actual}")]
    Corruption {
        /// The entry id whose payload failed verification.
        id: String,
        /// The hash recorded in metadata.
        expected: String,
        /// The hash actually computed from the data on disk.
        actual: String,
    },

    /// A metadata segment file could not be parsed.
    #[error("corrupt metadata segment {path}: {message}")]
    SegmentCorruption {
        /// Path of the offending segment file.
        path: String,
        /// Description of the corruption.
        message: String,
    },

    /// Requested operation is not supported by this store configuration.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of what isn't supported.
        message: String,
    },

    /// JSON (de)serialization of metadata failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corruption(id: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Corruption {
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a segment-corruption error.
    pub fn segment_corruption(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a not-supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }
}
