//! Error types for cache storage and flushing.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by a [`crate::LocalCacheStore`] or [`crate::CacheManager`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error occurred reading or writing a cache entry.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache entry's on-disk bytes were not valid for the encrypted store.
    #[error("cache entry corrupt: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// The underlying crypto operation failed.
    #[error("cache crypto error: {0}")]
    Crypto(#[from] mindoodb_crypto::CryptoError),
}

impl CacheError {
    /// Creates a corrupt-entry error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
