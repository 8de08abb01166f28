//! Error types for KeyBag operations.

use thiserror::Error;

/// Result type for KeyBag operations.
pub type KeyBagResult<T> = Result<T, KeyBagError>;

/// Errors produced by [`crate::KeyBag`].
#[derive(Debug, Error)]
pub enum KeyBagError {
    /// The requested `(keyKind, keyId)` has no entries.
    #[error("no key found for ({kind}, {id})")]
    KeyNotFound {
        /// The key kind that was looked up.
        kind: String,
        /// The key id that was looked up.
        id: String,
    },

    /// Underlying crypto operation failed (wrong password, corrupted blob, ...).
    #[error("crypto error: {0}")]
    Crypto(#[from] mindoodb_crypto::CryptoError),

    /// The persisted blob was malformed (too short, bad JSON, ...).
    #[error("corrupt key bag: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// I/O error persisting or loading the blob.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize the in-memory key table.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyBagError {
    /// Creates a key-not-found error.
    pub fn key_not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::KeyNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a corrupt-bag error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
