//! Error types for CRDT document operations.

use thiserror::Error;

/// Result type for CRDT operations.
pub type CrdtResult<T> = Result<T, CrdtError>;

/// Errors produced by [`crate::CrdtDocument`] implementations.
#[derive(Debug, Error)]
pub enum CrdtError {
    /// A binary change could not be decoded.
    #[error("malformed change: {message}")]
    MalformedChange {
        /// Description of the decoding failure.
        message: String,
    },

    /// A binary snapshot could not be decoded.
    #[error("malformed snapshot: {message}")]
    MalformedSnapshot {
        /// Description of the decoding failure.
        message: String,
    },

    /// A change referenced a dependency that has not been applied yet.
    #[error("missing dependency: {dep_id}")]
    MissingDependency {
        /// The unmet dependency's change id.
        dep_id: String,
    },
}

impl CrdtError {
    /// Creates a malformed-change error.
    pub fn malformed_change(message: impl Into<String>) -> Self {
        Self::MalformedChange {
            message: message.into(),
        }
    }

    /// Creates a malformed-snapshot error.
    pub fn malformed_snapshot(message: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            message: message.into(),
        }
    }
}
