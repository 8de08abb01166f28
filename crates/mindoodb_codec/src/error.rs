//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Failed to parse JSON input.
    #[error("json parse error: {message}")]
    ParseError {
        /// Description of the parse failure.
        message: String,
    },

    /// A number could not be represented without loss (e.g. NaN, infinity).
    #[error("non-finite number is forbidden in canonical JSON")]
    NonFiniteNumber,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Field selection referenced a path that does not resolve to a value.
    #[error("invalid field path: {path}")]
    InvalidFieldPath {
        /// The offending path.
        path: String,
    },
}

impl CodecError {
    /// Creates a parse error.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Creates an invalid field path error.
    pub fn invalid_field_path(path: impl Into<String>) -> Self {
        Self::InvalidFieldPath { path: path.into() }
    }
}
