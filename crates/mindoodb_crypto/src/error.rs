//! Error types for the crypto pipeline.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors produced by [`crate`] operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AES-GCM encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// AES-GCM decryption or authentication failed.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// A byte buffer did not have the expected size (key, iv, tag, ...).
    #[error("invalid size for {what}: expected {expected} bytes, got {actual}")]
    InvalidSize {
        /// What the buffer was supposed to be.
        what: String,
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// A key, signature, or ciphertext was malformed (bad PEM, bad length, ...).
    #[error("malformed key material: {message}")]
    MalformedKey {
        /// Description of the malformation.
        message: String,
    },

    /// RSA-OAEP encryption or decryption failed.
    #[error("RSA operation failed: {message}")]
    RsaFailed {
        /// Description of the failure.
        message: String,
    },

    /// PBKDF2 iteration count could not be parsed; caller should fall back to the default.
    #[error("invalid iteration count: {raw}")]
    InvalidIterations {
        /// Raw string that failed to parse.
        raw: String,
    },

    /// Attachment frame had an unrecognized encryption mode byte.
    #[error("unrecognized attachment encryption mode: {mode:#04x}")]
    UnknownAttachmentMode {
        /// The unrecognized mode byte.
        mode: u8,
    },
}

impl CryptoError {
    /// Creates an encryption-failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption-failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid-size error.
    pub fn invalid_size(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InvalidSize {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Creates a malformed-key error.
    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::MalformedKey {
            message: message.into(),
        }
    }

    /// Creates an RSA-failed error.
    pub fn rsa_failed(message: impl Into<String>) -> Self {
        Self::RsaFailed {
            message: message.into(),
        }
    }
}
