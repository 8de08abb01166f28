//! Error types for the per-database change engine.

use thiserror::Error;

/// Result type for [`crate::Database`] operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by [`crate::Database`] and friends.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying entry store I/O failed.
    #[error("I/O error: {0}")]
    IoError(#[from] mindoodb_entrystore::StoreError),

    /// A CRDT change or snapshot failed to decode.
    #[error("CRDT error: {0}")]
    Crdt(#[from] mindoodb_crdt::CrdtError),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] mindoodb_crypto::CryptoError),

    /// An entry's `contentHash` did not match `SHA-256(encryptedData)`.
    #[error("corruption: entry {id} content hash mismatch")]
    CorruptionError {
        /// The offending entry's id.
        id: String,
    },

    /// An entry's Ed25519 signature failed to verify.
    #[error("signature invalid for entry {id}")]
    SignatureInvalid {
        /// The offending entry's id.
        id: String,
    },

    /// An entry's signer is not trusted for this database.
    #[error("public key not trusted for entry {id}")]
    PublicKeyNotTrusted {
        /// The offending entry's id.
        id: String,
    },

    /// No KeyBag entry exists for the decryption key an entry names.
    #[error("symmetric key not found: ({kind}, {key_id})")]
    SymmetricKeyNotFound {
        /// The key kind (`"tenant"` or `"doc"`).
        kind: String,
        /// The key id within that kind.
        key_id: String,
    },

    /// A required KeyBag entry is missing, naming the exact corrective action.
    #[error("missing key ({kind}, {key_id}): {hint}")]
    MissingKeyError {
        /// The key kind.
        kind: String,
        /// The key id within that kind.
        key_id: String,
        /// Actionable text describing how to resolve this.
        hint: String,
    },

    /// A username is already registered under a different key.
    #[error("duplicate user: {username}")]
    DuplicateUserError {
        /// The colliding username.
        username: String,
    },

    /// An operation requiring the administration key was attempted by a non-admin signer.
    #[error("admin-only violation on database {db_id}")]
    AdminOnlyViolation {
        /// The database the violation occurred on.
        db_id: String,
    },

    /// A purge was requested against a store that does not support it.
    #[error("purge unsupported: {reason}")]
    PurgeUnsupported {
        /// Why the store can't service the purge.
        reason: String,
    },

    /// An API was used outside its valid calling context (e.g. attachment
    /// writes outside `changeDoc`, or nested non-attachment `changeDoc` calls).
    #[error("invalid use: {message}")]
    InvalidUseError {
        /// Description of the misuse.
        message: String,
    },

    /// The requested operation is not implemented by this store/database configuration.
    #[error("not supported: {message}")]
    NotSupportedError {
        /// Description of what isn't supported.
        message: String,
    },

    /// An operation did not complete within its bound.
    #[error("timeout waiting on {what}")]
    TimeoutError {
        /// What the caller was waiting for.
        what: String,
    },

    /// The requested document does not exist.
    #[error("document not found: {doc_id}")]
    DocumentNotFound {
        /// The missing document's id.
        doc_id: String,
    },

    /// The requested attachment does not exist on the document.
    #[error("attachment not found: {name} on {doc_id}")]
    AttachmentNotFound {
        /// The missing attachment's name.
        name: String,
        /// The document it was expected on.
        doc_id: String,
    },
}

impl CoreError {
    /// Creates a [`CoreError::MissingKeyError`] with corrective instructions
    /// naming the exact `(kind, id)` the caller must import into the KeyBag.
    pub fn missing_key(kind: impl Into<String>, key_id: impl Into<String>) -> Self {
        let kind = kind.into();
        let key_id = key_id.into();
        Self::MissingKeyError {
            hint: format!("import a key for (\"{kind}\", \"{key_id}\") into the KeyBag before opening this tenant"),
            kind,
            key_id,
        }
    }

    /// Creates an [`CoreError::InvalidUseError`].
    pub fn invalid_use(message: impl Into<String>) -> Self {
        Self::InvalidUseError { message: message.into() }
    }

    /// Creates a [`CoreError::NotSupportedError`].
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupportedError { message: message.into() }
    }
}
