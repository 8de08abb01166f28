//! Errors surfaced by [`crate::TenantFactory`] and [`crate::Tenant`].

use thiserror::Error;

/// Errors raised while creating identities or orchestrating a tenant.
#[derive(Debug, Error)]
pub enum TenantError {
    /// A database or directory operation failed.
    #[error(transparent)]
    Core(#[from] mindoodb_core::CoreError),

    /// The directory trust/registration layer rejected an operation.
    #[error(transparent)]
    Directory(#[from] mindoodb_directory::DirectoryError),

    /// A cryptographic primitive failed.
    #[error(transparent)]
    Crypto(#[from] mindoodb_crypto::CryptoError),

    /// A KeyBag operation failed.
    #[error(transparent)]
    KeyBag(#[from] mindoodb_keybag::KeyBagError),

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

    /// An API was used outside its valid calling context.
    #[error("invalid use: {message}")]
    InvalidUseError {
        /// Description of the misuse.
        message: String,
    },

    /// A `mdb://` URI failed to parse.
    #[error("malformed MindooURI: {reason}")]
    MalformedUri {
        /// Why parsing failed.
        reason: String,
    },
}

impl TenantError {
    /// Creates a [`TenantError::MissingKeyError`] naming the exact
    /// `(kind, id)` the caller must import into the KeyBag before retrying.
    pub fn missing_key(kind: impl Into<String>, key_id: impl Into<String>) -> Self {
        let kind = kind.into();
        let key_id = key_id.into();
        Self::MissingKeyError {
            hint: format!("import a key for (\"{kind}\", \"{key_id}\") into the KeyBag before opening this tenant"),
            kind,
            key_id,
        }
    }

    /// Creates a [`TenantError::InvalidUseError`].
    pub fn invalid_use(message: impl Into<String>) -> Self {
        Self::InvalidUseError { message: message.into() }
    }
}

/// Convenience alias for [`TenantError`]-returning results.
pub type TenantResult<T> = Result<T, TenantError>;
