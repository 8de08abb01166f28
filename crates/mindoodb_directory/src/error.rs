//! Errors specific to directory trust and registration.

use thiserror::Error;

/// Errors raised by [`crate::TenantDirectory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The underlying admin-only database rejected a read or write.
    #[error(transparent)]
    Core(#[from] mindoodb_core::CoreError),
    /// A username is already registered under different signing/encryption keys.
    #[error("username {username:?} is already registered under different keys")]
    DuplicateUser {
        /// The username that collided.
        username: String,
    },
    /// A database opened as the directory was not configured `adminOnlyDb=true`.
    #[error("database {db_id:?} must be adminOnlyDb=true to serve as a tenant directory")]
    NotAdminOnly {
        /// The offending database's id.
        db_id: String,
    },
}

/// Convenience alias for [`DirectoryError`]-returning results.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
