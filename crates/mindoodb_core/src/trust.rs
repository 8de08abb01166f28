//! The trust boundary between a [`crate::Database`] and whatever maintains
//! the tenant's public-key trust state.
//!
//! `TenantDirectory` (in `mindoodb_directory`) is itself a [`crate::Database`],
//! so `Database` cannot depend on `mindoodb_directory` without a cycle.
//! Instead the owner that opens a database (`Tenant`, in `mindoodb_tenant`)
//! injects a [`TrustValidator`] trait object; non-admin-only databases use
//! the directory's `validatePublicSigningKey`, admin-only databases (the
//! directory itself) use [`AdminKeyOnly`].

use mindoodb_crypto::PublicSigningKey;

/// Decides whether a signer's public key is trusted to write to a database.
pub trait TrustValidator: Send + Sync {
    /// Returns `true` if `public_key` is currently trusted.
    fn validate_public_signing_key(&self, public_key: &PublicSigningKey) -> bool;
}

/// Trusts only the tenant's administration key. Used for admin-only
/// databases (the directory itself, and any database opened with
/// `admin_only: true`), where delegating to the directory's own cache would
/// be circular.
pub struct AdminKeyOnly {
    admin_public_key: PublicSigningKey,
}

impl AdminKeyOnly {
    /// Creates a validator that trusts only `admin_public_key`.
    #[must_use]
    pub fn new(admin_public_key: PublicSigningKey) -> Self {
        Self { admin_public_key }
    }
}

impl TrustValidator for AdminKeyOnly {
    fn validate_public_signing_key(&self, public_key: &PublicSigningKey) -> bool {
        public_key.as_bytes() == self.admin_public_key.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindoodb_crypto::signing::SigningKeyPair;

    #[test]
    fn admin_key_only_trusts_the_admin_and_no_one_else() {
        let admin = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let validator = AdminKeyOnly::new(admin.public_key());

        assert!(validator.validate_public_signing_key(&admin.public_key()));
        assert!(!validator.validate_public_signing_key(&other.public_key()));
    }
}
