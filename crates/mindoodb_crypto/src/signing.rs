//! Ed25519 signing/verification and password-encrypted private key storage.

use crate::aead::{decrypt_payload, encrypt_with_iv, SymmetricKey, IV_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::pbkdf::{derive_key, generate_salt};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Byte length of an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 key pair, public part kept as SPKI/PEM-compatible raw bytes.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generates a new random signing key pair.
    #[must_use]
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Returns the public key.
    #[must_use]
    pub fn public_key(&self) -> PublicSigningKey {
        PublicSigningKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Signs `message`, returning a 64-byte Ed25519 signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Encrypts the private key under a password-derived key, producing an
    /// [`EncryptedPrivateKey`] ready for KeyBag persistence.
    pub fn encrypt(&self, password: &[u8], salt_string: &str, iterations: u32) -> CryptoResult<EncryptedPrivateKey> {
        encrypt_private_key_bytes(self.signing_key.to_bytes().as_slice(), password, salt_string, iterations)
    }

    /// Decrypts a signing key pair from an [`EncryptedPrivateKey`].
    pub fn decrypt(encrypted: &EncryptedPrivateKey, password: &[u8], salt_string: &str) -> CryptoResult<Self> {
        let bytes = decrypt_private_key_bytes(encrypted, password, salt_string)?;
        if bytes.len() != 32 {
            return Err(CryptoError::invalid_size("ed25519 private key", 32, bytes.len()));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair").field("public_key", &self.public_key()).finish()
    }
}

/// An Ed25519 public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicSigningKey {
    verifying_key: VerifyingKey,
}

impl PublicSigningKey {
    /// Parses a public key from its raw 32-byte form.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::invalid_size("ed25519 public key", 32, bytes.len()))?;
        let verifying_key =
            VerifyingKey::from_bytes(&arr).map_err(|e| CryptoError::malformed_key(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    /// Returns the raw 32-byte public key.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verifies a signature produced by [`SigningKeyPair::sign`].
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let sig_bytes: [u8; SIGNATURE_SIZE] = signature
            .try_into()
            .map_err(|_| CryptoError::invalid_size("signature", SIGNATURE_SIZE, signature.len()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        self.verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl std::fmt::Debug for PublicSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicSigningKey({})", base64::Engine::encode(&base64::engine::general_purpose::STANDARD, self.as_bytes()))
    }
}

/// A private key encrypted with a password-derived AES-256-GCM key.
///
/// `iv` is 12 bytes, `tag` is 16 bytes; decryption reassembles
/// `ciphertext || tag` for the GCM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPrivateKey {
    /// Raw ciphertext, excluding the tag.
    pub ciphertext: Vec<u8>,
    /// 12-byte GCM nonce.
    pub iv: [u8; IV_SIZE],
    /// 16-byte GCM authentication tag.
    pub tag: [u8; TAG_SIZE],
    /// Random salt combined with the domain-separation string at derivation time.
    pub salt: Vec<u8>,
    /// PBKDF2 iteration count used to derive the wrapping key.
    pub iterations: u32,
    /// Optional creation timestamp (milliseconds since epoch), preserved across rotation.
    pub created_at: Option<i64>,
}

pub(crate) fn encrypt_private_key_bytes(
    raw_key: &[u8],
    password: &[u8],
    salt_string: &str,
    iterations: u32,
) -> CryptoResult<EncryptedPrivateKey> {
    let salt = generate_salt();
    let key = derive_key(password, &salt, salt_string, iterations);
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let framed = encrypt_with_iv(raw_key, &key, &iv)?;
    // framed = iv || ciphertext || tag; strip the leading iv we already have.
    let body = &framed[IV_SIZE..];
    let (ct, tag) = body.split_at(body.len() - TAG_SIZE);
    Ok(EncryptedPrivateKey {
        ciphertext: ct.to_vec(),
        iv,
        tag: tag.try_into().expect("tag is TAG_SIZE bytes"),
        salt: salt.to_vec(),
        iterations,
        created_at: None,
    })
}

pub(crate) fn decrypt_private_key_bytes(
    encrypted: &EncryptedPrivateKey,
    password: &[u8],
    salt_string: &str,
) -> CryptoResult<Vec<u8>> {
    let key = derive_key(password, &encrypted.salt, salt_string, encrypted.iterations);
    let mut framed = Vec::with_capacity(IV_SIZE + encrypted.ciphertext.len() + TAG_SIZE);
    framed.extend_from_slice(&encrypted.iv);
    framed.extend_from_slice(&encrypted.ciphertext);
    framed.extend_from_slice(&encrypted.tag);
    decrypt_payload(&framed, &key)
}

/// A generic AES-256-GCM key wrapped the same way a private key is,
/// reusable for KeyBag blob encryption and other non-key-pair secrets.
pub fn encrypt_symmetric_key(
    key: &SymmetricKey,
    password: &[u8],
    salt_string: &str,
    iterations: u32,
) -> CryptoResult<EncryptedPrivateKey> {
    encrypt_private_key_bytes(key.as_bytes(), password, salt_string, iterations)
}

/// Decrypts a symmetric key wrapped by [`encrypt_symmetric_key`].
pub fn decrypt_symmetric_key(
    encrypted: &EncryptedPrivateKey,
    password: &[u8],
    salt_string: &str,
) -> CryptoResult<SymmetricKey> {
    let bytes = decrypt_private_key_bytes(encrypted, password, salt_string)?;
    SymmetricKey::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"message");
        assert!(pair.public_key().verify(b"message", &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verify() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"message");
        assert!(pair.public_key().verify(b"different", &sig).is_err());
    }

    #[test]
    fn encrypt_decrypt_private_key_roundtrip() {
        let pair = SigningKeyPair::generate();
        let encrypted = pair.encrypt(b"correct horse", "signing", 60_000).unwrap();
        let restored = SigningKeyPair::decrypt(&encrypted, b"correct horse", "signing").unwrap();
        assert_eq!(pair.public_key().as_bytes(), restored.public_key().as_bytes());
    }

    #[test]
    fn wrong_password_fails_decrypt() {
        let pair = SigningKeyPair::generate();
        let encrypted = pair.encrypt(b"correct horse", "signing", 60_000).unwrap();
        assert!(SigningKeyPair::decrypt(&encrypted, b"wrong", "signing").is_err());
    }

    #[test]
    fn wrong_salt_string_fails_decrypt() {
        let pair = SigningKeyPair::generate();
        let encrypted = pair.encrypt(b"correct horse", "signing", 60_000).unwrap();
        assert!(SigningKeyPair::decrypt(&encrypted, b"correct horse", "encryption").is_err());
    }
}
