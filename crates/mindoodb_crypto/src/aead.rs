//! AES-256-GCM payload encryption.
//!
//! Wire format is `iv(12) || ciphertext || tag(16)`, matching the entry wire
//! schema's `encryptedData` field for non-attachment payloads.

use crate::error::{CryptoError, CryptoResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce (IV) in bytes.
pub const IV_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A symmetric AES-256 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Builds a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly [`KEY_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::invalid_size("symmetric key", KEY_SIZE, bytes.len()));
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    /// Returns the raw key bytes.
    ///
    /// # Security
    ///
    /// Callers must not log or persist this value outside the KeyBag's
    /// encrypted storage.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// Encrypts `plaintext` under `key`, returning `iv || ciphertext || tag`.
pub fn encrypt_payload(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    encrypt_with_iv(plaintext, key, &random_iv())
}

/// Encrypts `plaintext` under `key` using an explicitly supplied 12-byte IV.
///
/// Used by attachment chunk encryption, where deterministic mode derives the
/// IV from the plaintext hash rather than generating one randomly.
pub fn encrypt_with_iv(plaintext: &[u8], key: &SymmetricKey, iv: &[u8; IV_SIZE]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(iv);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::encryption_failed("AES-GCM encrypt failed"))?;

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend(ciphertext);
    Ok(out)
}

/// Decrypts a payload produced by [`encrypt_payload`] or [`encrypt_with_iv`].
pub fn decrypt_payload(payload: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    if payload.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::decryption_failed("payload shorter than iv+tag"));
    }
    let (iv, rest) = payload.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(nonce, rest)
        .map_err(|_| CryptoError::decryption_failed("AES-GCM authentication failed"))
}

fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = SymmetricKey::generate();
        let plaintext = b"grant-access payload";
        let ciphertext = encrypt_payload(plaintext, &key).unwrap();
        assert_eq!(decrypt_payload(&ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = SymmetricKey::generate();
        let key2 = SymmetricKey::generate();
        let ciphertext = encrypt_payload(b"data", &key1).unwrap();
        assert!(decrypt_payload(&ciphertext, &key2).is_err());
    }

    #[test]
    fn tamper_detected() {
        let key = SymmetricKey::generate();
        let mut ciphertext = encrypt_payload(b"data", &key).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;
        assert!(decrypt_payload(&ciphertext, &key).is_err());
    }

    #[test]
    fn random_nonce_each_call() {
        let key = SymmetricKey::generate();
        let a = encrypt_payload(b"same", &key).unwrap();
        let b = encrypt_payload(b"same", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_iv_is_repeatable() {
        let key = SymmetricKey::generate();
        let iv = [7u8; IV_SIZE];
        let a = encrypt_with_iv(b"same", &key, &iv).unwrap();
        let b = encrypt_with_iv(b"same", &key, &iv).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_short_payload_rejected() {
        let key = SymmetricKey::generate();
        assert!(decrypt_payload(&[0u8; 4], &key).is_err());
    }
}
