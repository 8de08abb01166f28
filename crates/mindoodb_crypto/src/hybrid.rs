//! RSA-OAEP-3072 hybrid encryption.
//!
//! Used only for hybrid payloads: a random AES-256 key is generated,
//! encrypted with RSA-OAEP-SHA256 under the recipient's public key, and
//! prefixed with its 2-byte big-endian length. The actual data follows,
//! AES-256-GCM encrypted under the random key. Signing and encryption keys
//! are never shared: this module only ever touches RSA encryption keys.

use crate::aead::{decrypt_payload, encrypt_payload, SymmetricKey};
use crate::error::{CryptoError, CryptoResult};
use crate::signing::{decrypt_private_key_bytes, encrypt_private_key_bytes, EncryptedPrivateKey};
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// RSA modulus size in bits, per the 3072-bit requirement.
pub const MODULUS_BITS: usize = 3072;

/// An RSA-OAEP key pair used for hybrid payload encryption.
pub struct EncryptionKeyPair {
    private_key: RsaPrivateKey,
}

impl EncryptionKeyPair {
    /// Generates a new 3072-bit RSA key pair.
    pub fn generate() -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, MODULUS_BITS)
            .map_err(|e| CryptoError::rsa_failed(e.to_string()))?;
        Ok(Self { private_key })
    }

    /// Returns the public key half.
    #[must_use]
    pub fn public_key(&self) -> PublicEncryptionKey {
        PublicEncryptionKey {
            public_key: RsaPublicKey::from(&self.private_key),
        }
    }

    /// Decrypts a hybrid payload produced by [`PublicEncryptionKey::encrypt_hybrid`].
    pub fn decrypt_hybrid(&self, framed: &[u8]) -> CryptoResult<Vec<u8>> {
        if framed.len() < 2 {
            return Err(CryptoError::decryption_failed("hybrid payload shorter than length prefix"));
        }
        let rsa_len = u16::from_be_bytes([framed[0], framed[1]]) as usize;
        let rest = &framed[2..];
        if rest.len() < rsa_len {
            return Err(CryptoError::decryption_failed("hybrid payload truncated before rsa blob end"));
        }
        let (rsa_blob, aes_ciphertext) = rest.split_at(rsa_len);

        let padding = Oaep::new::<Sha256>();
        let aes_key_bytes = self
            .private_key
            .decrypt(padding, rsa_blob)
            .map_err(|e| CryptoError::rsa_failed(e.to_string()))?;
        let aes_key = SymmetricKey::from_bytes(&aes_key_bytes)?;
        decrypt_payload(aes_ciphertext, &aes_key)
    }

    /// Encrypts the private key under a password-derived key, the RSA
    /// counterpart of `SigningKeyPair::encrypt`.
    pub fn encrypt(&self, password: &[u8], salt_string: &str, iterations: u32) -> CryptoResult<EncryptedPrivateKey> {
        use rsa::pkcs8::EncodePrivateKey;
        let der = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::malformed_key(e.to_string()))?;
        encrypt_private_key_bytes(der.as_bytes(), password, salt_string, iterations)
    }

    /// Decrypts an encryption key pair from an [`EncryptedPrivateKey`].
    pub fn decrypt(encrypted: &EncryptedPrivateKey, password: &[u8], salt_string: &str) -> CryptoResult<Self> {
        use rsa::pkcs8::DecodePrivateKey;
        let bytes = decrypt_private_key_bytes(encrypted, password, salt_string)?;
        let private_key =
            RsaPrivateKey::from_pkcs8_der(&bytes).map_err(|e| CryptoError::malformed_key(e.to_string()))?;
        Ok(Self { private_key })
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair").field("public_key", &self.public_key()).finish()
    }
}

/// An RSA-OAEP public key.
#[derive(Clone)]
pub struct PublicEncryptionKey {
    public_key: RsaPublicKey,
}

impl PublicEncryptionKey {
    /// Parses a public key from its DER-encoded `RSAPublicKey` bytes.
    pub fn from_der(bytes: &[u8]) -> CryptoResult<Self> {
        use rsa::pkcs1::DecodeRsaPublicKey;
        let public_key =
            RsaPublicKey::from_pkcs1_der(bytes).map_err(|e| CryptoError::malformed_key(e.to_string()))?;
        Ok(Self { public_key })
    }

    /// Encodes this public key as DER-encoded `RSAPublicKey` bytes, the
    /// inverse of [`Self::from_der`].
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        use rsa::pkcs1::EncodeRsaPublicKey;
        self.public_key
            .to_pkcs1_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::malformed_key(e.to_string()))
    }

    /// Encrypts `plaintext` as a hybrid payload: random AES key, RSA-OAEP
    /// wraps the key, AES-GCM encrypts the data. Returns
    /// `len(rsa_blob) as u16-be || rsa_blob || aes_iv || aes_ciphertext || aes_tag`.
    pub fn encrypt_hybrid(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let aes_key = SymmetricKey::generate();
        let padding = Oaep::new::<Sha256>();
        let rsa_blob = self
            .public_key
            .encrypt(&mut OsRng, padding, aes_key.as_bytes().as_slice())
            .map_err(|e| CryptoError::rsa_failed(e.to_string()))?;
        if rsa_blob.len() > u16::MAX as usize {
            return Err(CryptoError::rsa_failed("rsa blob exceeds u16 length prefix"));
        }

        let aes_ciphertext = encrypt_payload(plaintext, &aes_key)?;

        let mut framed = Vec::with_capacity(2 + rsa_blob.len() + aes_ciphertext.len());
        framed.extend_from_slice(&(rsa_blob.len() as u16).to_be_bytes());
        framed.extend_from_slice(&rsa_blob);
        framed.extend_from_slice(&aes_ciphertext);
        Ok(framed)
    }
}

impl std::fmt::Debug for PublicEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicEncryptionKey(modulus_bits={})", self.public_key.size() * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pair() -> EncryptionKeyPair {
        // 3072-bit keygen is slow; tests use a smaller modulus purely for speed.
        EncryptionKeyPair {
            private_key: RsaPrivateKey::new(&mut OsRng, 1024).unwrap(),
        }
    }

    #[test]
    fn hybrid_roundtrip() {
        let pair = test_pair();
        let plaintext = b"username_encrypted payload";
        let framed = pair.public_key().encrypt_hybrid(plaintext).unwrap();
        assert_eq!(pair.decrypt_hybrid(&framed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails_decrypt() {
        let pair1 = test_pair();
        let pair2 = test_pair();
        let framed = pair1.public_key().encrypt_hybrid(b"secret").unwrap();
        assert!(pair2.decrypt_hybrid(&framed).is_err());
    }

    #[test]
    fn encrypt_decrypt_private_key_roundtrip() {
        let pair = test_pair();
        let encrypted = pair.encrypt(b"correct horse", "encryption", 60_000).unwrap();
        let restored = EncryptionKeyPair::decrypt(&encrypted, b"correct horse", "encryption").unwrap();
        let plaintext = b"round trip me";
        let framed = restored.public_key().encrypt_hybrid(plaintext).unwrap();
        assert_eq!(pair.decrypt_hybrid(&framed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_password_fails_decrypt_private_key() {
        let pair = test_pair();
        let encrypted = pair.encrypt(b"correct horse", "encryption", 60_000).unwrap();
        assert!(EncryptionKeyPair::decrypt(&encrypted, b"wrong", "encryption").is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        let pair = test_pair();
        let framed = pair.public_key().encrypt_hybrid(b"secret").unwrap();
        assert!(pair.decrypt_hybrid(&framed[..3]).is_err());
    }
}
