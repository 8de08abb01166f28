//! # MindooDB Crypto
//!
//! CryptoCore: the stateless cryptographic primitives the rest of MindooDB
//! builds on. Signing and encryption always use disjoint key pairs
//! (Ed25519 for signing, RSA-OAEP/AES for encryption); keys are never
//! reused across purposes.
//!
//! - [`aead`] — AES-256-GCM payload encryption (`iv || ciphertext || tag`).
//! - [`pbkdf`] — PBKDF2-SHA256 password-to-key derivation with
//!   domain-separated salts.
//! - [`signing`] — Ed25519 signing/verification and password-encrypted
//!   private key storage.
//! - [`hybrid`] — RSA-OAEP-3072 hybrid encryption for payloads addressed to
//!   a public key rather than a shared symmetric key.
//! - [`hash`] — SHA-256 hashing.
//! - [`docsigner`] — canonical-JSON combined-item signatures.
//! - [`attachment`] — mode-framed attachment chunk encryption.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod attachment;
pub mod docsigner;
mod error;
pub mod hash;
pub mod hybrid;
pub mod pbkdf;
pub mod signing;

pub use aead::{decrypt_payload, encrypt_payload, SymmetricKey};
pub use docsigner::{canonical_item_bytes, sign_items, verify_items};
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash_username, sha256, sha256_hex};
pub use hybrid::{EncryptionKeyPair, PublicEncryptionKey};
pub use pbkdf::{derive_key, resolve_iterations, DEFAULT_ITERATIONS, MIN_ITERATIONS};
pub use signing::{EncryptedPrivateKey, PublicSigningKey, SigningKeyPair};
