//! Password-to-key derivation.
//!
//! `deriveKey` combines a random per-secret salt with a domain-separation
//! string (`"default"`, `"signing"`, `"encryption"`, `"administration"`, a
//! keyId, or `"key-bag-encryption"`) so the same password never derives the
//! same key for two different purposes.

use crate::aead::{SymmetricKey, KEY_SIZE};
use crate::error::CryptoResult;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

/// Default PBKDF2 iteration count, used unless overridden.
pub const DEFAULT_ITERATIONS: u32 = 310_000;
/// Lower bound enforced on the iteration count regardless of override source.
pub const MIN_ITERATIONS: u32 = 60_000;

const ITERATIONS_ENV_VAR: &str = "MINDOODB_PBKDF2_ITERATIONS";

/// Process-wide override for the PBKDF2 iteration count.
///
/// Read once at startup from [`ITERATIONS_ENV_VAR`] or set explicitly via
/// [`set_global_iterations`]; never mutated after that, per the "no runtime
/// global mutation" rule for process-wide configuration.
static GLOBAL_ITERATIONS: std::sync::OnceLock<u32> = std::sync::OnceLock::new();

/// Sets the process-wide PBKDF2 iteration override. No-op if already set.
pub fn set_global_iterations(iterations: u32) {
    let _ = GLOBAL_ITERATIONS.set(clamp_iterations(iterations));
}

/// Resolves the iteration count to use: explicit override, else the global
/// override (env var or [`set_global_iterations`]), else [`DEFAULT_ITERATIONS`].
///
/// Non-integer environment values fall back to the default rather than
/// erroring, matching the "parsing non-integers falls back to default" rule.
#[must_use]
pub fn resolve_iterations(explicit: Option<u32>) -> u32 {
    if let Some(n) = explicit {
        return clamp_iterations(n);
    }
    let global = *GLOBAL_ITERATIONS.get_or_init(|| {
        std::env::var(ITERATIONS_ENV_VAR)
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .map_or(DEFAULT_ITERATIONS, clamp_iterations)
    });
    global
}

fn clamp_iterations(n: u32) -> u32 {
    n.max(MIN_ITERATIONS)
}

/// Derives an AES-256 key from a password, salt, domain-separation string,
/// and iteration count.
///
/// `combined_salt = salt || UTF8(salt_string)`.
#[must_use]
pub fn derive_key(password: &[u8], salt: &[u8], salt_string: &str, iterations: u32) -> SymmetricKey {
    let mut combined_salt = Vec::with_capacity(salt.len() + salt_string.len());
    combined_salt.extend_from_slice(salt);
    combined_salt.extend_from_slice(salt_string.as_bytes());

    let mut key_bytes = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password, &combined_salt, iterations, &mut key_bytes);
    SymmetricKey::from_bytes(&key_bytes).expect("derived key is always KEY_SIZE bytes")
}

/// Derives a key using [`resolve_iterations`] with no explicit override.
#[must_use]
pub fn derive_key_default_iterations(password: &[u8], salt: &[u8], salt_string: &str) -> SymmetricKey {
    derive_key(password, salt, salt_string, resolve_iterations(None))
}

/// Generates a fresh random salt suitable for [`derive_key`].
#[must_use]
pub fn generate_salt() -> [u8; 16] {
    use rand::RngCore;
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Parses an iteration count from a raw string, following the same
/// fallback-to-default rule as environment variable parsing.
#[must_use]
pub fn parse_iterations(raw: &str) -> u32 {
    raw.parse::<u32>().map_or(DEFAULT_ITERATIONS, clamp_iterations)
}

/// Convenience wrapper matching `CryptoResult` for call sites that thread
/// errors through `?`, even though derivation itself cannot currently fail.
pub fn try_derive_key(password: &[u8], salt: &[u8], salt_string: &str, iterations: u32) -> CryptoResult<SymmetricKey> {
    Ok(derive_key(password, salt, salt_string, iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let salt = generate_salt();
        let a = derive_key(b"hunter2", &salt, "default", 60_000);
        let b = derive_key(b"hunter2", &salt, "default", 60_000);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_string_differs() {
        let salt = generate_salt();
        let a = derive_key(b"hunter2", &salt, "signing", 60_000);
        let b = derive_key(b"hunter2", &salt, "encryption", 60_000);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_differs() {
        let a = derive_key(b"hunter2", &generate_salt(), "default", 60_000);
        let b = derive_key(b"hunter2", &generate_salt(), "default", 60_000);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn iterations_clamped_to_minimum() {
        assert_eq!(clamp_iterations(1), MIN_ITERATIONS);
        assert_eq!(clamp_iterations(1_000_000), 1_000_000);
    }

    #[test]
    fn parse_iterations_falls_back_on_garbage() {
        assert_eq!(parse_iterations("not-a-number"), DEFAULT_ITERATIONS);
        assert_eq!(parse_iterations("120000"), 120_000);
    }

    #[test]
    fn resolve_iterations_uses_explicit_override() {
        assert_eq!(resolve_iterations(Some(100_000)), 100_000);
    }
}
