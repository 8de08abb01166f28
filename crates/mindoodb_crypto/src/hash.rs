//! SHA-256 hashing helpers.

use sha2::{Digest, Sha256};

/// Byte length of a SHA-256 digest.
pub const DIGEST_SIZE: usize = 32;

/// Computes `SHA-256(data)`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes `SHA-256(data)` and renders it as lowercase hex, the form used
/// for `contentHash` and `username_hash`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&sha256(data))
}

/// Hashes a lowercased username, giving the case-insensitive `username_hash`.
#[must_use]
pub fn hash_username(username: &str) -> String {
    sha256_hex(username.to_lowercase().as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA-256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn username_hash_is_case_insensitive() {
        assert_eq!(hash_username("Alice"), hash_username("alice"));
        assert_eq!(hash_username("ALICE"), hash_username("alice"));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
