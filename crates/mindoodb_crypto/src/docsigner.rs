//! Combined document-item signing.
//!
//! Binds a signature to an exact named set of document fields: the
//! canonical JSON of those fields (missing fields become `null`) is signed
//! with Ed25519, so tampering with any one listed field invalidates the
//! signature.

use crate::error::CryptoResult;
use crate::signing::{PublicSigningKey, SigningKeyPair};
use mindoodb_codec::{to_canonical_json, Value};

/// Builds the canonical-JSON byte representation a signature is computed
/// over: an object with exactly `items` as keys, each value selected from
/// `doc` (or `Value::Undefined`, which canonicalizes to `null`).
#[must_use]
pub fn canonical_item_bytes(doc: &Value, items: &[&str]) -> Vec<u8> {
    let selected: Vec<(String, Value)> = items
        .iter()
        .map(|&field| (field.to_string(), doc.get(field).cloned().unwrap_or(Value::Undefined)))
        .collect();
    to_canonical_json(&Value::Object(selected)).into_bytes()
}

/// Signs the selected `items` of `doc` with `signing_key`.
#[must_use]
pub fn sign_items(doc: &Value, items: &[&str], signing_key: &SigningKeyPair) -> [u8; 64] {
    signing_key.sign(&canonical_item_bytes(doc, items))
}

/// Verifies a signature produced by [`sign_items`].
pub fn verify_items(
    doc: &Value,
    items: &[&str],
    signature: &[u8],
    public_key: &PublicSigningKey,
) -> CryptoResult<()> {
    public_key.verify(&canonical_item_bytes(doc, items), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant_doc() -> Value {
        Value::object(vec![
            ("form", Value::from("useroperation")),
            ("type", Value::from("grantaccess")),
            ("username", Value::from("alice")),
            ("userSigningPublicKey", Value::from("pk-sign")),
            ("userEncryptionPublicKey", Value::from("pk-enc")),
        ])
    }

    const GRANT_FIELDS: &[&str] = &[
        "form",
        "type",
        "username",
        "userSigningPublicKey",
        "userEncryptionPublicKey",
        "adminSignatureFields",
    ];

    #[test]
    fn sign_and_verify_roundtrip() {
        let pair = SigningKeyPair::generate();
        let doc = grant_doc();
        let sig = sign_items(&doc, GRANT_FIELDS, &pair);
        assert!(verify_items(&doc, GRANT_FIELDS, &sig, &pair.public_key()).is_ok());
    }

    #[test]
    fn missing_field_becomes_null_but_still_binds() {
        let pair = SigningKeyPair::generate();
        let doc = grant_doc();
        // adminSignatureFields is absent from doc -> canonicalizes to null,
        // still part of what's signed.
        let sig = sign_items(&doc, GRANT_FIELDS, &pair);
        assert!(verify_items(&doc, GRANT_FIELDS, &sig, &pair.public_key()).is_ok());
    }

    #[test]
    fn tampering_any_listed_field_invalidates_signature() {
        let pair = SigningKeyPair::generate();
        let doc = grant_doc();
        let sig = sign_items(&doc, GRANT_FIELDS, &pair);

        let mut tampered = grant_doc();
        if let Value::Object(pairs) = &mut tampered {
            for (k, v) in pairs.iter_mut() {
                if k == "username" {
                    *v = Value::from("mallory");
                }
            }
        }
        assert!(verify_items(&tampered, GRANT_FIELDS, &sig, &pair.public_key()).is_err());
    }

    #[test]
    fn unrelated_field_change_does_not_affect_signature() {
        let pair = SigningKeyPair::generate();
        let mut doc = grant_doc();
        let sig = sign_items(&doc, GRANT_FIELDS, &pair);

        if let Value::Object(pairs) = &mut doc {
            pairs.push(("unrelatedField".to_string(), Value::from("anything")));
        }
        assert!(verify_items(&doc, GRANT_FIELDS, &sig, &pair.public_key()).is_ok());
    }
}
