//! Blob framing for the persisted KeyBag: `IV(12) || Tag(16) || Ciphertext(rest)`.
//!
//! This ordering differs from the entry wire schema's `iv || ciphertext ||
//! tag`; it is specific to the KeyBag's on-disk blob and kept local to this
//! crate rather than exposed from `mindoodb_crypto`.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use mindoodb_crypto::SymmetricKey;
use rand::RngCore;

use crate::error::{KeyBagError, KeyBagResult};

const IV_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

pub fn encrypt_blob(plaintext: &[u8], key: &SymmetricKey) -> Vec<u8> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);
    let ct_and_tag = cipher.encrypt(nonce, plaintext).expect("AES-GCM encrypt is infallible here");
    let (ciphertext, tag) = ct_and_tag.split_at(ct_and_tag.len() - TAG_SIZE);

    let mut out = Vec::with_capacity(IV_SIZE + TAG_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(tag);
    out.extend_from_slice(ciphertext);
    out
}

pub fn decrypt_blob(blob: &[u8], key: &SymmetricKey) -> KeyBagResult<Vec<u8>> {
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(KeyBagError::corrupt("blob shorter than iv+tag"));
    }
    let (iv, rest) = blob.split_at(IV_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(iv);

    let mut ct_and_tag = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    ct_and_tag.extend_from_slice(ciphertext);
    ct_and_tag.extend_from_slice(tag);

    cipher
        .decrypt(nonce, ct_and_tag.as_slice())
        .map_err(|_| KeyBagError::corrupt("wrong password or tampered key bag"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = SymmetricKey::generate();
        let blob = encrypt_blob(b"secret table", &key);
        assert_eq!(decrypt_blob(&blob, &key).unwrap(), b"secret table");
    }

    #[test]
    fn wrong_key_rejected() {
        let key1 = SymmetricKey::generate();
        let key2 = SymmetricKey::generate();
        let blob = encrypt_blob(b"secret", &key1);
        assert!(decrypt_blob(&blob, &key2).is_err());
    }
}
