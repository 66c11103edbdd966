//! chacha20poly1305 aead helpers.
//!
//! every encrypt call in this crate either uses a nonce that is
//! structurally unique per key (documented at the call site) or
//! prefixes a fresh random nonce onto the ciphertext; callers never
//! have to manage nonces themselves.

use crate::error::{Error, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// encrypt with an explicit nonce (used where the caller already
/// derived a nonce that is unique for this key, e.g. a truth's
/// per-creation nonce in §3).
pub fn encrypt_with_nonce(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| Error::EncryptionFailed(e.to_string()))
}

pub fn decrypt_with_nonce(key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| Error::DecryptionFailed(e.to_string()))
}

/// encrypt with a fresh random nonce, prefixed onto the returned blob.
pub fn encrypt_random_nonce(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = encrypt_with_nonce(key, &nonce, plaintext)?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// inverse of [`encrypt_random_nonce`]: strips the nonce prefix and decrypts.
pub fn decrypt_random_nonce(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(Error::CiphertextTooShort);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce.try_into().expect("split_at guarantees length");
    decrypt_with_nonce(key, &nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_nonce_roundtrip() {
        let key = [7u8; 32];
        let plaintext = b"recovery document payload";
        let blob = encrypt_random_nonce(&key, plaintext).unwrap();
        let back = decrypt_random_nonce(&key, &blob).unwrap();
        assert_eq!(plaintext.as_slice(), back.as_slice());
    }

    #[test]
    fn tampering_is_detected() {
        let key = [7u8; 32];
        let mut blob = encrypt_random_nonce(&key, b"hello").unwrap();
        *blob.last_mut().unwrap() ^= 0xff;
        assert!(decrypt_random_nonce(&key, &blob).is_err());
    }
}
