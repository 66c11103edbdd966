//! the pure function surface of §4.A, gathered in one module so
//! callers only need `use anastasis_crypto::facade::*;`.

use crate::aead::{decrypt_random_nonce, decrypt_with_nonce, encrypt_random_nonce, encrypt_with_nonce};
use crate::error::{Error, Result};
use crate::kdf::{hkdf_expand_32, hmac_sha256};
use rand::RngCore;

/// `encrypt_recovery_document(id32, plaintext) -> ciphertext` (§4.A, §6).
///
/// key is derived from the user identifier; nonce is random and
/// prefixed onto the ciphertext since a user identifier is reused
/// across re-uploads of the same document.
pub fn encrypt_recovery_document(id32: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = hkdf_expand_32(id32, b"anastasis:recovery-document:v1")?;
    encrypt_random_nonce(&key, plaintext)
}

pub fn decrypt_recovery_document(id32: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let key = hkdf_expand_32(id32, b"anastasis:recovery-document:v1")?;
    decrypt_random_nonce(&key, ciphertext)
}

/// `encrypt_truth_datum(nonce, truth_key, datum) -> ciphertext` (§4.A, §3).
///
/// nonce is caller-supplied because a truth's nonce is generated once
/// at truth creation and must match on the decrypt side deterministically.
pub fn encrypt_truth_datum(nonce: &[u8; 12], truth_key: &[u8; 32], datum: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_nonce(truth_key, nonce, datum)
}

pub fn decrypt_truth_datum(nonce: &[u8; 12], truth_key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
    decrypt_with_nonce(truth_key, nonce, ciphertext)
}

/// `encrypt_key_share(key_share, id32, optional_answer) -> encrypted_key_share` (§4.A).
///
/// the key is derived from the user identifier alone for most method
/// types; for `question`-type truths the hashed answer is mixed in
/// too, so a provider that leaks its stored ciphertext still cannot
/// recover the share without also knowing the answer (§3 invariant).
/// the nonce is fixed-zero because the derived key is unique per call
/// (fresh `id32`/answer combination per truth), matching the
/// grounding repo's `nonce = [0u8; 12] // ok since key is unique per
/// registration` convention.
pub fn encrypt_key_share(key_share: &[u8; 32], id32: &[u8; 32], answer: Option<&[u8; 32]>) -> Result<Vec<u8>> {
    let key = key_share_encryption_key(id32, answer)?;
    let nonce = [0u8; 12];
    encrypt_with_nonce(&key, &nonce, key_share)
}

pub fn decrypt_key_share(
    encrypted_key_share: &[u8],
    id32: &[u8; 32],
    answer: Option<&[u8; 32]>,
) -> Result<[u8; 32]> {
    let key = key_share_encryption_key(id32, answer)?;
    let nonce = [0u8; 12];
    let plaintext = decrypt_with_nonce(&key, &nonce, encrypted_key_share)?;
    plaintext
        .try_into()
        .map_err(|_| Error::DecryptionFailed("key share has wrong length".into()))
}

fn key_share_encryption_key(id32: &[u8; 32], answer: Option<&[u8; 32]>) -> Result<[u8; 32]> {
    match answer {
        None => hkdf_expand_32(id32, b"anastasis:key-share:v1"),
        Some(answer) => {
            let mut ikm = Vec::with_capacity(64);
            ikm.extend_from_slice(id32);
            ikm.extend_from_slice(answer);
            hkdf_expand_32(&ikm, b"anastasis:key-share:question:v1")
        }
    }
}

/// `hash_security_answer(answer_utf8, uuid, question_salt) -> hash32` (§4.A, §4.G).
pub fn hash_security_answer(answer_utf8: &str, uuid: &[u8; 16], question_salt: &[u8; 32]) -> [u8; 32] {
    hmac_sha256(
        question_salt,
        &[b"anastasis:security-answer:v1", uuid, answer_utf8.trim().to_lowercase().as_bytes()],
    )
}

/// `hash_numeric_answer(u64) -> hash32` (§4.A, §4.G). used for sms/totp
/// style numeric codes, which have no per-truth salt of their own.
pub fn hash_numeric_answer(code: u64) -> [u8; 32] {
    hmac_sha256(b"anastasis:numeric-answer:v1", &[&code.to_be_bytes()])
}

/// `derive_policy_key(key_share[], policy_salt) -> policy_key` (§4.A, §3).
pub fn derive_policy_key(key_shares: &[[u8; 32]], policy_salt: &[u8; 32]) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(key_shares.len() * 32);
    for share in key_shares {
        ikm.extend_from_slice(share);
    }
    hmac_sha256(policy_salt, &[b"anastasis:policy-key:v1", &ikm])
}

/// output of [`encrypt_core_secret`]: a fresh master key encrypted
/// once per policy, and the core secret encrypted once under the
/// master key (§3, §4.E step 1).
pub struct CoreSecretEncryption {
    pub encrypted_master_keys: Vec<Vec<u8>>,
    pub encrypted_core_secret: Vec<u8>,
}

/// `encrypt_core_secret(policy_key[], core_secret) -> {enc_master_keys[], enc_core_secret}` (§4.A).
///
/// one fresh `master_key` per backup session; every policy gets its
/// own encryption of that same master key under its own policy key,
/// so satisfying any one policy recovers the same master key (§3 invariant).
pub fn encrypt_core_secret(policy_keys: &[[u8; 32]], core_secret: &[u8]) -> Result<CoreSecretEncryption> {
    let mut master_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut master_key);

    let encrypted_core_secret = encrypt_random_nonce(&master_key, core_secret)?;

    let mut encrypted_master_keys = Vec::with_capacity(policy_keys.len());
    for policy_key in policy_keys {
        encrypted_master_keys.push(encrypt_random_nonce(policy_key, &master_key)?);
    }

    Ok(CoreSecretEncryption {
        encrypted_master_keys,
        encrypted_core_secret,
    })
}

/// `recover_core_secret(enc_master_key, policy_key, enc_core_secret) -> core_secret` (§4.A).
pub fn recover_core_secret(
    encrypted_master_key: &[u8],
    policy_key: &[u8; 32],
    encrypted_core_secret: &[u8],
) -> Result<Vec<u8>> {
    let master_key_bytes = decrypt_random_nonce(policy_key, encrypted_master_key)?;
    let master_key: [u8; 32] = master_key_bytes
        .try_into()
        .map_err(|_| Error::DecryptionFailed("recovered master key has wrong length".into()))?;
    decrypt_random_nonce(&master_key, encrypted_core_secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_document_roundtrip() {
        let id32 = [5u8; 32];
        let plaintext = b"{\"policies\":[]}";
        let ciphertext = encrypt_recovery_document(&id32, plaintext).unwrap();
        let back = decrypt_recovery_document(&id32, &ciphertext).unwrap();
        assert_eq!(plaintext.as_slice(), back.as_slice());
    }

    #[test]
    fn key_share_roundtrip_without_answer() {
        let id32 = [1u8; 32];
        let share = [42u8; 32];
        let enc = encrypt_key_share(&share, &id32, None).unwrap();
        let dec = decrypt_key_share(&enc, &id32, None).unwrap();
        assert_eq!(share, dec);
    }

    #[test]
    fn key_share_roundtrip_with_answer_requires_matching_answer() {
        let id32 = [1u8; 32];
        let share = [42u8; 32];
        let answer = hash_security_answer("The5Color!", &[9u8; 16], &[3u8; 32]);
        let enc = encrypt_key_share(&share, &id32, Some(&answer)).unwrap();

        let dec = decrypt_key_share(&enc, &id32, Some(&answer)).unwrap();
        assert_eq!(share, dec);

        let wrong_answer = hash_security_answer("wrong", &[9u8; 16], &[3u8; 32]);
        assert!(decrypt_key_share(&enc, &id32, Some(&wrong_answer)).is_err());
    }

    #[test]
    fn core_secret_end_to_end_with_two_policies() {
        let key_a = [1u8; 32];
        let key_b = [2u8; 32];
        let core_secret = br#"{"name":"John"}"#;

        let enc = encrypt_core_secret(&[key_a, key_b], core_secret).unwrap();
        assert_eq!(enc.encrypted_master_keys.len(), 2);

        let recovered_a = recover_core_secret(&enc.encrypted_master_keys[0], &key_a, &enc.encrypted_core_secret).unwrap();
        let recovered_b = recover_core_secret(&enc.encrypted_master_keys[1], &key_b, &enc.encrypted_core_secret).unwrap();
        assert_eq!(recovered_a, core_secret);
        assert_eq!(recovered_b, core_secret);
    }

    #[test]
    fn wrong_policy_key_fails_to_recover() {
        let key_a = [1u8; 32];
        let wrong = [3u8; 32];
        let enc = encrypt_core_secret(&[key_a], b"secret").unwrap();
        assert!(recover_core_secret(&enc.encrypted_master_keys[0], &wrong, &enc.encrypted_core_secret).is_err());
    }
}
