//! account keypair derivation (§4.A): deterministic ed25519 keypair
//! derived from the user identifier. the public key names the
//! account at a provider; the private key signs recovery-document
//! uploads.

use crate::error::Result;
use crate::kdf::hkdf_expand_32;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

pub struct AccountKeypair {
    signing_key: SigningKey,
}

impl AccountKeypair {
    /// `derive_account_keypair(id32) -> (priv, pub)` (§4.A).
    ///
    /// deterministic: losing the identity attributes that produced
    /// `id32` means losing the account, by design (§3).
    pub fn derive(id32: &[u8; 32]) -> Result<Self> {
        let seed = hkdf_expand_32(id32, b"anastasis:account:ed25519:v1")?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_distinct() {
        let id_a = [1u8; 32];
        let id_b = [2u8; 32];

        let a1 = AccountKeypair::derive(&id_a).unwrap();
        let a2 = AccountKeypair::derive(&id_a).unwrap();
        assert_eq!(a1.public_key_bytes(), a2.public_key_bytes());

        let b = AccountKeypair::derive(&id_b).unwrap();
        assert_ne!(a1.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn signs_verifiably() {
        use ed25519_dalek::Verifier;
        let account = AccountKeypair::derive(&[9u8; 32]).unwrap();
        let msg = b"policy upload hash";
        let sig = account.sign(msg);
        assert!(account.public_key().verify(msg, &sig).is_ok());
    }
}
