//! crypto facade errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kdf failed: {0}")]
    KdfFailed(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("ciphertext too short to contain a nonce")]
    CiphertextTooShort,
    #[error("wrong number of key shares: have {have}, need at least {need}")]
    NotEnoughShares { have: usize, need: usize },
}
