//! truth-uploader and secret-sharer errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] anastasis_crypto::Error),
    #[error("secret exceeds the smallest upload limit across selected providers")]
    SecretTooBig,
    #[error("challenge datum exceeds the smallest upload limit across selected providers")]
    ChallengeDataTooBig,
    #[error("no selected provider offers this authentication method")]
    MethodNotSupported,
}
