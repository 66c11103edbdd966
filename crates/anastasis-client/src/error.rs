//! provider-client errors. these are *transport* errors; §4.B's
//! point is that everything above the transport layer, including a
//! 402 or a 409, is a typed response variant, not an `Err`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response did not parse as the expected type: {0}")]
    Malformed(String),
    #[error("request timed out")]
    Timeout,
    #[error("request was cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(e.to_string())
        }
    }
}
