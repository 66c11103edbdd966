//! failure modes the recovery driver surfaces through its core-secret
//! callback (§4.F, §7). these mirror [`anastasis_types::ErrorCode`]'s
//! policy-* variants one to one.

use anastasis_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecoveryFailure {
    #[error("policy download failed")]
    PolicyDownloadFailed,
    #[error("policy not found at this provider")]
    PolicyNotFound,
    #[error("policy has expired at this provider")]
    PolicyExpired,
    #[error("recovery document exceeds the maximum accepted size")]
    DocumentTooBig,
    #[error("recovery document failed to decompress")]
    BadCompression,
    #[error("recovery document is not valid json")]
    NotJson,
    #[error("recovery document json does not match the expected schema")]
    MalformedJson,
    #[error("provider returned a server error")]
    ServerError,
}

impl RecoveryFailure {
    pub fn code(self) -> ErrorCode {
        match self {
            RecoveryFailure::PolicyDownloadFailed => ErrorCode::NetworkFailed,
            RecoveryFailure::PolicyNotFound => ErrorCode::PolicyUnknown,
            RecoveryFailure::PolicyExpired => ErrorCode::PolicyGone,
            RecoveryFailure::DocumentTooBig => ErrorCode::PolicyTooBig,
            RecoveryFailure::BadCompression => ErrorCode::PolicyBadCompression,
            RecoveryFailure::NotJson => ErrorCode::PolicyNoJson,
            RecoveryFailure::MalformedJson => ErrorCode::PolicyMalformed,
            RecoveryFailure::ServerError => ErrorCode::PolicyLookupFailed,
        }
    }
}
