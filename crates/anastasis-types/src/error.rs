//! the closed error-code enum of spec §7, and the wire shape the
//! reducer surfaces failures in.

use serde::{Deserialize, Serialize};

/// the closed enum of origins an error can come from, stratified the
/// way §7 lays them out. kept as a flat enum (not one per crate)
/// because the wire contract is a single `code` string and callers
/// switch on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ReducerInputInvalid,
    ReducerStateInvalid,
    ReducerActionInvalid,
    NetworkFailed,
    PolicyMalformed,
    PolicyTooBig,
    PolicyBadCompression,
    PolicyNoJson,
    PolicyLookupFailed,
    PolicyUnknown,
    PolicyGone,
    ProviderFailed,
    SecretTooBig,
    ChallengeDataTooBig,
    PaymentRequired,
    AuthenticationMethodNotSupported,
    InvalidAnswer,
    None,
}

impl ErrorCode {
    /// stable numeric code, mirroring the `TALER_EC_*` style the
    /// original implementation used on its reducer callback.
    pub fn numeric(self) -> i32 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::ReducerInputInvalid => 1001,
            ErrorCode::ReducerStateInvalid => 1002,
            ErrorCode::ReducerActionInvalid => 1003,
            ErrorCode::NetworkFailed => 1004,
            ErrorCode::PolicyMalformed => 1005,
            ErrorCode::PolicyTooBig => 1006,
            ErrorCode::PolicyBadCompression => 1007,
            ErrorCode::PolicyNoJson => 1008,
            ErrorCode::PolicyLookupFailed => 1009,
            ErrorCode::PolicyUnknown => 1010,
            ErrorCode::PolicyGone => 1011,
            ErrorCode::ProviderFailed => 1012,
            ErrorCode::SecretTooBig => 1013,
            ErrorCode::ChallengeDataTooBig => 1014,
            ErrorCode::PaymentRequired => 1015,
            ErrorCode::AuthenticationMethodNotSupported => 1016,
            ErrorCode::InvalidAnswer => 1017,
        }
    }
}

/// the JSON object a failed reducer action returns instead of a new
/// state (§4.I, §7): state is left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReducerError {
    pub code: i32,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReducerError {
    pub fn new(code: ErrorCode, hint: impl Into<String>) -> Self {
        Self {
            code: code.numeric(),
            hint: hint.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for ReducerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.hint)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ReducerError {}
