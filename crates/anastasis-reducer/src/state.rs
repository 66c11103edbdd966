//! reducer state tags: §4.I, §3.
//!
//! the state itself stays a dynamic JSON object (§9 design notes
//! accept either representation; the wire schema is the contract).
//! this module only fixes the closed set of `backup_state` /
//! `recovery_state` tag values and the accessors every handler uses
//! to read and write them without duplicating field-presence checks.

use anastasis_types::{ErrorCode, ReducerError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Backup,
    Recovery,
}

macro_rules! state_enum {
    ($name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// the state one `back` action before this one, or `None`
            /// at the start of the sequence (§4.I: "every state except
            /// the terminals supports a `back` action").
            pub fn previous(self) -> Option<Self> {
                const ORDER: &[$name] = &[$($name::$variant),+];
                let idx = ORDER.iter().position(|s| *s == self)?;
                idx.checked_sub(1).map(|i| ORDER[i])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

state_enum!(BackupState {
    ContinentSelecting => "CONTINENT_SELECTING",
    CountrySelecting => "COUNTRY_SELECTING",
    UserAttributesCollecting => "USER_ATTRIBUTES_COLLECTING",
    AuthenticationsEditing => "AUTHENTICATIONS_EDITING",
    PoliciesReviewing => "POLICIES_REVIEWING",
    SecretEditing => "SECRET_EDITING",
    TruthsPaying => "TRUTHS_PAYING",
    PoliciesPaying => "POLICIES_PAYING",
    BackupFinished => "BACKUP_FINISHED",
});

state_enum!(RecoveryState {
    ContinentSelecting => "CONTINENT_SELECTING",
    CountrySelecting => "COUNTRY_SELECTING",
    UserAttributesCollecting => "USER_ATTRIBUTES_COLLECTING",
    SecretSelecting => "SECRET_SELECTING",
    ChallengeSelecting => "CHALLENGE_SELECTING",
    ChallengePaying => "CHALLENGE_PAYING",
    ChallengeSolving => "CHALLENGE_SOLVING",
    RecoveryFinished => "RECOVERY_FINISHED",
});

/// read `backup_state` or `recovery_state` from `state`, determining
/// the session mode; a state carrying neither (or both) is a
/// programming error (§4.I: reducer-state-invalid).
pub fn mode_of(state: &Map<String, Value>) -> Result<Mode, ReducerError> {
    match (state.get("backup_state"), state.get("recovery_state")) {
        (Some(_), None) => Ok(Mode::Backup),
        (None, Some(_)) => Ok(Mode::Recovery),
        _ => Err(ReducerError::new(
            ErrorCode::ReducerStateInvalid,
            "state must carry exactly one of backup_state or recovery_state",
        )),
    }
}

pub fn backup_state_tag(state: &Map<String, Value>) -> Result<BackupState, ReducerError> {
    let raw = state
        .get("backup_state")
        .and_then(Value::as_str)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, "missing backup_state"))?;
    BackupState::from_str(raw)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("unknown backup_state {raw:?}")))
}

pub fn recovery_state_tag(state: &Map<String, Value>) -> Result<RecoveryState, ReducerError> {
    let raw = state
        .get("recovery_state")
        .and_then(Value::as_str)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, "missing recovery_state"))?;
    RecoveryState::from_str(raw)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("unknown recovery_state {raw:?}")))
}

pub fn set_backup_state(state: &mut Map<String, Value>, tag: BackupState) {
    state.insert("backup_state".into(), Value::String(tag.as_str().to_string()));
}

pub fn set_recovery_state(state: &mut Map<String, Value>, tag: RecoveryState) {
    state.insert("recovery_state".into(), Value::String(tag.as_str().to_string()));
}

/// read and deserialize a required field, mapping absence or a type
/// mismatch to reducer-state-invalid (programmer error: the field
/// should have been written by an earlier handler).
pub fn get_state_field<T: DeserializeOwned>(state: &Map<String, Value>, field: &str) -> Result<T, ReducerError> {
    let value = state
        .get(field)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("missing state field {field:?}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("state field {field:?} malformed: {e}")))
}

pub fn get_state_field_or<T: DeserializeOwned>(state: &Map<String, Value>, field: &str, default: T) -> T {
    state
        .get(field)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(default)
}

pub fn set_state_field<T: Serialize>(state: &mut Map<String, Value>, field: &str, value: T) {
    state.insert(field.to_string(), serde_json::to_value(value).expect("state field always serializes"));
}

/// read a required action argument, mapping absence or a type
/// mismatch to reducer-input-invalid (user error: the caller supplied
/// a bad argument).
pub fn get_arg<T: DeserializeOwned>(args: &Value, field: &str) -> Result<T, ReducerError> {
    let value = args
        .get(field)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("missing argument {field:?}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("argument {field:?} malformed: {e}")))
}

pub fn get_arg_opt<T: DeserializeOwned>(args: &Value, field: &str) -> Option<T> {
    args.get(field).and_then(|v| serde_json::from_value(v.clone()).ok())
}
