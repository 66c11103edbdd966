//! authentication method types.
//!
//! behaviour only varies along three axes when answering a challenge
//! (§9 design notes): a free-text answer that gets hashed with a
//! question salt, a numeric code, or no answer at all. `MethodType`
//! is the open wire-level set of method names; `ChallengeKind` is the
//! closed three-way split the challenge runner actually dispatches on.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodType {
    Question,
    Sms,
    Email,
    Post,
    Video,
    Totp,
    Iban,
    Other(String),
}

impl MethodType {
    pub fn as_str(&self) -> &str {
        match self {
            MethodType::Question => "question",
            MethodType::Sms => "sms",
            MethodType::Email => "email",
            MethodType::Post => "post",
            MethodType::Video => "video",
            MethodType::Totp => "totp",
            MethodType::Iban => "iban",
            MethodType::Other(s) => s.as_str(),
        }
    }

    /// which of the three answer shapes this method expects, per the
    /// challenge-runner entry rules of spec §4.G.
    pub fn kind(&self) -> ChallengeKind {
        match self {
            MethodType::Question => ChallengeKind::Question,
            MethodType::Sms | MethodType::Totp => ChallengeKind::Numeric,
            MethodType::Email
            | MethodType::Post
            | MethodType::Video
            | MethodType::Iban
            | MethodType::Other(_) => ChallengeKind::Opaque,
        }
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MethodType {
    fn from(s: &str) -> Self {
        match s {
            "question" => MethodType::Question,
            "sms" => MethodType::Sms,
            "email" => MethodType::Email,
            "post" => MethodType::Post,
            "video" => MethodType::Video,
            "totp" => MethodType::Totp,
            "iban" => MethodType::Iban,
            other => MethodType::Other(other.to_string()),
        }
    }
}

impl From<String> for MethodType {
    fn from(s: String) -> Self {
        MethodType::from(s.as_str())
    }
}

impl Serialize for MethodType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MethodType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(MethodType::from(s))
    }
}

/// the three answer shapes a challenge can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// free-text answer, hashed with `hash_security_answer`.
    Question,
    /// numeric code (e.g. an SMS TAN), hashed with `hash_numeric_answer`.
    Numeric,
    /// no caller-supplied answer; the GET alone may solve it.
    Opaque,
}
