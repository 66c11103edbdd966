//! the `Truth` entity of spec §3: one (challenge, key-share) pair.

use crate::method::MethodType;
use serde::{Deserialize, Serialize};

/// one (challenge, key-share) pair, as held client-side during backup.
///
/// `truth_key` and `key_share` never leave the client except under
/// encryption; the provider only ever sees `encrypted_truth_datum`
/// and `encrypted_key_share`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truth {
    /// random at creation, identifies this truth at its provider.
    pub uuid: [u8; 16],
    pub provider_url: String,
    #[serde(rename = "type")]
    pub method_type: MethodType,
    pub instructions: String,
    /// 32-byte AEAD key, random at creation. never sent to the provider.
    pub truth_key: [u8; 32],
    /// only set for `question`-type truths.
    pub question_salt: Option<[u8; 32]>,
    /// copied from the provider's `/config` response.
    pub provider_salt: [u8; 32],
    /// AEAD nonce used for `encrypted_truth_datum`.
    pub nonce: [u8; 12],
    /// 32 random bytes, one of the secret shares of the policy key.
    pub key_share: [u8; 32],
    /// `AEAD(truth_key, nonce, challenge_datum)`; stored at the provider.
    pub encrypted_truth_datum: Vec<u8>,
    /// `key_share` encrypted under a key derived from the user
    /// identifier (and, for `question`-type, the answer); stored at
    /// the provider and released only once the challenge is solved.
    pub encrypted_key_share: Vec<u8>,
}

/// a reference to one truth inside a policy: everything a policy
/// needs other than the key material itself, which lives in the
/// recovery document's `escrow_methods` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthReference {
    pub uuid: [u8; 16],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_roundtrips_through_json() {
        let truth = Truth {
            uuid: [1; 16],
            provider_url: "https://provider.example".into(),
            method_type: MethodType::Question,
            instructions: "what is your pet's name?".into(),
            truth_key: [2; 32],
            question_salt: Some([3; 32]),
            provider_salt: [4; 32],
            nonce: [5; 12],
            key_share: [6; 32],
            encrypted_truth_datum: vec![7, 8, 9],
            encrypted_key_share: vec![10, 11, 12],
        };
        let json = serde_json::to_string(&truth).unwrap();
        let back: Truth = serde_json::from_str(&json).unwrap();
        assert_eq!(truth.uuid, back.uuid);
        assert_eq!(truth.method_type, back.method_type);
        assert_eq!(truth.encrypted_key_share, back.encrypted_key_share);
    }
}
