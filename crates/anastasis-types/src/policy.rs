//! policy and recovery-document entities (spec §3, §6).

use crate::truth::TruthReference;
use serde::{Deserialize, Serialize};

/// an unordered set of truth references plus a salt (§3). satisfying
/// every truth in the set releases `policy_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub salt: [u8; 32],
    pub truths: Vec<TruthReference>,
}

/// one (method, provider) assignment the planner has chosen for one
/// slot of one candidate policy (§4.H step 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMethod {
    /// index into the user's chosen authentication-method list.
    pub authentication_method: usize,
    pub provider: String,
}

/// one planner-emitted candidate policy, written into reducer state
/// for UI review (§4.H step 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCandidate {
    pub methods: Vec<PolicyMethod>,
}

/// one escrow-method entry in a recovery document: everything needed
/// to later contact the provider and decrypt a released key share,
/// except the user identifier (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowMethod {
    pub uuid: [u8; 16],
    pub url: String,
    pub instructions: String,
    pub truth_key: [u8; 32],
    pub truth_salt: [u8; 32],
    pub provider_salt: [u8; 32],
    pub escrow_type: String,
}

/// one policy entry as it appears inside the recovery document body
/// (§6): the master key ciphertext, its own salt, and its truth list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPolicy {
    pub master_key: Vec<u8>,
    pub salt: [u8; 32],
    pub uuids: Vec<[u8; 16]>,
}

/// the plaintext JSON schema of §6: what gets deflated, AEAD'd under
/// a key derived from the user identifier, then signed and uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    pub policies: Vec<DocumentPolicy>,
    pub escrow_methods: Vec<EscrowMethod>,
    pub encrypted_core_secret: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_document_roundtrips() {
        let doc = RecoveryDocument {
            secret_name: Some("my wallet".into()),
            policies: vec![DocumentPolicy {
                master_key: vec![1, 2, 3],
                salt: [9; 32],
                uuids: vec![[1; 16], [2; 16]],
            }],
            escrow_methods: vec![EscrowMethod {
                uuid: [1; 16],
                url: "https://p.example".into(),
                instructions: "enter your pin".into(),
                truth_key: [3; 32],
                truth_salt: [4; 32],
                provider_salt: [5; 32],
                escrow_type: "question".into(),
            }],
            encrypted_core_secret: vec![7, 8, 9],
        };
        let json = serde_json::to_vec(&doc).unwrap();
        let back: RecoveryDocument = serde_json::from_slice(&json).unwrap();
        assert_eq!(doc.policies.len(), back.policies.len());
        assert_eq!(doc.escrow_methods[0].uuid, back.escrow_methods[0].uuid);
    }
}
