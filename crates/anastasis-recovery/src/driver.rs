//! recovery driver: §4.F. downloads, decrypts, and parses one
//! recovery document; materializes challenges and policies in
//! memory; tracks solved challenges; fires the core-secret callback
//! exactly once.

use crate::document::decode_recovery_document;
use crate::error::RecoveryFailure;
use anastasis_types::{DocumentPolicy, EscrowMethod, MethodType, RecoveryDocument};
use std::collections::HashMap;

/// the public face of one escrow method, as the UI sees it (§4.F step 3).
#[derive(Debug, Clone)]
pub struct ChallengeDetails {
    pub uuid: [u8; 16],
    pub method_type: MethodType,
    pub provider_url: String,
    pub instructions: String,
    pub solved: bool,
    /// discovered at runtime once the server answers 202 (§4.G).
    pub is_async: bool,
}

struct DecryptionPolicyState {
    master_key: Vec<u8>,
    salt: [u8; 32],
    uuids: Vec<[u8; 16]>,
}

/// what the driver hands back once a policy's every challenge is
/// solved (§4.F step 5, §8 property 8).
#[derive(Debug, Clone)]
pub struct CoreSecretRecovered {
    pub secret_name: Option<String>,
    pub core_secret: Vec<u8>,
}

/// in-memory materialization of one downloaded recovery document
/// (§4.F step 3), plus the bookkeeping needed to reassemble the
/// master key as challenges are solved.
pub struct RecoveryDriver {
    id32: [u8; 32],
    secret_name: Option<String>,
    encrypted_core_secret: Vec<u8>,
    challenges: Vec<ChallengeDetails>,
    escrow: HashMap<[u8; 16], EscrowMethod>,
    policies: Vec<DecryptionPolicyState>,
    solved_shares: HashMap<[u8; 16], [u8; 32]>,
    /// guards the "fires exactly once" and "never after abort"
    /// invariants (§4.F step 5, §8 properties 8-9).
    fired: bool,
}

impl RecoveryDriver {
    /// download, decrypt, inflate and parse the document, then build
    /// a fresh driver over it (§4.F steps 1-3).
    pub fn from_ciphertext(ciphertext: &[u8], id32: [u8; 32]) -> Result<Self, RecoveryFailure> {
        let document = decode_recovery_document(ciphertext, &id32)?;
        Ok(Self::from_document(document, id32))
    }

    pub fn from_document(document: RecoveryDocument, id32: [u8; 32]) -> Self {
        let challenges = document
            .escrow_methods
            .iter()
            .map(|m| ChallengeDetails {
                uuid: m.uuid,
                method_type: MethodType::from(m.escrow_type.as_str()),
                provider_url: m.url.clone(),
                instructions: m.instructions.clone(),
                solved: false,
                is_async: false,
            })
            .collect();

        let escrow = document.escrow_methods.into_iter().map(|m| (m.uuid, m)).collect();

        let policies = document
            .policies
            .into_iter()
            .map(|p| DecryptionPolicyState { master_key: p.master_key, salt: p.salt, uuids: p.uuids })
            .collect();

        Self {
            id32,
            secret_name: document.secret_name,
            encrypted_core_secret: document.encrypted_core_secret,
            challenges,
            escrow,
            policies,
            solved_shares: HashMap::new(),
            fired: false,
        }
    }

    /// rebuild a driver from its already-decoded pieces, without
    /// re-running the decrypt/inflate/parse pipeline. used by callers
    /// that persist a session's recovery state as plain JSON between
    /// actions (the reducer has no other place to keep a live driver
    /// alive across separate process invocations) and need to resume
    /// it exactly where it left off, solved shares included.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id32: [u8; 32],
        secret_name: Option<String>,
        encrypted_core_secret: Vec<u8>,
        escrow_methods: Vec<EscrowMethod>,
        policies: Vec<DocumentPolicy>,
        solved_shares: HashMap<[u8; 16], [u8; 32]>,
    ) -> Self {
        let challenges = escrow_methods
            .iter()
            .map(|m| ChallengeDetails {
                uuid: m.uuid,
                method_type: MethodType::from(m.escrow_type.as_str()),
                provider_url: m.url.clone(),
                instructions: m.instructions.clone(),
                solved: solved_shares.contains_key(&m.uuid),
                is_async: false,
            })
            .collect();
        let escrow = escrow_methods.into_iter().map(|m| (m.uuid, m)).collect();
        let policies = policies
            .into_iter()
            .map(|p| DecryptionPolicyState { master_key: p.master_key, salt: p.salt, uuids: p.uuids })
            .collect();

        Self {
            id32,
            secret_name,
            encrypted_core_secret,
            challenges,
            escrow,
            policies,
            solved_shares,
            fired: false,
        }
    }

    pub fn id32(&self) -> &[u8; 32] {
        &self.id32
    }

    pub fn challenges(&self) -> &[ChallengeDetails] {
        &self.challenges
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.secret_name.as_deref()
    }

    pub fn encrypted_core_secret(&self) -> &[u8] {
        &self.encrypted_core_secret
    }

    pub fn escrow_methods(&self) -> Vec<EscrowMethod> {
        self.escrow.values().cloned().collect()
    }

    pub fn policies(&self) -> Vec<DocumentPolicy> {
        self.policies
            .iter()
            .map(|p| DocumentPolicy { master_key: p.master_key.clone(), salt: p.salt, uuids: p.uuids.clone() })
            .collect()
    }

    pub fn solved_shares(&self) -> &HashMap<[u8; 16], [u8; 32]> {
        &self.solved_shares
    }

    pub(crate) fn escrow_method(&self, uuid: &[u8; 16]) -> Option<&EscrowMethod> {
        self.escrow.get(uuid)
    }

    pub(crate) fn challenge_index(&self, uuid: &[u8; 16]) -> Option<usize> {
        self.challenges.iter().position(|c| &c.uuid == uuid)
    }

    pub(crate) fn mark_challenge(&mut self, uuid: &[u8; 16], solved: bool, is_async: bool) {
        if let Some(idx) = self.challenge_index(uuid) {
            self.challenges[idx].solved = solved;
            if is_async {
                self.challenges[idx].is_async = true;
            }
        }
    }

    /// record a newly-recovered key share and, if it completes some
    /// policy's full truth set, reassemble the master key and decrypt
    /// the core secret. fires at most once across the driver's
    /// lifetime (§4.F step 5).
    pub fn record_key_share(&mut self, uuid: [u8; 16], key_share: [u8; 32]) -> Option<CoreSecretRecovered> {
        if self.fired {
            return None;
        }
        self.mark_challenge(&uuid, true, false);
        self.solved_shares.insert(uuid, key_share);

        for policy in &self.policies {
            if !policy.uuids.iter().all(|u| self.solved_shares.contains_key(u)) {
                continue;
            }
            let shares: Vec<[u8; 32]> = policy.uuids.iter().map(|u| self.solved_shares[u]).collect();
            let policy_key = anastasis_crypto::derive_policy_key(&shares, &policy.salt);
            if let Ok(core_secret) =
                anastasis_crypto::recover_core_secret(&policy.master_key, &policy_key, &self.encrypted_core_secret)
            {
                self.fired = true;
                return Some(CoreSecretRecovered { secret_name: self.secret_name.clone(), core_secret });
            }
        }
        None
    }

    /// cancel outstanding challenge operations and permanently
    /// suppress the core-secret callback (§5 cancellation, §8
    /// property 9).
    pub fn abort(&mut self) {
        self.fired = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anastasis_types::DocumentPolicy;

    fn document_with_one_policy(uuids: Vec<[u8; 16]>, policy_key: [u8; 32], core_secret: &[u8]) -> RecoveryDocument {
        let salt = [9u8; 32];
        let enc = anastasis_crypto::encrypt_core_secret(&[policy_key], core_secret).unwrap();
        RecoveryDocument {
            secret_name: Some("wallet".into()),
            policies: vec![DocumentPolicy { master_key: enc.encrypted_master_keys[0].clone(), salt, uuids }],
            escrow_methods: vec![],
            encrypted_core_secret: enc.encrypted_core_secret,
        }
    }

    #[test]
    fn fires_once_all_policy_shares_are_recorded() {
        let shares = [[1u8; 32], [2u8; 32]];
        let uuids = vec![[1u8; 16], [2u8; 16]];
        let policy_key = anastasis_crypto::derive_policy_key(&shares, &[9u8; 32]);
        let doc = document_with_one_policy(uuids.clone(), policy_key, b"core secret bytes");

        let mut driver = RecoveryDriver::from_document(doc, [0u8; 32]);
        assert!(driver.record_key_share(uuids[0], shares[0]).is_none());
        let recovered = driver.record_key_share(uuids[1], shares[1]).unwrap();
        assert_eq!(recovered.core_secret, b"core secret bytes");

        // firing again, even with a fresh share, must not re-fire.
        assert!(driver.record_key_share([3u8; 16], [3u8; 32]).is_none());
    }

    #[test]
    fn abort_suppresses_future_firing() {
        let shares = [[1u8; 32]];
        let uuids = vec![[1u8; 16]];
        let policy_key = anastasis_crypto::derive_policy_key(&shares, &[9u8; 32]);
        let doc = document_with_one_policy(uuids.clone(), policy_key, b"secret");

        let mut driver = RecoveryDriver::from_document(doc, [0u8; 32]);
        driver.abort();
        assert!(driver.record_key_share(uuids[0], shares[0]).is_none());
    }
}
