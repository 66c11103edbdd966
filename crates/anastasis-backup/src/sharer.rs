//! secret sharer: §4.E. builds one recovery document from every
//! candidate policy, then uploads an identical copy (encrypted afresh
//! per provider, since each provider sees a different user
//! identifier) to every provider appearing in any policy.

use crate::error::{Error, Result};
use anastasis_types::{
    DocumentPolicy, EscrowMethod, PaymentSecret, PolicyCandidate, RecoveryDocument, Truth,
};
use rand::RngCore;
use std::collections::HashMap;
use std::io::Write;

/// build the plaintext recovery document: one [`DocumentPolicy`] per
/// candidate policy and one deduplicated [`EscrowMethod`] per
/// distinct truth uuid (§4.E step 2).
///
/// `truths` is keyed by `(authentication_method index, provider url)`
/// since the same chosen method may be uploaded to different
/// providers across different candidate policies.
pub fn build_recovery_document(
    policies: &[PolicyCandidate],
    truths: &HashMap<(usize, String), Truth>,
    secret_name: Option<String>,
    core_secret: &[u8],
) -> Result<RecoveryDocument> {
    let mut rng = rand::thread_rng();

    let mut document_policies = Vec::with_capacity(policies.len());
    let mut policy_keys = Vec::with_capacity(policies.len());
    let mut escrow_methods: HashMap<[u8; 16], EscrowMethod> = HashMap::new();

    for policy in policies {
        let mut shares = Vec::with_capacity(policy.methods.len());
        let mut uuids = Vec::with_capacity(policy.methods.len());

        for method in &policy.methods {
            let truth = truths
                .get(&(method.authentication_method, method.provider.clone()))
                .ok_or(Error::MethodNotSupported)?;
            shares.push(truth.key_share);
            uuids.push(truth.uuid);

            escrow_methods.entry(truth.uuid).or_insert_with(|| EscrowMethod {
                uuid: truth.uuid,
                url: truth.provider_url.clone(),
                instructions: truth.instructions.clone(),
                truth_key: truth.truth_key,
                truth_salt: truth.question_salt.unwrap_or([0; 32]),
                provider_salt: truth.provider_salt,
                escrow_type: truth.method_type.as_str().to_string(),
            });
        }

        let mut policy_salt = [0u8; 32];
        rng.fill_bytes(&mut policy_salt);
        let policy_key = anastasis_crypto::derive_policy_key(&shares, &policy_salt);
        policy_keys.push(policy_key);

        document_policies.push((policy_salt, uuids));
    }

    let encryption = anastasis_crypto::encrypt_core_secret(&policy_keys, core_secret).map_err(Error::Crypto)?;

    let policies = document_policies
        .into_iter()
        .zip(encryption.encrypted_master_keys)
        .map(|((salt, uuids), master_key)| DocumentPolicy { master_key, salt, uuids })
        .collect();

    Ok(RecoveryDocument {
        secret_name,
        policies,
        escrow_methods: escrow_methods.into_values().collect(),
        encrypted_core_secret: encryption.encrypted_core_secret,
    })
}

/// length-prefix (4-byte BE uncompressed length) and raw-deflate the
/// document JSON, ahead of per-provider AEAD (§3, §6).
fn frame_document(document: &RecoveryDocument) -> Vec<u8> {
    let json = serde_json::to_vec(document).expect("recovery document always serializes");

    let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&json).expect("in-memory deflate never fails");
    let compressed = encoder.finish().expect("in-memory deflate never fails");

    let mut framed = Vec::with_capacity(4 + compressed.len());
    framed.extend_from_slice(&(json.len() as u32).to_be_bytes());
    framed.extend_from_slice(&compressed);
    framed
}

/// one provider's outcome from uploading the recovery document.
#[derive(Debug, Clone)]
enum ProviderShareOutcome {
    Ok { url: String, version: u32, expiration: u64 },
    PaymentRequired { url: String, pay_uri: String, payment_secret: PaymentSecret },
    Failed { url: String, http_status: u16 },
}

/// the aggregated outcome of one share round, per §4.E step 6.
#[derive(Debug, Clone)]
pub enum ShareResult {
    Success { providers: Vec<(String, u32, u64)> },
    PaymentRequired { payment_requests: Vec<(String, String, PaymentSecret)> },
    ProviderFailed { url: String, http_status: u16 },
}

async fn share_to_provider(
    client: &anastasis_client::ProviderClient,
    provider_url: &str,
    framed_plaintext: &[u8],
    id32: &[u8; 32],
    payment_secret: Option<&PaymentSecret>,
) -> ProviderShareOutcome {
    let ciphertext = match anastasis_crypto::encrypt_recovery_document(id32, framed_plaintext) {
        Ok(c) => c,
        Err(_) => return ProviderShareOutcome::Failed { url: provider_url.to_string(), http_status: 0 },
    };

    let account = match anastasis_crypto::AccountKeypair::derive(id32) {
        Ok(a) => a,
        Err(_) => return ProviderShareOutcome::Failed { url: provider_url.to_string(), http_status: 0 },
    };
    let account_pub_hex = hex::encode(account.public_key_bytes());
    let upload_hash = {
        let mut hasher = <sha2::Sha256 as sha2::Digest>::new();
        sha2::Digest::update(&mut hasher, &ciphertext);
        sha2::Digest::finalize(hasher)
    };
    let signature = account.sign(&upload_hash);

    match client
        .post_policy(
            provider_url,
            &account_pub_hex,
            ciphertext,
            &signature.to_bytes(),
            &hex::encode(upload_hash),
            payment_secret,
        )
        .await
    {
        anastasis_client::PolicyPostResult::Ok { version, expiration } => {
            ProviderShareOutcome::Ok { url: provider_url.to_string(), version, expiration }
        }
        anastasis_client::PolicyPostResult::Unchanged => {
            ProviderShareOutcome::Ok { url: provider_url.to_string(), version: 0, expiration: 0 }
        }
        anastasis_client::PolicyPostResult::PaymentRequired { pay_uri, payment_secret } => {
            ProviderShareOutcome::PaymentRequired { url: provider_url.to_string(), pay_uri, payment_secret }
        }
        anastasis_client::PolicyPostResult::TooLarge => {
            ProviderShareOutcome::Failed { url: provider_url.to_string(), http_status: 413 }
        }
        anastasis_client::PolicyPostResult::ServerError { http_status } => {
            ProviderShareOutcome::Failed { url: provider_url.to_string(), http_status }
        }
        anastasis_client::PolicyPostResult::TransportError(_) => {
            ProviderShareOutcome::Failed { url: provider_url.to_string(), http_status: 0 }
        }
    }
}

/// upload `document` to every entry of `providers` in parallel and
/// aggregate into one [`ShareResult`] (§4.E steps 4-7).
///
/// `providers` maps each selected provider's url to its per-provider
/// user identifier; `payment_secrets` carries any previously-received
/// payment identifiers, replayed to claim a paid write.
pub async fn share_recovery_document(
    client: &anastasis_client::ProviderClient,
    document: &RecoveryDocument,
    providers: &[(String, [u8; 32])],
    payment_secrets: &HashMap<String, PaymentSecret>,
) -> ShareResult {
    let framed = frame_document(document);

    let outcomes = futures::future::join_all(providers.iter().map(|(url, id32)| {
        let framed = &framed;
        let payment_secret = payment_secrets.get(url);
        async move { share_to_provider(client, url, framed, id32, payment_secret).await }
    }))
    .await;

    if let Some(failed) = outcomes.iter().find_map(|o| match o {
        ProviderShareOutcome::Failed { url, http_status } => Some((url.clone(), *http_status)),
        _ => None,
    }) {
        return ShareResult::ProviderFailed { url: failed.0, http_status: failed.1 };
    }

    let payment_requests: Vec<(String, String, PaymentSecret)> = outcomes
        .iter()
        .filter_map(|o| match o {
            ProviderShareOutcome::PaymentRequired { url, pay_uri, payment_secret } => {
                Some((url.clone(), pay_uri.clone(), *payment_secret))
            }
            _ => None,
        })
        .collect();

    if !payment_requests.is_empty() {
        return ShareResult::PaymentRequired { payment_requests };
    }

    let providers_ok = outcomes
        .into_iter()
        .filter_map(|o| match o {
            ProviderShareOutcome::Ok { url, version, expiration } => Some((url, version, expiration)),
            _ => None,
        })
        .collect();
    ShareResult::Success { providers: providers_ok }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anastasis_types::{MethodType, PolicyMethod};

    fn truth(uuid: u8, provider_url: &str, method_type: MethodType) -> Truth {
        Truth {
            uuid: [uuid; 16],
            provider_url: provider_url.to_string(),
            method_type,
            instructions: "answer the question".into(),
            truth_key: [1; 32],
            question_salt: Some([2; 32]),
            provider_salt: [3; 32],
            nonce: [4; 12],
            key_share: [uuid; 32],
            encrypted_truth_datum: vec![5, 6, 7],
            encrypted_key_share: vec![8, 9, 10],
        }
    }

    #[test]
    fn builds_one_document_policy_per_candidate_and_dedupes_escrow_methods() {
        let t1 = truth(1, "https://a", MethodType::Question);
        let t2 = truth(2, "https://b", MethodType::Email);
        let mut truths = HashMap::new();
        truths.insert((0usize, "https://a".to_string()), t1);
        truths.insert((1usize, "https://b".to_string()), t2);

        let policies = vec![PolicyCandidate {
            methods: vec![
                PolicyMethod { authentication_method: 0, provider: "https://a".into() },
                PolicyMethod { authentication_method: 1, provider: "https://b".into() },
            ],
        }];

        let doc = build_recovery_document(&policies, &truths, Some("wallet".into()), b"core secret").unwrap();
        assert_eq!(doc.policies.len(), 1);
        assert_eq!(doc.policies[0].uuids.len(), 2);
        assert_eq!(doc.escrow_methods.len(), 2);
    }

    #[test]
    fn frame_document_round_trips_through_inflate() {
        let doc = RecoveryDocument {
            secret_name: None,
            policies: vec![],
            escrow_methods: vec![],
            encrypted_core_secret: vec![1, 2, 3],
        };
        let framed = frame_document(&doc);
        let len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;

        let mut decoder = flate2::read::DeflateDecoder::new(&framed[4..]);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out.len(), len);
        let back: RecoveryDocument = serde_json::from_slice(&out).unwrap();
        assert_eq!(back.encrypted_core_secret, doc.encrypted_core_secret);
    }
}
