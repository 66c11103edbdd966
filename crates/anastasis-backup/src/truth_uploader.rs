//! truth uploader: §4.D. generates a [`Truth`]'s local random
//! material and ciphertexts once, then uploads it (possibly more than
//! once, across a payment retry) without regenerating anything.

use crate::error::{Error, Result};
use anastasis_types::{MethodType, PaymentSecret, Truth};
use rand::RngCore;

/// the provider client's outcome for one truth POST, translated into
/// the four-way result of §4.D step 5.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Success,
    PaymentRequired { pay_uri: String, payment_secret: PaymentSecret },
    Conflict,
    ServerFailure { http_status: u16 },
}

/// build a truth's local material: uuid, keys, question salt (if
/// applicable), and both ciphertexts. pure; does no I/O (§4.D steps
/// 1-3).
pub fn build_truth(
    provider_url: &str,
    method_type: MethodType,
    instructions: String,
    challenge_datum: &[u8],
    provider_salt: [u8; 32],
    id32: &[u8; 32],
    answer: Option<&str>,
) -> Result<Truth> {
    let mut rng = rand::thread_rng();

    let mut uuid = [0u8; 16];
    rng.fill_bytes(&mut uuid);
    let mut truth_key = [0u8; 32];
    rng.fill_bytes(&mut truth_key);
    let mut nonce = [0u8; 12];
    rng.fill_bytes(&mut nonce);
    let mut key_share = [0u8; 32];
    rng.fill_bytes(&mut key_share);

    let question_salt = if method_type == MethodType::Question {
        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);
        Some(salt)
    } else {
        None
    };

    // replace the raw answer with its hash before it ever touches the
    // key-share encryption (§4.D step 2).
    let hashed_answer = match (&question_salt, answer) {
        (Some(salt), Some(answer)) => Some(anastasis_crypto::hash_security_answer(answer, &uuid, salt)),
        _ => None,
    };

    let encrypted_truth_datum =
        anastasis_crypto::encrypt_truth_datum(&nonce, &truth_key, challenge_datum).map_err(Error::Crypto)?;
    let encrypted_key_share =
        anastasis_crypto::encrypt_key_share(&key_share, id32, hashed_answer.as_ref()).map_err(Error::Crypto)?;

    Ok(Truth {
        uuid,
        provider_url: provider_url.to_string(),
        method_type,
        instructions,
        truth_key,
        question_salt,
        provider_salt,
        nonce,
        key_share,
        encrypted_truth_datum,
        encrypted_key_share,
    })
}

/// the on-wire body of a truth POST (§6).
#[derive(Debug, serde::Serialize)]
struct TruthUploadBody<'a> {
    keyshare_data: &'a [u8],
    #[serde(rename = "type")]
    method_type: &'a str,
    encrypted_truth: &'a [u8],
    truth_mime: Option<&'a str>,
    storage_duration_years: u32,
}

/// upload `truth` to its provider. callers retry with the same
/// `truth` (unchanged) and a `payment_secret` harvested from a prior
/// `PaymentRequired` outcome (§4.D).
pub async fn upload_truth(
    client: &anastasis_client::ProviderClient,
    truth: &Truth,
    truth_mime: Option<&str>,
    storage_duration_years: u32,
    payment_secret: Option<&PaymentSecret>,
) -> UploadOutcome {
    let body = TruthUploadBody {
        keyshare_data: &truth.encrypted_key_share,
        method_type: truth.method_type.as_str(),
        encrypted_truth: &truth.encrypted_truth_datum,
        truth_mime,
        storage_duration_years,
    };
    let body_bytes = serde_json::to_vec(&body).expect("truth upload body always serializes");
    let uuid_hex = hex::encode(truth.uuid);

    match client
        .post_truth(&truth.provider_url, &uuid_hex, body_bytes, payment_secret)
        .await
    {
        anastasis_client::TruthPostResult::Ok => UploadOutcome::Success,
        anastasis_client::TruthPostResult::PaymentRequired { pay_uri, payment_secret } => {
            UploadOutcome::PaymentRequired { pay_uri, payment_secret }
        }
        anastasis_client::TruthPostResult::Conflict => UploadOutcome::Conflict,
        anastasis_client::TruthPostResult::TooLarge => UploadOutcome::ServerFailure { http_status: 413 },
        anastasis_client::TruthPostResult::ServerError { http_status } => {
            UploadOutcome::ServerFailure { http_status }
        }
        anastasis_client::TruthPostResult::TransportError(_) => UploadOutcome::ServerFailure { http_status: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_truth_for_question_type_includes_salt_and_hashed_answer() {
        let truth = build_truth(
            "https://provider.example",
            MethodType::Question,
            "what is your pet's name?".into(),
            b"favourite pet name",
            [1; 32],
            &[2; 32],
            Some("The5Color!"),
        )
        .unwrap();
        assert!(truth.question_salt.is_some());
        assert!(!truth.encrypted_key_share.is_empty());
        assert!(!truth.encrypted_truth_datum.is_empty());
    }

    #[test]
    fn build_truth_for_non_question_type_has_no_salt() {
        let truth = build_truth(
            "https://provider.example",
            MethodType::Sms,
            "enter the code we texted you".into(),
            b"+15551234567",
            [1; 32],
            &[2; 32],
            None,
        )
        .unwrap();
        assert!(truth.question_salt.is_none());
    }
}
