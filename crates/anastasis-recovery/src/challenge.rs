//! challenge runner: §4.G. drives one challenge through its state
//! machine by issuing the provider GET and translating the typed
//! response into the next state, updating the owning driver's
//! solved-share bookkeeping on success.

use crate::driver::{CoreSecretRecovered, RecoveryDriver};
use anastasis_types::{ChallengeKind, PaymentSecret};

/// the caller-supplied answer to one challenge, matching the three
/// entry rules of §4.G.
#[derive(Debug, Clone)]
pub enum ChallengeAnswer {
    /// `question` type: hashed with the truth's own salt.
    Text(String),
    /// numeric-code types (sms, totp): hashed without a salt.
    Numeric(u64),
}

/// one challenge's current position in the state diagram of §4.G.
#[derive(Debug, Clone)]
pub enum ChallengeState {
    Unstarted,
    Pending,
    Solved,
    PaymentRequired { pay_uri: String, payment_secret: PaymentSecret },
    AwaitExternal { answer_code: Option<u64> },
    AwaitRedirect { location: String },
    NeedUserInput { body: Vec<u8>, mime: Option<String> },
    FailedRateLimited,
    FailedAsync,
    FailedUnknownTruth,
    FailedInvalidAnswer,
    FailedServerError { http_status: u16 },
}

/// the outcome of one GET `/truth`: the challenge's new state, and
/// the reassembled core secret if this was the share that completed
/// a policy.
pub struct ChallengeStep {
    pub state: ChallengeState,
    pub recovered: Option<CoreSecretRecovered>,
}

fn response_material(
    kind: ChallengeKind,
    answer: Option<&ChallengeAnswer>,
    uuid: &[u8; 16],
    question_salt: Option<&[u8; 32]>,
) -> Option<([u8; 32], bool)> {
    match (kind, answer) {
        (ChallengeKind::Question, Some(ChallengeAnswer::Text(text))) => {
            let salt = question_salt?;
            Some((anastasis_crypto::hash_security_answer(text, uuid, salt), true))
        }
        (ChallengeKind::Numeric, Some(ChallengeAnswer::Numeric(code))) => {
            Some((anastasis_crypto::hash_numeric_answer(*code), false))
        }
        (ChallengeKind::Opaque, None) => None,
        _ => None,
    }
}

/// issue GET `/truth` for `uuid`, with `answer` supplied per the
/// entry rules that `uuid`'s method type demands (§4.G). `payment_secret`
/// replays a previously-received payment identifier after a
/// `PaymentRequired` state.
pub async fn start_challenge(
    driver: &mut RecoveryDriver,
    client: &anastasis_client::ProviderClient,
    uuid: [u8; 16],
    answer: Option<ChallengeAnswer>,
    payment_secret: Option<&PaymentSecret>,
    timeout_ms: u64,
) -> ChallengeStep {
    run_challenge(driver, client, uuid, answer.as_ref(), payment_secret, timeout_ms).await
}

/// re-issue GET `/truth` for an async challenge using its recorded
/// answer pin; no new answer is supplied (§4.G `poll`).
pub async fn poll_challenge(
    driver: &mut RecoveryDriver,
    client: &anastasis_client::ProviderClient,
    uuid: [u8; 16],
    pin: Option<u64>,
    timeout_ms: u64,
) -> ChallengeStep {
    let answer = pin.map(ChallengeAnswer::Numeric);
    run_challenge(driver, client, uuid, answer.as_ref(), None, timeout_ms).await
}

async fn run_challenge(
    driver: &mut RecoveryDriver,
    client: &anastasis_client::ProviderClient,
    uuid: [u8; 16],
    answer: Option<&ChallengeAnswer>,
    payment_secret: Option<&PaymentSecret>,
    timeout_ms: u64,
) -> ChallengeStep {
    let Some(escrow) = driver.escrow_method(&uuid).cloned() else {
        return ChallengeStep { state: ChallengeState::FailedUnknownTruth, recovered: None };
    };
    let method_type = anastasis_types::MethodType::from(escrow.escrow_type.as_str());
    let kind = method_type.kind();

    let material = response_material(kind, answer, &uuid, Some(&escrow.truth_salt));
    let response_hash = material.map(|(h, _)| h);
    let key_share_answer = material.and_then(|(h, is_question)| is_question.then_some(h));

    let uuid_hex = hex::encode(uuid);
    let result = client
        .get_truth(&escrow.url, &uuid_hex, &escrow.truth_key, response_hash.as_ref(), payment_secret, timeout_ms)
        .await;

    match result {
        anastasis_client::TruthGetResult::Ok { encrypted_key_share } => {
            match anastasis_crypto::decrypt_key_share(&encrypted_key_share, driver.id32(), key_share_answer.as_ref()) {
                Ok(key_share) => {
                    let recovered = driver.record_key_share(uuid, key_share);
                    ChallengeStep { state: ChallengeState::Solved, recovered }
                }
                Err(_) => ChallengeStep { state: ChallengeState::FailedInvalidAnswer, recovered: None },
            }
        }
        anastasis_client::TruthGetResult::ExternalInstructions(json) => {
            driver.mark_challenge(&uuid, false, true);
            let answer_code = json.get("answer_code").and_then(|v| v.as_u64());
            ChallengeStep { state: ChallengeState::AwaitExternal { answer_code }, recovered: None }
        }
        anastasis_client::TruthGetResult::Redirect(location) => {
            ChallengeStep { state: ChallengeState::AwaitRedirect { location }, recovered: None }
        }
        anastasis_client::TruthGetResult::PaymentRequired { pay_uri, payment_secret } => {
            ChallengeStep { state: ChallengeState::PaymentRequired { pay_uri, payment_secret }, recovered: None }
        }
        anastasis_client::TruthGetResult::ChallengeInstructions { body, mime, .. } => {
            ChallengeStep { state: ChallengeState::NeedUserInput { body, mime }, recovered: None }
        }
        anastasis_client::TruthGetResult::UnknownTruth => {
            ChallengeStep { state: ChallengeState::FailedUnknownTruth, recovered: None }
        }
        anastasis_client::TruthGetResult::AuthTimeout => {
            ChallengeStep { state: ChallengeState::FailedAsync, recovered: None }
        }
        anastasis_client::TruthGetResult::RateLimited => {
            ChallengeStep { state: ChallengeState::FailedRateLimited, recovered: None }
        }
        anastasis_client::TruthGetResult::PreconditionFailed => {
            ChallengeStep { state: ChallengeState::FailedServerError { http_status: 417 }, recovered: None }
        }
        anastasis_client::TruthGetResult::ServerError { http_status } => {
            ChallengeStep { state: ChallengeState::FailedServerError { http_status }, recovered: None }
        }
        anastasis_client::TruthGetResult::TransportError(_) => {
            ChallengeStep { state: ChallengeState::FailedServerError { http_status: 0 }, recovered: None }
        }
    }
}
