//! recovery-mode handlers (§4.I recovery state sequence).

use crate::context::ReducerContext;
use crate::countries;
use crate::state::{
    get_arg, get_arg_opt, get_state_field, get_state_field_or, recovery_state_tag, set_recovery_state,
    set_state_field, RecoveryState,
};
use anastasis_recovery::{ChallengeAnswer, ChallengeState as RunnerState, RecoveryDriver};
use anastasis_types::identity::{canonical_bytes, IdentityAttributes};
use anastasis_types::{ErrorCode, PaymentSecret, ReducerError};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// public face of one challenge, as persisted into reducer state for
/// the UI to list in `CHALLENGE_SELECTING` (§4.F step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub uuid_hex: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub provider_url: String,
    pub instructions: String,
    pub solved: bool,
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// the one challenge the UI is actively driving, along with anything
/// the runner needs to resume it without re-deriving key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelectedChallenge {
    uuid_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pay_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer_pin: Option<u64>,
}

/// the outcome surfaced through the core-secret callback of §4.F,
/// persisted as `recovery_result` once `RECOVERY_FINISHED` is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_secret_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

pub async fn dispatch(ctx: &ReducerContext, state: &mut Map<String, Value>, action: &str, args: &Value) -> Result<(), ReducerError> {
    let tag = recovery_state_tag(state)?;
    match (tag, action) {
        (RecoveryState::ContinentSelecting, "select_continent") => select_continent(state, args),
        (RecoveryState::CountrySelecting, "select_country") => select_country(state, args),
        (RecoveryState::UserAttributesCollecting, "enter_user_attributes") => {
            enter_user_attributes(ctx, state, args).await
        }
        (RecoveryState::SecretSelecting, "change_version") => change_version(ctx, state, args).await,
        (RecoveryState::SecretSelecting, "next") => done_secret_selecting(state),
        (RecoveryState::ChallengeSelecting, "select_challenge") => select_challenge(ctx, state, args).await,
        (RecoveryState::ChallengeSelecting, "poll") => poll_challenges(ctx, state).await,
        (RecoveryState::ChallengePaying, "pay") => pay_challenge(ctx, state, args).await,
        (RecoveryState::ChallengeSolving, "solve_challenge") => solve_challenge(ctx, state, args).await,
        _ => Err(ReducerError::new(
            ErrorCode::ReducerActionInvalid,
            format!("action {action:?} is not defined for recovery state {}", tag.as_str()),
        )),
    }
}

fn select_continent(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let continent: String = get_arg(args, "continent")?;
    if !countries::continents().contains(&continent.as_str()) {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown continent {continent:?}")));
    }
    set_state_field(state, "continent", continent);
    set_recovery_state(state, RecoveryState::CountrySelecting);
    Ok(())
}

fn select_country(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let country_code: String = get_arg(args, "country_code")?;
    let required = countries::required_attributes(&country_code)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown country code {country_code:?}")))?;
    set_state_field(state, "country_code", country_code);
    // §3: the country's identity-attribute schema, surfaced for the
    // UI the same way the backup flow does (handlers/backup.rs).
    set_state_field(state, "required_attributes", required);
    set_recovery_state(state, RecoveryState::UserAttributesCollecting);
    Ok(())
}

/// every state past attribute entry supports `add_provider` (§4.I);
/// in recovery, the live provider is the one whose `/policy` is
/// downloaded, so after the first attribute entry we default the
/// download provider to the first one added, but never reselect it
/// silently on a later `add_provider`.
pub async fn add_provider(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let provider_url: String = get_arg(args, "provider_url")?;
    ctx.catalog.get(&provider_url).await;

    let mut providers: Vec<String> = get_state_field_or(state, "providers", Vec::new());
    if !providers.contains(&provider_url) {
        providers.push(provider_url);
    }
    set_state_field(state, "providers", providers);
    Ok(())
}

async fn enter_user_attributes(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let attrs: IdentityAttributes = get_arg(args, "identity_attributes")?;
    if attrs.is_empty() {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, "identity_attributes must not be empty"));
    }

    let country_code: String = get_state_field(state, "country_code")?;
    let required = countries::required_attributes(&country_code)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("country_code {country_code:?} has no known attribute schema")))?;
    for spec in required {
        if !spec.optional && !attrs.contains_key(spec.name) {
            return Err(ReducerError::new(
                ErrorCode::ReducerInputInvalid,
                format!("identity_attributes is missing required field {:?} ({})", spec.name, spec.label),
            ));
        }
    }

    set_state_field(state, "identity_attributes", attrs.clone());

    let providers: Vec<String> = get_state_field_or(state, "providers", Vec::new());
    let provider_url = providers
        .into_iter()
        .next()
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, "at least one provider must be added via add_provider first"))?;

    set_state_field(state, "selected_provider", provider_url.clone());
    set_recovery_state(state, RecoveryState::SecretSelecting);
    download_policy(ctx, state, &provider_url, None).await
}

/// download `/policy` from `provider_url`, decrypt, parse, and
/// materialize it into a fresh [`RecoveryDriver`], or surface one of
/// the failure modes of §4.F step (delivered through `recovery_result`
/// exactly like the terminal callback, but without advancing the
/// state tag — the caller stays in `SECRET_SELECTING` to retry).
async fn download_policy(
    ctx: &ReducerContext,
    state: &mut Map<String, Value>,
    provider_url: &str,
    version: Option<u32>,
) -> Result<(), ReducerError> {
    let attrs: IdentityAttributes = get_state_field(state, "identity_attributes")?;

    let config = match ctx.catalog.get(provider_url).await {
        anastasis_types::CatalogEntry::Ok(config) => config,
        _ => return Err(ReducerError::new(ErrorCode::NetworkFailed, format!("provider {provider_url:?} is offline or misconfigured"))),
    };

    let id32 = anastasis_crypto::derive_user_identifier(&canonical_bytes(&attrs), &config.salt)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;
    let account = anastasis_crypto::AccountKeypair::derive(&id32)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;
    let account_pub_hex = hex::encode(account.public_key_bytes());

    match ctx.client.get_policy(provider_url, &account_pub_hex, version, 0).await {
        anastasis_client::PolicyGetResult::Ok { body, version, .. } => {
            match RecoveryDriver::from_ciphertext(&body, id32) {
                Ok(driver) => {
                    set_state_field(state, "policy_version", version);
                    store_driver(state, &driver);
                    Ok(())
                }
                Err(failure) => Err(ReducerError::new(failure.code(), failure.to_string())),
            }
        }
        anastasis_client::PolicyGetResult::NotModified => Ok(()),
        anastasis_client::PolicyGetResult::UnknownAccount => {
            Err(ReducerError::new(ErrorCode::PolicyUnknown, "no recovery document exists for this account"))
        }
        anastasis_client::PolicyGetResult::Gone => {
            Err(ReducerError::new(ErrorCode::PolicyGone, "recovery document has expired at this provider"))
        }
        anastasis_client::PolicyGetResult::ServerError { http_status } => {
            Err(ReducerError::new(ErrorCode::PolicyLookupFailed, format!("provider returned http {http_status}")))
        }
        anastasis_client::PolicyGetResult::TransportError(e) => Err(ReducerError::new(ErrorCode::NetworkFailed, e)),
    }
}

/// wire shape of a [`DocumentPolicy`](anastasis_types::DocumentPolicy), hex-encoded for JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyState {
    master_key_hex: String,
    salt_hex: String,
    uuids_hex: Vec<String>,
}

/// wire shape of an [`EscrowMethod`](anastasis_types::EscrowMethod), hex-encoded for JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EscrowMethodState {
    uuid_hex: String,
    url: String,
    instructions: String,
    truth_key_hex: String,
    truth_salt_hex: String,
    provider_salt_hex: String,
    escrow_type: String,
}

/// the full set of fields needed to rebuild a [`RecoveryDriver`]
/// without redownloading or redecrypting the recovery document.
/// persisted into reducer state since every recovery action is a
/// fresh process invocation and there is nowhere else to keep the
/// driver alive in between (§4.F, §4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DriverState {
    id32_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_name: Option<String>,
    encrypted_core_secret_b64: String,
    escrow_methods: Vec<EscrowMethodState>,
    policies: Vec<PolicyState>,
    solved_shares: Vec<(String, String)>,
}

fn hex32(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}

fn parse_hex32(s: &str, field: &str) -> Result<[u8; 32], ReducerError> {
    let bytes = hex::decode(s).map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("{field} is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("{field} must be 32 bytes")))
}

fn parse_hex16(s: &str, field: &str) -> Result<[u8; 16], ReducerError> {
    let bytes = hex::decode(s).map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("{field} is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("{field} must be 16 bytes")))
}

/// persist everything a [`RecoveryDriver`] knows, including the
/// challenge summaries the UI reads directly, so the next action's
/// [`load_driver`] can resume the exact same driver (§4.F serialization
/// note).
fn store_driver(state: &mut Map<String, Value>, driver: &RecoveryDriver) {
    let challenges: Vec<ChallengeSummary> = driver
        .challenges()
        .iter()
        .map(|c| ChallengeSummary {
            uuid_hex: hex::encode(c.uuid),
            method_type: c.method_type.to_string(),
            provider_url: c.provider_url.clone(),
            instructions: c.instructions.clone(),
            solved: c.solved,
            is_async: c.is_async,
        })
        .collect();
    set_state_field(state, "challenges", challenges);

    let driver_state = DriverState {
        id32_hex: hex32(driver.id32()),
        secret_name: driver.secret_name().map(str::to_string),
        encrypted_core_secret_b64: base64::engine::general_purpose::STANDARD.encode(driver.encrypted_core_secret()),
        escrow_methods: driver
            .escrow_methods()
            .into_iter()
            .map(|m| EscrowMethodState {
                uuid_hex: hex::encode(m.uuid),
                url: m.url,
                instructions: m.instructions,
                truth_key_hex: hex32(&m.truth_key),
                truth_salt_hex: hex32(&m.truth_salt),
                provider_salt_hex: hex32(&m.provider_salt),
                escrow_type: m.escrow_type,
            })
            .collect(),
        policies: driver
            .policies()
            .into_iter()
            .map(|p| PolicyState {
                master_key_hex: hex::encode(p.master_key),
                salt_hex: hex32(&p.salt),
                uuids_hex: p.uuids.iter().map(hex::encode).collect(),
            })
            .collect(),
        solved_shares: driver.solved_shares().iter().map(|(u, s)| (hex::encode(u), hex32(s))).collect(),
    };
    set_state_field(state, "recovery_driver", driver_state);
}

/// rebuild the live [`RecoveryDriver`] from the pieces persisted by
/// [`store_driver`] on the previous action.
fn load_driver(state: &Map<String, Value>) -> Result<RecoveryDriver, ReducerError> {
    let saved: DriverState = get_state_field(state, "recovery_driver")?;

    let id32 = parse_hex32(&saved.id32_hex, "recovery_driver.id32")?;
    let encrypted_core_secret = base64::engine::general_purpose::STANDARD
        .decode(&saved.encrypted_core_secret_b64)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("recovery_driver.encrypted_core_secret is not valid base64: {e}")))?;

    let escrow_methods = saved
        .escrow_methods
        .into_iter()
        .map(|m| {
            Ok(anastasis_types::EscrowMethod {
                uuid: parse_hex16(&m.uuid_hex, "escrow_methods[].uuid")?,
                url: m.url,
                instructions: m.instructions,
                truth_key: parse_hex32(&m.truth_key_hex, "escrow_methods[].truth_key")?,
                truth_salt: parse_hex32(&m.truth_salt_hex, "escrow_methods[].truth_salt")?,
                provider_salt: parse_hex32(&m.provider_salt_hex, "escrow_methods[].provider_salt")?,
                escrow_type: m.escrow_type,
            })
        })
        .collect::<Result<Vec<_>, ReducerError>>()?;

    let policies = saved
        .policies
        .into_iter()
        .map(|p| {
            Ok(anastasis_types::DocumentPolicy {
                master_key: hex::decode(&p.master_key_hex)
                    .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("policies[].master_key is not valid hex: {e}")))?,
                salt: parse_hex32(&p.salt_hex, "policies[].salt")?,
                uuids: p
                    .uuids_hex
                    .iter()
                    .map(|u| parse_hex16(u, "policies[].uuids[]"))
                    .collect::<Result<Vec<_>, ReducerError>>()?,
            })
        })
        .collect::<Result<Vec<_>, ReducerError>>()?;

    let mut solved_shares = std::collections::HashMap::new();
    for (uuid_hex, share_hex) in saved.solved_shares {
        let uuid = parse_hex16(&uuid_hex, "solved_shares[].uuid")?;
        let share = parse_hex32(&share_hex, "solved_shares[].share")?;
        solved_shares.insert(uuid, share);
    }

    Ok(RecoveryDriver::from_parts(id32, saved.secret_name, encrypted_core_secret, escrow_methods, policies, solved_shares))
}

async fn change_version(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let version: u32 = get_arg(args, "version")?;
    let provider_url: String = get_state_field(state, "selected_provider")?;
    download_policy(ctx, state, &provider_url, Some(version)).await
}

fn done_secret_selecting(state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    let challenges: Vec<ChallengeSummary> = get_state_field(state, "challenges")?;
    if challenges.is_empty() {
        return Err(ReducerError::new(ErrorCode::PolicyMalformed, "recovery document carries no escrow methods"));
    }
    set_recovery_state(state, RecoveryState::ChallengeSelecting);
    Ok(())
}

fn parse_uuid_hex(hex_str: &str) -> Result<[u8; 16], ReducerError> {
    let bytes = hex::decode(hex_str).map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("uuid is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ReducerError::new(ErrorCode::ReducerInputInvalid, "uuid must be 16 bytes"))
}

async fn select_challenge(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let uuid_hex: String = get_arg(args, "uuid")?;
    let uuid = parse_uuid_hex(&uuid_hex)?;

    let challenges: Vec<ChallengeSummary> = get_state_field(state, "challenges")?;
    if !challenges.iter().any(|c| c.uuid_hex == uuid_hex) {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown challenge uuid {uuid_hex:?}")));
    }

    set_state_field(state, "selected_challenge", SelectedChallenge { uuid_hex, pay_uri: None, answer_pin: None });

    run_challenge_step(ctx, state, uuid, None).await
}

/// every suspension point that can transition a selected challenge's
/// state funnels through here, so `select_challenge`, `solve_challenge`
/// and `poll` all share one outcome-translation path (§4.G).
async fn run_challenge_step(
    ctx: &ReducerContext,
    state: &mut Map<String, Value>,
    uuid: [u8; 16],
    answer: Option<ChallengeAnswer>,
) -> Result<(), ReducerError> {
    let mut driver = load_driver(state)?;

    let step = anastasis_recovery::start_challenge(&mut driver, &ctx.client, uuid, answer, None, 0).await;
    store_driver(state, &driver);
    apply_challenge_step(state, step)
}

fn apply_challenge_step(state: &mut Map<String, Value>, step: anastasis_recovery::ChallengeStep) -> Result<(), ReducerError> {
    if let Some(recovered) = step.recovered {
        finish_recovery(state, recovered);
        return Ok(());
    }

    match step.state {
        RunnerState::Unstarted | RunnerState::Pending => {
            set_recovery_state(state, RecoveryState::ChallengeSolving);
            Ok(())
        }
        RunnerState::Solved => {
            // a policy short of completion: stay on the challenge list
            // so the user can pick the next truth to satisfy.
            set_recovery_state(state, RecoveryState::ChallengeSelecting);
            Ok(())
        }
        RunnerState::PaymentRequired { pay_uri, payment_secret } => {
            let mut selected: SelectedChallenge = get_state_field(state, "selected_challenge")?;
            selected.pay_uri = Some(pay_uri.clone());
            set_state_field(state, "selected_challenge", selected);
            set_state_field(state, "payment_secret_hex", hex::encode(payment_secret.0));
            set_recovery_state(state, RecoveryState::ChallengePaying);
            Ok(())
        }
        RunnerState::AwaitExternal { answer_code } => {
            let mut selected: SelectedChallenge = get_state_field(state, "selected_challenge")?;
            selected.answer_pin = answer_code;
            set_state_field(state, "selected_challenge", selected);
            set_recovery_state(state, RecoveryState::ChallengeSolving);
            Ok(())
        }
        RunnerState::AwaitRedirect { location } => {
            set_state_field(state, "redirect_url", location);
            set_recovery_state(state, RecoveryState::ChallengeSolving);
            Ok(())
        }
        RunnerState::NeedUserInput { body, mime } => {
            set_state_field(state, "challenge_body_b64", base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &body));
            set_state_field(state, "challenge_mime", mime);
            set_recovery_state(state, RecoveryState::ChallengeSolving);
            Ok(())
        }
        RunnerState::FailedRateLimited => Err(ReducerError::new(ErrorCode::NetworkFailed, "rate limited by provider, try again later")),
        RunnerState::FailedAsync => Err(ReducerError::new(ErrorCode::NetworkFailed, "authentication timed out, poll again")),
        RunnerState::FailedUnknownTruth => Err(ReducerError::new(ErrorCode::PolicyUnknown, "provider no longer has this truth")),
        RunnerState::FailedInvalidAnswer => Err(ReducerError::new(ErrorCode::InvalidAnswer, "the supplied answer did not decrypt the key share")),
        RunnerState::FailedServerError { http_status } => {
            Err(ReducerError::new(ErrorCode::ProviderFailed, format!("provider returned http {http_status}")))
        }
    }
}

fn finish_recovery(state: &mut Map<String, Value>, recovered: anastasis_recovery::CoreSecretRecovered) {
    set_state_field(
        state,
        "recovery_result",
        RecoveryResult {
            secret_name: recovered.secret_name,
            core_secret_b64: Some(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &recovered.core_secret)),
            error_code: None,
        },
    );
    set_recovery_state(state, RecoveryState::RecoveryFinished);
    // the secret, once surfaced, is not kept in the challenge/driver
    // bookkeeping the session snapshot otherwise carries (§4.I
    // "finished" transition).
    state.remove("challenge_body_b64");
    state.remove("selected_challenge");
}

async fn poll_challenges(ctx: &ReducerContext, state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    let selected: SelectedChallenge = get_state_field(state, "selected_challenge")?;
    let uuid = parse_uuid_hex(&selected.uuid_hex)?;

    let mut driver = load_driver(state)?;
    let step = anastasis_recovery::poll_challenge(&mut driver, &ctx.client, uuid, selected.answer_pin, 30_000).await;
    store_driver(state, &driver);
    apply_challenge_step(state, step)
}

async fn pay_challenge(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let payment_secret_hex: String = get_arg(args, "payment_secret")?;
    let payment_secret = parse_payment_secret(&payment_secret_hex)?;

    let selected: SelectedChallenge = get_state_field(state, "selected_challenge")?;
    let uuid = parse_uuid_hex(&selected.uuid_hex)?;

    let mut driver = load_driver(state)?;
    let step = anastasis_recovery::start_challenge(&mut driver, &ctx.client, uuid, None, Some(&payment_secret), 0).await;
    store_driver(state, &driver);
    apply_challenge_step(state, step)
}

async fn solve_challenge(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let selected: SelectedChallenge = get_state_field(state, "selected_challenge")?;
    let uuid = parse_uuid_hex(&selected.uuid_hex)?;

    let challenges: Vec<ChallengeSummary> = get_state_field(state, "challenges")?;
    let summary = challenges
        .iter()
        .find(|c| c.uuid_hex == selected.uuid_hex)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, "selected_challenge not found among challenges"))?;

    let answer = match anastasis_types::MethodType::from(summary.method_type.as_str()).kind() {
        anastasis_types::ChallengeKind::Question => {
            let text: String = get_arg(args, "answer")?;
            Some(ChallengeAnswer::Text(text))
        }
        anastasis_types::ChallengeKind::Numeric => {
            let code: u64 = get_arg(args, "answer")?;
            Some(ChallengeAnswer::Numeric(code))
        }
        anastasis_types::ChallengeKind::Opaque => get_arg_opt::<String>(args, "answer").map(ChallengeAnswer::Text),
    };

    run_challenge_step(ctx, state, uuid, answer).await
}

fn parse_payment_secret(hex_str: &str) -> Result<PaymentSecret, ReducerError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("payment_secret is not valid hex: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ReducerError::new(ErrorCode::ReducerInputInvalid, "payment_secret must be 32 bytes"))?;
    Ok(PaymentSecret(arr))
}

/// `back` out of `CHALLENGE_SOLVING` is not the generic decrement:
/// there may be an async authentication pending on the provider side
/// (an `answer_code` pin, an unread redirect, unconsumed challenge
/// instructions). drop that bookkeeping before returning to the
/// challenge list so a later `select_challenge` starts clean, rather
/// than resuming a stale suspension point (§5 cancellation semantics).
pub fn back_challenge_solving(state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    state.remove("selected_challenge");
    state.remove("redirect_url");
    state.remove("challenge_body_b64");
    state.remove("challenge_mime");
    set_recovery_state(state, RecoveryState::ChallengeSelecting);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_challenge_solving_clears_suspension_bookkeeping() {
        let mut state = Map::new();
        set_recovery_state(&mut state, RecoveryState::ChallengeSolving);
        state.insert("selected_challenge".into(), serde_json::json!({"uuid_hex": "aa"}));
        state.insert("redirect_url".into(), Value::String("https://example/redirect".into()));
        state.insert("challenge_body_b64".into(), Value::String("Zm9v".into()));

        back_challenge_solving(&mut state).unwrap();

        assert!(!state.contains_key("selected_challenge"));
        assert!(!state.contains_key("redirect_url"));
        assert!(!state.contains_key("challenge_body_b64"));
        assert_eq!(recovery_state_tag(&state).unwrap(), RecoveryState::ChallengeSelecting);
    }

    #[test]
    fn driver_state_roundtrips_through_json() {
        let escrow = anastasis_types::EscrowMethod {
            uuid: [1; 16],
            url: "https://provider.example".into(),
            instructions: "enter your pin".into(),
            truth_key: [2; 32],
            truth_salt: [3; 32],
            provider_salt: [4; 32],
            escrow_type: "question".into(),
        };
        let policy_key = anastasis_crypto::derive_policy_key(&[[5u8; 32]], &[6u8; 32]);
        let enc = anastasis_crypto::encrypt_core_secret(&[policy_key], b"top secret").unwrap();
        let document = anastasis_types::RecoveryDocument {
            secret_name: Some("wallet".into()),
            policies: vec![anastasis_types::DocumentPolicy {
                master_key: enc.encrypted_master_keys[0].clone(),
                salt: [6; 32],
                uuids: vec![[1; 16]],
            }],
            escrow_methods: vec![escrow],
            encrypted_core_secret: enc.encrypted_core_secret,
        };

        let driver = RecoveryDriver::from_document(document, [9u8; 32]);
        let mut state = Map::new();
        store_driver(&mut state, &driver);

        let reloaded = load_driver(&state).unwrap();
        assert_eq!(reloaded.id32(), driver.id32());
        assert_eq!(reloaded.challenges().len(), 1);
        assert_eq!(reloaded.escrow_methods().len(), 1);
        assert_eq!(reloaded.policies().len(), 1);
    }

    #[test]
    fn parse_hex_rejects_wrong_length() {
        assert!(parse_hex16("aabb", "x").is_err());
        assert!(parse_hex32("aabb", "x").is_err());
    }
}

