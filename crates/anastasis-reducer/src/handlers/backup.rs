//! backup-mode handlers (§4.I backup state sequence).

use crate::context::ReducerContext;
use crate::countries;
use crate::state::{
    backup_state_tag, get_arg, get_state_field, get_state_field_or, set_backup_state, set_state_field, BackupState,
};
use anastasis_types::identity::{canonical_bytes, IdentityAttributes};
use anastasis_types::{ErrorCode, MethodType, PaymentSecret, PolicyCandidate, ReducerError, Truth};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// one user-entered authentication method, awaiting provider
/// assignment by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMethodEntry {
    pub method_type: String,
    pub instructions: String,
    pub challenge_b64: String,
    pub answer: Option<String>,
}

/// a truth pending payment, preserved in full so the UI can retry
/// after paying without regenerating any random material (§4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingTruth {
    truth: Truth,
    pay_uri: String,
}

/// one entry of the `(authentication_method index, provider url) ->
/// Truth` map, flattened to a plain list for state persistence: JSON
/// object keys must be strings, so the map itself cannot round-trip
/// through `set_state_field`/`get_state_field` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UploadedTruthSlot {
    method_index: usize,
    provider_url: String,
    truth: Truth,
}

fn truths_to_slots(truths: &HashMap<(usize, String), Truth>) -> Vec<UploadedTruthSlot> {
    truths
        .iter()
        .map(|((method_index, provider_url), truth)| UploadedTruthSlot {
            method_index: *method_index,
            provider_url: provider_url.clone(),
            truth: truth.clone(),
        })
        .collect()
}

fn slots_to_truths(slots: Vec<UploadedTruthSlot>) -> HashMap<(usize, String), Truth> {
    slots
        .into_iter()
        .map(|slot| ((slot.method_index, slot.provider_url), slot.truth))
        .collect()
}

/// one provider's outstanding recovery-document payment demand,
/// persisted so `pay_policy` can replay the matching secret later.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyPaymentRequest {
    provider_url: String,
    pay_uri: String,
    payment_secret_hex: String,
}

pub async fn dispatch(ctx: &ReducerContext, state: &mut Map<String, Value>, action: &str, args: &Value) -> Result<(), ReducerError> {
    let tag = backup_state_tag(state)?;
    match (tag, action) {
        (BackupState::ContinentSelecting, "select_continent") => select_continent(state, args),
        (BackupState::CountrySelecting, "select_country") => select_country(state, args),
        (BackupState::UserAttributesCollecting, "enter_user_attributes") => enter_user_attributes(state, args),
        (BackupState::AuthenticationsEditing, "add_authentication") => add_authentication(state, args),
        (BackupState::AuthenticationsEditing, "delete_authentication") => delete_authentication(state, args),
        (BackupState::AuthenticationsEditing, "next") => plan_policies(ctx, state).await,
        (BackupState::PoliciesReviewing, "next") => review_policies_next(state),
        (BackupState::SecretEditing, "enter_secret") => enter_secret(ctx, state, args).await,
        (BackupState::TruthsPaying, "pay") => pay_truth(ctx, state, args).await,
        (BackupState::PoliciesPaying, "pay") => pay_policy(ctx, state, args).await,
        _ => Err(ReducerError::new(
            ErrorCode::ReducerActionInvalid,
            format!("action {action:?} is not defined for backup state {}", tag.as_str()),
        )),
    }
}

fn select_continent(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let continent: String = get_arg(args, "continent")?;
    if !countries::continents().contains(&continent.as_str()) {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown continent {continent:?}")));
    }
    set_state_field(state, "continent", continent);
    set_backup_state(state, BackupState::CountrySelecting);
    Ok(())
}

fn select_country(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let country_code: String = get_arg(args, "country_code")?;
    let required = countries::required_attributes(&country_code)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown country code {country_code:?}")))?;
    set_state_field(state, "country_code", country_code);
    // §3: "collected per country-specific schema" — surfaced here so
    // the UI can render the right entry form before the user types
    // anything (§4.I: "every state except the terminals" emits the
    // fields its handlers need).
    set_state_field(state, "required_attributes", required);
    set_backup_state(state, BackupState::UserAttributesCollecting);
    Ok(())
}

fn enter_user_attributes(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
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

    set_state_field(state, "identity_attributes", attrs);
    set_state_field(state, "authentication_methods", Vec::<AuthMethodEntry>::new());
    set_state_field(state, "providers", Vec::<String>::new());
    set_backup_state(state, BackupState::AuthenticationsEditing);
    Ok(())
}

fn add_authentication(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let entry: AuthMethodEntry = serde_json::from_value(args.clone())
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("malformed authentication method: {e}")))?;
    // validate it parses as a known method type / challenge encoding up front.
    let _ = MethodType::from(entry.method_type.as_str());
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &entry.challenge_b64)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("challenge_b64 is not valid base64: {e}")))?;

    let mut methods: Vec<AuthMethodEntry> = get_state_field(state, "authentication_methods")?;
    methods.push(entry);
    set_state_field(state, "authentication_methods", methods);
    Ok(())
}

fn delete_authentication(state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let index: usize = get_arg(args, "index")?;
    let mut methods: Vec<AuthMethodEntry> = get_state_field(state, "authentication_methods")?;
    if index >= methods.len() {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, format!("no authentication method at index {index}")));
    }
    methods.remove(index);
    set_state_field(state, "authentication_methods", methods);
    Ok(())
}

/// join or start a `/config` probe for `provider_url` and splice it
/// into the session's provider list (§4.I: "every state supports
/// `add_provider`"). in backup, once past the initial authentications
/// state, also re-runs the planner so the UI sees fresh policies
/// without a separate `next` (§4.I).
pub async fn add_provider(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let provider_url: String = get_arg(args, "provider_url")?;
    ctx.catalog.get(&provider_url).await;

    let mut providers: Vec<String> = get_state_field_or(state, "providers", Vec::new());
    if !providers.contains(&provider_url) {
        providers.push(provider_url);
    }
    set_state_field(state, "providers", providers);

    if matches!(backup_state_tag(state), Ok(tag) if matches!(tag, BackupState::AuthenticationsEditing | BackupState::PoliciesReviewing)) {
        replan(ctx, state).await?;
    }
    Ok(())
}

async fn current_provider_configs(
    ctx: &ReducerContext,
    state: &Map<String, Value>,
) -> Vec<anastasis_types::ProviderConfig> {
    let providers: Vec<String> = get_state_field_or(state, "providers", Vec::new());
    let mut configs = Vec::new();
    for url in providers {
        if let anastasis_types::CatalogEntry::Ok(config) = ctx.catalog.get(&url).await {
            configs.push(config);
        }
    }
    configs
}

fn auth_method_inputs(methods: &[AuthMethodEntry]) -> Vec<anastasis_planner::AuthMethodInput> {
    methods
        .iter()
        .map(|m| anastasis_planner::AuthMethodInput {
            method_type: MethodType::from(m.method_type.as_str()),
            byte_size: base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &m.challenge_b64)
                .map(|b| b.len())
                .unwrap_or(0),
        })
        .collect()
}

async fn replan(ctx: &ReducerContext, state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    let methods: Vec<AuthMethodEntry> = get_state_field(state, "authentication_methods")?;
    let configs = current_provider_configs(ctx, state).await;
    let inputs = auth_method_inputs(&methods);
    let policies = anastasis_planner::plan(&inputs, &configs);
    set_state_field(state, "policies", policies);
    Ok(())
}

async fn plan_policies(ctx: &ReducerContext, state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    let methods: Vec<AuthMethodEntry> = get_state_field(state, "authentication_methods")?;
    if methods.is_empty() {
        return Err(ReducerError::new(ErrorCode::ReducerInputInvalid, "at least one authentication method is required"));
    }
    replan(ctx, state).await?;
    set_backup_state(state, BackupState::PoliciesReviewing);
    Ok(())
}

fn review_policies_next(state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    let policies: Vec<PolicyCandidate> = get_state_field(state, "policies")?;
    if policies.is_empty() {
        return Err(ReducerError::new(
            ErrorCode::AuthenticationMethodNotSupported,
            "no provider combination could satisfy any policy",
        ));
    }
    set_backup_state(state, BackupState::SecretEditing);
    Ok(())
}

/// every (method, provider) pair referenced by any candidate policy,
/// each to be uploaded as one truth (§4.D, §4.E step 2).
fn required_truth_slots(policies: &[PolicyCandidate]) -> Vec<(usize, String)> {
    let mut seen = Vec::new();
    for policy in policies {
        for m in &policy.methods {
            let key = (m.authentication_method, m.provider.clone());
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    seen
}

async fn enter_secret(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let secret_name: Option<String> = crate::state::get_arg_opt(args, "secret_name");
    let core_secret_b64: String = get_arg(args, "core_secret")?;
    let core_secret = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &core_secret_b64)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("core_secret is not valid base64: {e}")))?;

    let attrs: IdentityAttributes = get_state_field(state, "identity_attributes")?;
    let methods: Vec<AuthMethodEntry> = get_state_field(state, "authentication_methods")?;
    let policies: Vec<PolicyCandidate> = get_state_field(state, "policies")?;
    let configs = current_provider_configs(ctx, state).await;
    let configs_by_url: HashMap<String, anastasis_types::ProviderConfig> =
        configs.into_iter().map(|c| (c.url.clone(), c)).collect();

    let mut truths: HashMap<(usize, String), Truth> = HashMap::new();
    let mut pending: Vec<PendingTruth> = Vec::new();

    for (method_index, provider_url) in required_truth_slots(&policies) {
        let entry = &methods[method_index];
        let config = configs_by_url
            .get(&provider_url)
            .ok_or_else(|| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("provider {provider_url:?} missing from catalog")))?;

        let id32 = anastasis_crypto::derive_user_identifier(&canonical_bytes(&attrs), &config.salt)
            .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;

        let challenge_datum = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &entry.challenge_b64)
            .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("challenge_b64 is not valid base64: {e}")))?;

        let truth = anastasis_backup::build_truth(
            &provider_url,
            MethodType::from(entry.method_type.as_str()),
            entry.instructions.clone(),
            &challenge_datum,
            config.salt,
            &id32,
            entry.answer.as_deref(),
        )
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;

        match anastasis_backup::upload_truth(&ctx.client, &truth, None, 5, None).await {
            anastasis_backup::UploadOutcome::Success => {
                truths.insert((method_index, provider_url), truth);
            }
            anastasis_backup::UploadOutcome::PaymentRequired { pay_uri, .. } => {
                pending.push(PendingTruth { truth: truth.clone(), pay_uri });
                truths.insert((method_index, provider_url), truth);
            }
            anastasis_backup::UploadOutcome::Conflict => {
                truths.insert((method_index, provider_url), truth);
            }
            anastasis_backup::UploadOutcome::ServerFailure { http_status } => {
                return Err(ReducerError::new(ErrorCode::ProviderFailed, format!("truth upload failed with http {http_status}")));
            }
        }
    }

    set_state_field(state, "secret_name", secret_name.clone());
    set_state_field(
        state,
        "core_secret_pending",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &core_secret),
    );
    set_state_field(state, "uploaded_truths", truths_to_slots(&truths));

    if !pending.is_empty() {
        set_state_field(state, "pending_truths", pending);
        set_backup_state(state, BackupState::TruthsPaying);
        return Ok(());
    }

    finish_truths_and_share(ctx, state, secret_name, &core_secret, truths).await
}

async fn pay_truth(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let provider_url: String = get_arg(args, "provider_url")?;
    let payment_secret_hex: String = get_arg(args, "payment_secret")?;
    let payment_secret = parse_payment_secret(&payment_secret_hex)?;

    let mut pending: Vec<PendingTruth> = get_state_field(state, "pending_truths")?;
    let idx = pending
        .iter()
        .position(|p| p.truth.provider_url == provider_url)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("no pending payment for provider {provider_url:?}")))?;

    match anastasis_backup::upload_truth(&ctx.client, &pending[idx].truth, None, 5, Some(&payment_secret)).await {
        anastasis_backup::UploadOutcome::Success | anastasis_backup::UploadOutcome::Conflict => {
            pending.remove(idx);
        }
        anastasis_backup::UploadOutcome::PaymentRequired { pay_uri, .. } => {
            pending[idx].pay_uri = pay_uri;
        }
        anastasis_backup::UploadOutcome::ServerFailure { http_status } => {
            return Err(ReducerError::new(ErrorCode::ProviderFailed, format!("truth upload failed with http {http_status}")));
        }
    }
    set_state_field(state, "pending_truths", pending.clone());

    if pending.is_empty() {
        let secret_name: Option<String> = get_state_field_or(state, "secret_name", None);
        let core_secret_b64: String = get_state_field(state, "core_secret_pending")?;
        let core_secret = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &core_secret_b64)
            .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;
        let slots: Vec<UploadedTruthSlot> = get_state_field(state, "uploaded_truths")?;
        let truths = slots_to_truths(slots);
        state.remove("pending_truths");
        finish_truths_and_share(ctx, state, secret_name, &core_secret, truths).await
    } else {
        Ok(())
    }
}

async fn finish_truths_and_share(
    ctx: &ReducerContext,
    state: &mut Map<String, Value>,
    secret_name: Option<String>,
    core_secret: &[u8],
    truths: HashMap<(usize, String), Truth>,
) -> Result<(), ReducerError> {
    let policies: Vec<PolicyCandidate> = get_state_field(state, "policies")?;
    let attrs: IdentityAttributes = get_state_field(state, "identity_attributes")?;
    let configs = current_provider_configs(ctx, state).await;
    let configs_by_url: HashMap<String, anastasis_types::ProviderConfig> =
        configs.into_iter().map(|c| (c.url.clone(), c)).collect();

    let document = anastasis_backup::build_recovery_document(&policies, &truths, secret_name, core_secret)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;

    let mut provider_ids = Vec::new();
    for url in configs_by_url.keys() {
        let config = &configs_by_url[url];
        let id32 = anastasis_crypto::derive_user_identifier(&canonical_bytes(&attrs), &config.salt)
            .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;
        provider_ids.push((url.clone(), id32));
    }

    match anastasis_backup::share_recovery_document(&ctx.client, &document, &provider_ids, &HashMap::new()).await {
        anastasis_backup::ShareResult::Success { providers } => {
            set_state_field(state, "committed_providers", providers);
            set_backup_state(state, BackupState::BackupFinished);
            // a secret, once backed up, is not kept around in the
            // session snapshot (§4.I "finished" transition).
            state.remove("pending_truths");
            state.remove("core_secret_pending");
            state.remove("uploaded_truths");
            Ok(())
        }
        anastasis_backup::ShareResult::PaymentRequired { payment_requests } => {
            let requests: Vec<PolicyPaymentRequest> = payment_requests
                .into_iter()
                .map(|(provider_url, pay_uri, secret)| PolicyPaymentRequest {
                    provider_url,
                    pay_uri,
                    payment_secret_hex: hex::encode(secret.0),
                })
                .collect();
            set_state_field(state, "policy_payment_requests", requests);
            set_state_field(
                state,
                "core_secret_pending",
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, core_secret),
            );
            set_state_field(state, "uploaded_truths", truths_to_slots(&truths));
            set_backup_state(state, BackupState::PoliciesPaying);
            Ok(())
        }
        anastasis_backup::ShareResult::ProviderFailed { url, http_status } => Err(ReducerError::new(
            ErrorCode::ProviderFailed,
            format!("provider {url} rejected the recovery document with http {http_status}"),
        )),
    }
}

async fn pay_policy(ctx: &ReducerContext, state: &mut Map<String, Value>, args: &Value) -> Result<(), ReducerError> {
    let provider_url: String = get_arg(args, "provider_url")?;
    let payment_secret_hex: String = get_arg(args, "payment_secret")?;
    let payment_secret = parse_payment_secret(&payment_secret_hex)?;

    let secret_name: Option<String> = get_state_field_or(state, "secret_name", None);
    let core_secret_b64: String = get_state_field(state, "core_secret_pending")?;
    let core_secret = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &core_secret_b64)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;
    let slots: Vec<UploadedTruthSlot> = get_state_field(state, "uploaded_truths")?;
    let truths = slots_to_truths(slots);
    let policies: Vec<PolicyCandidate> = get_state_field(state, "policies")?;

    let document = anastasis_backup::build_recovery_document(&policies, &truths, secret_name.clone(), &core_secret)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;

    let attrs: IdentityAttributes = get_state_field(state, "identity_attributes")?;
    let config = current_provider_configs(ctx, state)
        .await
        .into_iter()
        .find(|c| c.url == provider_url)
        .ok_or_else(|| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("unknown provider {provider_url:?}")))?;
    let id32 = anastasis_crypto::derive_user_identifier(&canonical_bytes(&attrs), &config.salt)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, e.to_string()))?;

    let mut payment_secrets = HashMap::new();
    payment_secrets.insert(provider_url.clone(), payment_secret);

    match anastasis_backup::share_recovery_document(&ctx.client, &document, &[(provider_url.clone(), id32)], &payment_secrets).await {
        anastasis_backup::ShareResult::Success { .. } => {
            let mut remaining: Vec<PolicyPaymentRequest> = get_state_field_or(state, "policy_payment_requests", Vec::new());
            remaining.retain(|req| req.provider_url != provider_url);
            if remaining.is_empty() {
                set_backup_state(state, BackupState::BackupFinished);
                state.remove("pending_truths");
                state.remove("core_secret_pending");
                state.remove("uploaded_truths");
                state.remove("policy_payment_requests");
            } else {
                set_state_field(state, "policy_payment_requests", remaining);
            }
            Ok(())
        }
        anastasis_backup::ShareResult::PaymentRequired { .. } => Ok(()),
        anastasis_backup::ShareResult::ProviderFailed { url, http_status } => Err(ReducerError::new(
            ErrorCode::ProviderFailed,
            format!("provider {url} rejected the recovery document with http {http_status}"),
        )),
    }
}

fn parse_payment_secret(hex_str: &str) -> Result<PaymentSecret, ReducerError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("payment_secret is not valid hex: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ReducerError::new(ErrorCode::ReducerInputInvalid, "payment_secret must be 32 bytes"))?;
    Ok(PaymentSecret(arr))
}
