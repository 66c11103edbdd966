//! one async method per provider endpoint (§4.B). every call is
//! cancel-safe by construction: it's a plain future, dropped (and
//! thereby aborted) by the caller like any other.

use crate::response::{parse_payment_uri, ConfigResult, PolicyGetResult, PolicyPostResult, TruthGetResult, TruthPostResult};
use anastasis_types::provider::VersionInfo;
use anastasis_types::{Money, PaymentSecret, ProviderConfig, ProviderMethodFee};
use reqwest::StatusCode;
use std::time::Duration;

/// wire shape of a provider's `/config` response.
#[derive(Debug, serde::Deserialize)]
struct ConfigWire {
    currency: String,
    business_name: String,
    methods: Vec<MethodWire>,
    storage_limit_in_megabytes: u32,
    annual_fee: Money,
    truth_upload_fee: Money,
    liability_limit: Money,
    #[serde(with = "hex_bytes_32")]
    salt: [u8; 32],
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct MethodWire {
    #[serde(rename = "type")]
    method_type: String,
    usage_fee: Money,
}

mod hex_bytes_32 {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("salt must be 32 bytes"))
    }
}

/// one cancellable async request per provider endpoint.
pub struct ProviderClient {
    http: reqwest::Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn apply_timeout(builder: reqwest::RequestBuilder, timeout_ms: u64) -> reqwest::RequestBuilder {
        if timeout_ms == 0 {
            builder
        } else {
            builder.timeout(Duration::from_millis(timeout_ms))
        }
    }

    /// `GET /config`, hardcoded 60s timeout per §4.C (the caller, the
    /// catalog, enforces the timeout; this method also accepts it so
    /// it can be unit-tested without the catalog's scheduler).
    #[tracing::instrument(skip(self))]
    pub async fn get_config(&self, provider_url: &str) -> ConfigResult {
        let url = format!("{}/config", provider_url.trim_end_matches('/'));
        let resp = match Self::apply_timeout(self.http.get(&url), 60_000).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return ConfigResult::Timeout,
            Err(e) => return ConfigResult::TransportError(e.to_string()),
        };

        let status = resp.status();
        let body: ConfigWire = match resp.json().await {
            Ok(b) => b,
            Err(e) => return ConfigResult::Malformed(e.to_string()),
        };
        if !status.is_success() {
            return ConfigResult::HttpError { status: status.as_u16() };
        }

        let version = parse_version_triple(&body.version)
            .unwrap_or(VersionInfo { current: 0, revision: 0, age: 0 });

        ConfigResult::Ok(ProviderConfig {
            url: provider_url.to_string(),
            currency: body.currency,
            business_name: body.business_name,
            methods: body
                .methods
                .into_iter()
                .map(|m| ProviderMethodFee {
                    method_type: m.method_type.into(),
                    usage_fee: m.usage_fee,
                })
                .collect(),
            storage_limit_in_megabytes: body.storage_limit_in_megabytes,
            annual_fee: body.annual_fee,
            truth_upload_fee: body.truth_upload_fee,
            liability_limit: body.liability_limit,
            salt: body.salt,
            version,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_policy(
        &self,
        provider_url: &str,
        account_pub_hex: &str,
        version: Option<u32>,
        timeout_ms: u64,
    ) -> PolicyGetResult {
        let mut url = format!("{}/policy/{}", provider_url.trim_end_matches('/'), account_pub_hex);
        if let Some(v) = version {
            url = format!("{url}?version={v}");
        }
        let req = Self::apply_timeout(self.http.get(&url), timeout_ms);
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return PolicyGetResult::TransportError(e.to_string()),
        };

        match resp.status() {
            StatusCode::OK => {
                let version = header_u32(resp.headers(), "Anastasis-Version").unwrap_or(0);
                let signature = header_hex(resp.headers(), "Anastasis-Policy-Signature").unwrap_or_default();
                match resp.bytes().await {
                    Ok(body) => PolicyGetResult::Ok {
                        body: body.to_vec(),
                        version,
                        signature,
                    },
                    Err(e) => PolicyGetResult::TransportError(e.to_string()),
                }
            }
            StatusCode::NOT_MODIFIED => PolicyGetResult::NotModified,
            StatusCode::NOT_FOUND => PolicyGetResult::UnknownAccount,
            StatusCode::NO_CONTENT => PolicyGetResult::Gone,
            status if status.is_server_error() => PolicyGetResult::ServerError {
                http_status: status.as_u16(),
            },
            status => PolicyGetResult::ServerError {
                http_status: status.as_u16(),
            },
        }
    }

    /// `POST /policy/{account_pub}`. `payment_secret` replays a
    /// previously-received payment identifier; `if_none_match`
    /// carries the upload hash for idempotent retry (§4.B, §4.E).
    #[tracing::instrument(skip(self, body, signature))]
    #[allow(clippy::too_many_arguments)]
    pub async fn post_policy(
        &self,
        provider_url: &str,
        account_pub_hex: &str,
        body: Vec<u8>,
        signature: &[u8],
        upload_hash_hex: &str,
        payment_secret: Option<&PaymentSecret>,
    ) -> PolicyPostResult {
        let url = format!("{}/policy/{}", provider_url.trim_end_matches('/'), account_pub_hex);
        let mut req = self
            .http
            .post(&url)
            .header("Anastasis-Policy-Signature", hex::encode(signature))
            .header("If-None-Match", upload_hash_hex)
            .body(body);

        if let Some(secret) = payment_secret {
            req = req.header("Anastasis-Payment-Identifier", hex::encode(secret.0));
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return PolicyPostResult::TransportError(e.to_string()),
        };

        match resp.status() {
            StatusCode::NO_CONTENT => {
                let version = header_u32(resp.headers(), "Anastasis-Version").unwrap_or(0);
                let expiration = header_u64(resp.headers(), "Anastasis-Policy-Expiration").unwrap_or(0);
                PolicyPostResult::Ok { version, expiration }
            }
            StatusCode::NOT_MODIFIED => PolicyPostResult::Unchanged,
            StatusCode::PAYMENT_REQUIRED => {
                let pay_uri = resp
                    .headers()
                    .get("Taler")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                match parse_payment_uri(&pay_uri) {
                    Some(secret) => PolicyPostResult::PaymentRequired { pay_uri, payment_secret: secret },
                    None => PolicyPostResult::TransportError("malformed Taler payment uri".into()),
                }
            }
            StatusCode::PAYLOAD_TOO_LARGE => PolicyPostResult::TooLarge,
            status => PolicyPostResult::ServerError { http_status: status.as_u16() },
        }
    }

    /// `GET /truth/{uuid}[?response=H&timeout_ms=T]`. attaches
    /// `Truth-Decryption-Key` so the server can decrypt the stored
    /// challenge datum before returning instructions (§4.B).
    #[tracing::instrument(skip(self, truth_key))]
    #[allow(clippy::too_many_arguments)]
    pub async fn get_truth(
        &self,
        provider_url: &str,
        uuid_hex: &str,
        truth_key: &[u8; 32],
        response_hash: Option<&[u8; 32]>,
        payment_secret: Option<&PaymentSecret>,
        timeout_ms: u64,
    ) -> TruthGetResult {
        let mut url = format!("{}/truth/{}", provider_url.trim_end_matches('/'), uuid_hex);
        let mut query = Vec::new();
        if let Some(h) = response_hash {
            query.push(format!("response={}", hex::encode(h)));
        }
        if timeout_ms > 0 {
            query.push(format!("timeout_ms={timeout_ms}"));
        }
        if !query.is_empty() {
            url = format!("{url}?{}", query.join("&"));
        }

        let mut req = self.http.get(&url).header("Truth-Decryption-Key", hex::encode(truth_key));
        if let Some(secret) = payment_secret {
            req = req.header("Anastasis-Payment-Identifier", hex::encode(secret.0));
        }
        let req = Self::apply_timeout(req, timeout_ms);
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return TruthGetResult::AuthTimeout,
            Err(e) => return TruthGetResult::TransportError(e.to_string()),
        };

        match resp.status() {
            StatusCode::OK => match resp.bytes().await {
                Ok(b) => TruthGetResult::Ok { encrypted_key_share: b.to_vec() },
                Err(e) => TruthGetResult::TransportError(e.to_string()),
            },
            StatusCode::ACCEPTED => match resp.json::<serde_json::Value>().await {
                Ok(v) => TruthGetResult::ExternalInstructions(v),
                Err(e) => TruthGetResult::TransportError(e.to_string()),
            },
            StatusCode::SEE_OTHER => {
                let location = resp
                    .headers()
                    .get("Location")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                TruthGetResult::Redirect(location)
            }
            StatusCode::PAYMENT_REQUIRED => {
                let pay_uri = resp
                    .headers()
                    .get("Taler")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                match parse_payment_uri(&pay_uri) {
                    Some(secret) => TruthGetResult::PaymentRequired { pay_uri, payment_secret: secret },
                    None => TruthGetResult::TransportError("malformed Taler payment uri".into()),
                }
            }
            StatusCode::FORBIDDEN | StatusCode::ALREADY_REPORTED => {
                let mime = resp
                    .headers()
                    .get("Content-Type")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let http_status = resp.status().as_u16();
                match resp.bytes().await {
                    Ok(b) => TruthGetResult::ChallengeInstructions { body: b.to_vec(), mime, http_status },
                    Err(e) => TruthGetResult::TransportError(e.to_string()),
                }
            }
            StatusCode::NOT_FOUND => TruthGetResult::UnknownTruth,
            StatusCode::REQUEST_TIMEOUT => TruthGetResult::AuthTimeout,
            StatusCode::TOO_MANY_REQUESTS => TruthGetResult::RateLimited,
            StatusCode::EXPECTATION_FAILED => TruthGetResult::PreconditionFailed,
            status => TruthGetResult::ServerError { http_status: status.as_u16() },
        }
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn post_truth(
        &self,
        provider_url: &str,
        uuid_hex: &str,
        body: Vec<u8>,
        payment_secret: Option<&PaymentSecret>,
    ) -> TruthPostResult {
        let url = format!("{}/truth/{}", provider_url.trim_end_matches('/'), uuid_hex);
        let mut req = self.http.post(&url).body(body);
        if let Some(secret) = payment_secret {
            req = req.header("Anastasis-Payment-Identifier", hex::encode(secret.0));
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return TruthPostResult::TransportError(e.to_string()),
        };

        match resp.status() {
            StatusCode::NO_CONTENT => TruthPostResult::Ok,
            StatusCode::PAYMENT_REQUIRED => {
                let pay_uri = resp
                    .headers()
                    .get("Taler")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                match parse_payment_uri(&pay_uri) {
                    Some(secret) => TruthPostResult::PaymentRequired { pay_uri, payment_secret: secret },
                    None => TruthPostResult::TransportError("malformed Taler payment uri".into()),
                }
            }
            StatusCode::CONFLICT => TruthPostResult::Conflict,
            StatusCode::PAYLOAD_TOO_LARGE => TruthPostResult::TooLarge,
            status => TruthPostResult::ServerError { http_status: status.as_u16() },
        }
    }
}

fn parse_version_triple(s: &str) -> Option<VersionInfo> {
    let mut parts = s.split(':');
    let current = parts.next()?.parse().ok()?;
    let revision = parts.next()?.parse().ok()?;
    let age = parts.next()?.parse().ok()?;
    Some(VersionInfo { current, revision, age })
}

fn header_u32(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_hex(headers: &reqwest::header::HeaderMap, name: &str) -> Option<Vec<u8>> {
    hex::decode(headers.get(name)?.to_str().ok()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_triple() {
        let v = parse_version_triple("3:1:2").unwrap();
        assert_eq!((v.current, v.revision, v.age), (3, 1, 2));
    }
}
