//! provider catalog: one coalesced `/config` probe per url, cached
//! for the life of the session (§3, §4.C).

use crate::client::ProviderClient;
use crate::response::ConfigResult;
use anastasis_types::provider::CURRENT_PROTOCOL_VERSION;
use anastasis_types::CatalogEntry;
use futures::future::{FutureExt, Shared};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// hardcoded probe timeout, per §4.C.
const CONFIG_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

type ProbeFuture = Shared<Pin<Box<dyn std::future::Future<Output = CatalogEntry> + Send>>>;

/// cache of outstanding and completed `/config` probes. cloning a
/// `ProviderCatalog` shares the same cache (it is an `Arc` inside),
/// matching the "process-wide for the session" resource model of §5.
#[derive(Clone)]
pub struct ProviderCatalog {
    client: Arc<ProviderClient>,
    probes: Arc<Mutex<HashMap<String, ProbeFuture>>>,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self {
            client: Arc::new(ProviderClient::new()),
            probes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// probe `url`, or join an already-outstanding probe for the same
    /// url (§4.C: "joining requesters attach to the live probe rather
    /// than starting a second one").
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, url: &str) -> CatalogEntry {
        let shared = {
            let mut probes = self.probes.lock().await;
            probes
                .entry(url.to_string())
                .or_insert_with(|| Self::spawn_probe(self.client.clone(), url.to_string()))
                .clone()
        };
        shared.await
    }

    /// force a fresh probe, replacing any cached entry. used by the
    /// reducer's `add_provider` action when the caller wants to retry
    /// a provider that was previously offline.
    pub async fn refresh(&self, url: &str) -> CatalogEntry {
        let shared = {
            let mut probes = self.probes.lock().await;
            let fresh = Self::spawn_probe(self.client.clone(), url.to_string());
            probes.insert(url.to_string(), fresh.clone());
            fresh
        };
        shared.await
    }

    fn spawn_probe(client: Arc<ProviderClient>, url: String) -> ProbeFuture {
        let fut: Pin<Box<dyn std::future::Future<Output = CatalogEntry> + Send>> = Box::pin(async move {
            let result = tokio::time::timeout(CONFIG_PROBE_TIMEOUT, client.get_config(&url)).await;
            match result {
                Err(_elapsed) => CatalogEntry::Timeout { url },
                Ok(ConfigResult::Timeout) => CatalogEntry::Timeout { url },
                Ok(ConfigResult::TransportError(reason)) => {
                    CatalogEntry::Offline { url, http_status: 0 }.tap_log(&reason)
                }
                Ok(ConfigResult::HttpError { status }) => {
                    CatalogEntry::Offline { url, http_status: status }.tap_log(&format!("http {status}"))
                }
                Ok(ConfigResult::Malformed(reason)) => CatalogEntry::InvalidConfig { url, reason },
                Ok(ConfigResult::Ok(config)) => validate(url, config),
            }
        });
        fut.shared()
    }
}

/// apply the acceptance rules of §4.C: positive storage limit, a
/// compatible version announcement, and currency-consistent fees.
fn validate(url: String, config: anastasis_types::ProviderConfig) -> CatalogEntry {
    if config.storage_limit_in_megabytes == 0 {
        return CatalogEntry::InvalidConfig { url, reason: "storage_limit_in_megabytes is zero".into() };
    }
    if !config.version.compatible_with(&CURRENT_PROTOCOL_VERSION) {
        return CatalogEntry::InvalidConfig {
            url,
            reason: format!(
                "incompatible version {}:{}:{}",
                config.version.current, config.version.revision, config.version.age
            ),
        };
    }
    let currency = config.currency.as_str();
    if config.annual_fee.currency_str() != currency
        || config.truth_upload_fee.currency_str() != currency
        || config.liability_limit.currency_str() != currency
    {
        return CatalogEntry::InvalidConfig { url, reason: "fee currency mismatch".into() };
    }
    CatalogEntry::Ok(config)
}

trait TapLog {
    fn tap_log(self, reason: &str) -> Self;
}

impl TapLog for CatalogEntry {
    fn tap_log(self, reason: &str) -> Self {
        tracing::debug!(reason, "provider probe failed");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coalesces_concurrent_probes_of_same_url() {
        let catalog = ProviderCatalog::new();
        let url = "http://127.0.0.1:1".to_string(); // unroutable, fails fast via transport error

        let c1 = catalog.clone();
        let c2 = catalog.clone();
        let u1 = url.clone();
        let u2 = url.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { c1.get(&u1).await }),
            tokio::spawn(async move { c2.get(&u2).await }),
        );

        // both calls should see the identical cached/coalesced result.
        assert_eq!(a.unwrap().url(), b.unwrap().url());
    }
}
