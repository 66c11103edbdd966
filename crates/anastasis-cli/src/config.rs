//! optional on-disk configuration (§9 design notes: the ambient
//! config layer every crate in the workspace that touches a process
//! boundary carries). everything here has a sane default; the file is
//! entirely optional.

use serde::Deserialize;
use std::path::Path;

/// `ANASTASIS_CLI_CONFIG` overrides the default search path; any field
/// present in the environment overrides the same field from the file.
const CONFIG_ENV_VAR: &str = "ANASTASIS_CLI_CONFIG";
const LOG_FILTER_ENV_VAR: &str = "ANASTASIS_CLI_LOG";
const DEFAULT_CONFIG_PATH: &str = "anastasis-cli.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReducerConfig {
    /// providers to add automatically on every fresh session, so
    /// scripted test runs don't need an `add_provider` line per provider.
    #[serde(default)]
    pub default_providers: Vec<String>,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"anastasis_cli=debug"`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl ReducerConfig {
    /// load from `ANASTASIS_CLI_CONFIG`, or `./anastasis-cli.toml` if
    /// present, or fall back to defaults; then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            let text = std::fs::read_to_string(&path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };

        if let Ok(filter) = std::env::var(LOG_FILTER_ENV_VAR) {
            config.log_filter = Some(filter);
        }
        Ok(config)
    }
}
