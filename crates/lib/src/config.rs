//! Configuration types and loading.
//!
//! Config is loaded once at start from a JSON file (e.g. `~/.parley/config.json`) and
//! environment, then only read: default locale and per-connector limits.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Locale for inbound requests that carry none (default "en"). Overridden by PARLEY_DEFAULT_LOCALE env.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Per-connector settings.
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            connectors: ConnectorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub web: WebConnectorConfig,
    #[serde(default)]
    pub slack: SlackConnectorConfig,
}

/// Web widget connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConnectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Longest button payload in bytes. Unset means no limit.
    #[serde(default)]
    pub max_payload_length: Option<usize>,
}

impl Default for WebConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_payload_length: None,
        }
    }
}

/// Slack (Block Kit) connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConnectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Longest button `value` in bytes (Slack caps it at 2000).
    #[serde(default = "default_slack_max_payload_length")]
    pub max_payload_length: Option<usize>,
}

impl Default for SlackConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_payload_length: default_slack_max_payload_length(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_slack_max_payload_length() -> Option<usize> {
    Some(2000)
}

/// Resolve the default locale: env PARLEY_DEFAULT_LOCALE overrides config.
pub fn resolve_default_locale(config: &Config) -> String {
    std::env::var("PARLEY_DEFAULT_LOCALE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.default_locale.trim().to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".parley").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, PARLEY_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
