use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::backoff::BackoffPolicy;
use crate::error::Result;
use crate::types::Table;

pub const DEFAULT_CONFIG_FILE: &str = "opsdeck.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteConfig {
    /// In-process store; nothing leaves the process.
    Memory,
    /// PostgREST-compatible HTTP endpoint.
    Rest(RestConfig),
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig::Memory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default)]
    pub url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_key_env() -> String {
    "OPSDECK_API_KEY".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_500
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl RestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key_env: default_api_key_env(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// FeedConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_tables")]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub reconnect: BackoffPolicy,
}

fn default_tables() -> Vec<Table> {
    Table::ALL.to_vec()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            reconnect: BackoffPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl SyncConfig {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing; using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: SyncConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Write atomically via a tempfile in the target directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let RemoteConfig::Rest(rest) = &self.remote {
            if rest.url.trim().is_empty() {
                warnings.push(ConfigWarning::error("remote.url is required for a rest remote"));
            } else if !rest.url.starts_with("http://") && !rest.url.starts_with("https://") {
                warnings.push(ConfigWarning::error(format!(
                    "remote.url '{}' must start with http:// or https://",
                    rest.url
                )));
            }
            if rest.poll_interval_ms == 0 {
                warnings.push(ConfigWarning::error("remote.poll_interval_ms must be positive"));
            }
            if rest.api_key().is_none() {
                warnings.push(ConfigWarning::warning(format!(
                    "${} is not set; requests go out without an API key",
                    rest.api_key_env
                )));
            }
        }

        if self.feed.tables.is_empty() {
            warnings.push(ConfigWarning::warning(
                "feed.tables is empty; the cache only updates on explicit refresh",
            ));
        }

        let reconnect = &self.feed.reconnect;
        if reconnect.max_delay_ms < reconnect.initial_delay_ms {
            warnings.push(ConfigWarning::warning(
                "feed.reconnect.max_delay_ms is below initial_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&reconnect.jitter) {
            warnings.push(ConfigWarning::error("feed.reconnect.jitter must be within [0, 1]"));
        }
        if reconnect.multiplier < 1.0 {
            warnings.push(ConfigWarning::warning(
                "feed.reconnect.multiplier below 1.0 is treated as 1.0",
            ));
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
