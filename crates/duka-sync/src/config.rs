//! # Sync Configuration
//!
//! Configuration management for the offline core.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DUKA_BASE_URL=https://pos.example.com                              │
//! │     DUKA_API_KEY=secret                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/duka-pos/sync.toml (Linux)                               │
//! │     ~/Library/Application Support/com.duka.pos/sync.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [connection]
//! base_url = "https://pos.example.com"
//! api_key = "secret"
//!
//! [sync]
//! batch_size = 50
//! push_interval_secs = 15
//! pull_interval_secs = 60
//! request_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Connection Settings
// =============================================================================

/// Where the remote authority lives and how to authenticate against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Base URL of the remote authority (http:// or https://).
    #[serde(default)]
    pub base_url: String,

    /// API key sent as `X-API-KEY` and `Authorization: Bearer` on every
    /// request except the status probe.
    #[serde(default)]
    pub api_key: String,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Number of queue operations to push per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval between push attempts (seconds).
    #[serde(default = "default_push_interval")]
    pub push_interval_secs: u64,

    /// Interval between snapshot pulls (seconds).
    #[serde(default = "default_pull_interval")]
    pub pull_interval_secs: u64,

    /// Bounded request timeout (seconds). A timed-out batch counts as a
    /// failure and is requeued.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Initial backoff duration (milliseconds) after a failed flush.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_batch_size() -> usize {
    50
}
fn default_push_interval() -> u64 {
    15
}
fn default_pull_interval() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: default_batch_size(),
            push_interval_secs: default_push_interval(),
            pull_interval_secs: default_pull_interval(),
            request_timeout_secs: default_request_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl SyncSettings {
    /// Push interval as a Duration.
    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }

    /// Pull interval as a Duration.
    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    /// Request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Initial backoff as a Duration.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Maximum backoff as a Duration.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote authority connection settings.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Engine tuning settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a config with the given remote endpoint and defaults for
    /// everything else.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        SyncConfig {
            connection: ConnectionSettings {
                base_url: base_url.into(),
                api_key: api_key.into(),
            },
            sync: SyncSettings::default(),
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if !self.connection.base_url.is_empty()
            && !self.connection.base_url.starts_with("http://")
            && !self.connection.base_url.starts_with("https://")
        {
            return Err(SyncError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.connection.base_url
            )));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DUKA_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.connection.base_url = url;
        }

        if let Ok(key) = std::env::var("DUKA_API_KEY") {
            debug!("Overriding API key from environment");
            self.connection.api_key = key;
        }

        if let Ok(size) = std::env::var("DUKA_BATCH_SIZE") {
            if let Ok(n) = size.parse::<usize>() {
                self.sync.batch_size = n;
            }
        }

        if let Ok(secs) = std::env::var("DUKA_PUSH_INTERVAL_SECS") {
            if let Ok(n) = secs.parse::<u64>() {
                self.sync.push_interval_secs = n;
            }
        }

        if let Ok(secs) = std::env::var("DUKA_PULL_INTERVAL_SECS") {
            if let Ok(n) = secs.parse::<u64>() {
                self.sync.pull_interval_secs = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "duka", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Returns the remote base URL.
    pub fn base_url(&self) -> &str {
        &self.connection.base_url
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.connection.api_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.push_interval_secs, 15);
        assert!(config.validate().is_ok()); // Empty URL is allowed pre-setup
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::new("https://pos.example.com", "key");
        assert!(config.validate().is_ok());

        config.connection.base_url = "ftp://pos.example.com".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.connection.base_url = "http://pos.example.com".to_string();
        config.sync.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SyncConfig::new("https://pos.example.com", "secret");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[connection]"));
        assert!(toml_str.contains("[sync]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.base_url(), "https://pos.example.com");
        assert_eq!(parsed.api_key(), "secret");
    }

    #[test]
    fn test_env_overrides_beat_file_values() {
        let mut config = SyncConfig::new("https://file.example.com", "file-key");

        std::env::set_var("DUKA_BASE_URL", "https://env.example.com");
        std::env::set_var("DUKA_BATCH_SIZE", "25");
        config.apply_env_overrides();
        std::env::remove_var("DUKA_BASE_URL");
        std::env::remove_var("DUKA_BATCH_SIZE");

        assert_eq!(config.base_url(), "https://env.example.com");
        assert_eq!(config.sync.batch_size, 25);
        // Untouched values keep their file-loaded settings.
        assert_eq!(config.api_key(), "file-key");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [connection]
            base_url = "https://pos.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.sync.batch_size, 50);
        assert_eq!(parsed.api_key(), "");
    }
}
