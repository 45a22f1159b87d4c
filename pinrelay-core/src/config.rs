use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::service::agent::{MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub telegram: TelegramConfig,
    pub relay: RelayConfig,
    pub locator: LocatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// The embedded store is used through a single connection so that
    /// concurrent writers to the same row are serialized.
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pinrelay.db?mode=rwc".to_string(),
            max_connections: 1,
            connect_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Telegram Bot API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 60,
        }
    }
}

/// Relay behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Private chat used for existence probes
    pub owner_id: i64,
    /// Recipients of state-transition notifications; also allowed to run commands
    pub admin_ids: Vec<i64>,
    /// Feeds registered on startup (in addition to the ones already stored)
    pub source_feeds: Vec<String>,
    /// Publish a new item immediately when its feed is the one in turn
    pub auto_forward: bool,
    /// Rotation interval used when the store has none
    pub default_interval_seconds: u64,
    /// Delay before a failed rotation task is restarted
    pub restart_backoff_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            owner_id: 0,
            admin_ids: Vec::new(),
            source_feeds: Vec::new(),
            auto_forward: false,
            default_interval_seconds: 7200,
            restart_backoff_seconds: 10,
        }
    }
}

/// Bounds for the stale-item search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Probes per direction
    pub probe_limit: u32,
    /// Search origin when no item was ever recorded for a feed
    pub default_start: i64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            probe_limit: 100,
            default_start: 1000,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // PINRELAY_TELEGRAM__BOT_TOKEN, PINRELAY_RELAY__ADMIN_IDS=1,2, ...
        builder = builder.add_source(
            Environment::with_prefix("PINRELAY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("relay.admin_ids")
                .with_list_parse_key("relay.source_feeds")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the settings the process cannot run without.
    ///
    /// Returns every problem found rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be at least 1".to_string());
        }
        if self.telegram.bot_token.trim().is_empty() {
            errors.push("telegram.bot_token must be set".to_string());
        }
        if self.relay.owner_id == 0 {
            errors.push("relay.owner_id must be set".to_string());
        }
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.relay.default_interval_seconds) {
            errors.push(format!(
                "relay.default_interval_seconds must be within [{MIN_INTERVAL_SECS}, {MAX_INTERVAL_SECS}]"
            ));
        }
        if self.locator.probe_limit == 0 {
            errors.push("locator.probe_limit must be at least 1".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!("logging.format must be \"json\" or \"pretty\", got {:?}", self.logging.format));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get database URL
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Admins plus the owner, deduplicated
    #[must_use]
    pub fn privileged_ids(&self) -> Vec<i64> {
        let mut ids = self.relay.admin_ids.clone();
        if self.relay.owner_id != 0 && !ids.contains(&self.relay.owner_id) {
            ids.push(self.relay.owner_id);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.telegram.bot_token = "123:abc".to_string();
        config.relay.owner_id = 42;
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.relay.default_interval_seconds, 7200);
        assert_eq!(config.relay.restart_backoff_seconds, 10);
        assert!(!config.relay.auto_forward);
        assert_eq!(config.locator.probe_limit, 100);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.relay.default_interval_seconds = 60;
        config.locator.probe_limit = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("bot_token")));
        assert!(errors.iter().any(|e| e.contains("owner_id")));
        assert!(errors.iter().any(|e| e.contains("default_interval_seconds")));
        assert!(errors.iter().any(|e| e.contains("probe_limit")));
    }

    #[test]
    fn test_privileged_ids_include_owner_once() {
        let mut config = valid_config();
        config.relay.admin_ids = vec![7, 42];
        assert_eq!(config.privileged_ids(), vec![7, 42]);

        config.relay.admin_ids = vec![7];
        assert_eq!(config.privileged_ids(), vec![7, 42]);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "telegram:\n  bot_token: \"1:xyz\"\nrelay:\n  owner_id: 5\n  admin_ids: [5, 6]\n  source_feeds: [\"-1001\", \"news\"]\n  auto_forward: true\nlocator:\n  probe_limit: 150"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.telegram.bot_token, "1:xyz");
        assert_eq!(config.relay.owner_id, 5);
        assert_eq!(config.relay.admin_ids, vec![5, 6]);
        assert_eq!(config.relay.source_feeds, vec!["-1001".to_string(), "news".to_string()]);
        assert!(config.relay.auto_forward);
        assert_eq!(config.locator.probe_limit, 150);
        // untouched sections keep their defaults
        assert_eq!(config.locator.default_start, 1000);
        assert_eq!(config.database.max_connections, 1);
    }
}
