//! Configuration infrastructure
//!
//! Settings are read from a JSON file in the user config directory and can be
//! overridden per key through `WIKI_HARVEST_<SECTION>__<KEY>` environment
//! variables. Missing keys fall back to the values in [`defaults`].

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote catalog connection
    pub remote: RemoteConfig,

    /// Local store location
    pub store: StoreConfig,

    /// Backfill pass tuning
    pub backfill: BackfillConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote MediaWiki API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Action API endpoint, e.g. `https://en.wikipedia.org/w/api.php`
    pub api_url: String,

    /// Namespace to enumerate (828 = `Module:`)
    pub namespace: i32,

    /// Maximum acceptable replication lag in seconds (`maxlag`)
    pub max_lag_seconds: u32,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Client-side request pacing
    pub max_requests_per_second: u32,

    /// Attempts per request when the server signals lag or overload
    pub max_retries: u32,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Local database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection URL
    pub database_url: String,

    /// Pool size for file databases (in-memory databases always use one)
    pub max_connections: u32,
}

/// Backfill pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Ids per attribute lookup; clamped to what the client accepts
    pub attribute_batch_size: usize,

    /// In-flight content lookups (1 = strictly sequential)
    pub content_concurrency: usize,

    /// Emit a progress line every N items
    pub progress_every: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; defaults to `<data dir>/wiki-harvest/logs`
    pub directory: Option<PathBuf>,

    /// Log file name inside the directory
    pub file_name: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            namespace: defaults::NAMESPACE,
            max_lag_seconds: defaults::MAX_LAG_SECONDS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            user_agent: defaults::user_agent(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let database_url = ConfigManager::get_app_data_dir().map_or_else(
            |_| format!("sqlite:{}", defaults::DATABASE_FILE),
            |dir| format!("sqlite:{}", dir.join(defaults::DATABASE_FILE).display()),
        );
        Self {
            database_url,
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            attribute_batch_size: defaults::ATTRIBUTE_BATCH_SIZE,
            content_concurrency: defaults::CONTENT_CONCURRENCY,
            progress_every: defaults::PROGRESS_EVERY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Environment variable prefix for per-key overrides
    pub const ENV_PREFIX: &'static str = "WIKI_HARVEST";

    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the default config file location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Whether the config file is already on disk
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load configuration, writing a default file first if none exists.
    /// Environment overrides are applied on top of the file contents.
    ///
    /// Runs before logging is set up, so it reports nothing itself; callers
    /// check [`Self::exists`] beforehand and log once the subscriber is in.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.exists() {
            self.save_config(&AppConfig::default()).await?;
        }

        Self::layered(&self.config_path)
    }

    /// File source plus environment source, deserialized over the defaults
    fn layered(path: &Path) -> Result<AppConfig> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize::<AppConfig>()
            .context("Configuration file has an unexpected shape")
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "wiki-harvest";
    pub const CONFIG_FILE: &str = "config.json";
    pub const DATABASE_FILE: &str = "catalog.db";

    /// English Wikipedia Action API
    pub const API_URL: &str = "https://en.wikipedia.org/w/api.php";

    /// `Module:` namespace
    pub const NAMESPACE: i32 = 828;

    /// Waiting about three seconds of replica lag is acceptable
    pub const MAX_LAG_SECONDS: u32 = 3;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;
    pub const MAX_RETRIES: u32 = 3;

    /// Anonymous clients may pass at most 50 `pageids` per query
    pub const ATTRIBUTE_BATCH_SIZE: usize = 50;
    pub const CONTENT_CONCURRENCY: usize = 1;
    pub const PROGRESS_EVERY: usize = 100;

    /// In-memory SQLite gives every connection its own database, so the pool
    /// size only applies to file databases.
    pub const DB_MAX_CONNECTIONS: u32 = 4;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "wiki-harvest.log";

    pub fn user_agent() -> String {
        format!(
            "wiki-harvest/{} (read-only catalog mirror)",
            env!("CARGO_PKG_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_target_module_namespace() {
        let config = AppConfig::default();
        assert_eq!(config.remote.namespace, 828);
        assert_eq!(config.remote.max_lag_seconds, 3);
        assert_eq!(config.backfill.attribute_batch_size, 50);
        assert_eq!(config.backfill.content_concurrency, 1);
        assert!(config.store.database_url.starts_with("sqlite:"));
    }

    #[tokio::test]
    async fn load_creates_default_file() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));
        assert!(!manager.exists());

        let config = manager.load_config().await?;

        assert!(manager.exists());
        assert_eq!(config.remote.api_url, defaults::API_URL);
        Ok(())
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults_for_missing_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "remote": { "namespace": 10 }, "backfill": { "attribute_batch_size": 20 } }"#,
        )?;

        let config = ConfigManager::with_path(&path).load_config().await?;

        assert_eq!(config.remote.namespace, 10);
        assert_eq!(config.remote.max_retries, defaults::MAX_RETRIES);
        assert_eq!(config.backfill.attribute_batch_size, 20);
        assert_eq!(config.backfill.progress_every, defaults::PROGRESS_EVERY);
        Ok(())
    }

    #[tokio::test]
    async fn save_then_load_preserves_values() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("config.json"));

        let mut config = AppConfig::default();
        config.remote.api_url = "https://test.wikipedia.org/w/api.php".to_string();
        config.logging.file_output = false;
        manager.save_config(&config).await?;

        let loaded = manager.load_config().await?;
        assert_eq!(loaded.remote.api_url, "https://test.wikipedia.org/w/api.php");
        assert!(!loaded.logging.file_output);
        Ok(())
    }
}
