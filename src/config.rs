//! Configuration management for fieldnote
//!
//! This module handles loading, parsing, and validation of configuration files.

use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, CONFIG_GENERATED, DEFAULT_PULL_INTERVAL_SECS, DEFAULT_REMOTE_TIMEOUT_SECS,
    LOCAL_CONFIG_FILE_NAME, MAX_PULL_INTERVAL_SECS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log levels accepted in `[logging] level`.
const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between background pulls. The first pull runs at startup.
    pub pull_interval_secs: u64,
    /// Push as soon as a local write is queued
    pub push_on_change: bool,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the REST API, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub api_token_env: String,
    /// Environment variable holding the signed-in user id
    pub user_id_env: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; defaults to `<data dir>/fieldnote/replica.db`
    pub database_path: Option<PathBuf>,
    /// Keep the replica in memory only (nothing survives a restart)
    pub in_memory: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// One of off, error, warn, info, debug, trace
    pub level: String,
    /// Also write log lines to a file under the data directory
    pub file: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_interval_secs: DEFAULT_PULL_INTERVAL_SECS,
            push_on_change: true,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            api_token_env: "FIELDNOTE_API_TOKEN".to_string(),
            user_id_env: "FIELDNOTE_USER_ID".to_string(),
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            file: true,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LoggingConfig {
    /// Level filter for the logger; `off` when logging is disabled.
    pub fn level_filter(&self) -> log::LevelFilter {
        if !self.enabled {
            return log::LevelFilter::Off;
        }
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl StorageConfig {
    /// Resolved database path, or `None` for an in-memory replica.
    pub fn resolved_database_path(&self) -> Result<Option<PathBuf>> {
        if self.in_memory {
            return Ok(None);
        }
        match &self.database_path {
            Some(path) => Ok(Some(path.clone())),
            None => Ok(Some(Config::get_data_dir()?.join("replica.db"))),
        }
    }
}

impl Config {
    /// Load configuration from file or return defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file();

        if let Some(path) = config_path {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in order of precedence
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check current directory
        let current_dir_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if current_dir_config.exists() {
            return Some(current_dir_config);
        }

        // 2. Check XDG config directory
        let xdg_config = dirs::config_dir()?.join(APP_NAME).join(CONFIG_FILE_NAME);
        xdg_config.exists().then_some(xdg_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate sync interval
        if self.sync.pull_interval_secs == 0 {
            anyhow::bail!("pull_interval_secs must be at least 1");
        }
        if self.sync.pull_interval_secs > MAX_PULL_INTERVAL_SECS {
            anyhow::bail!(
                "pull_interval_secs cannot exceed {} (1 hour), got {}",
                MAX_PULL_INTERVAL_SECS,
                self.sync.pull_interval_secs
            );
        }

        // Validate remote settings
        let base_url = self.remote.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("base_url must start with http:// or https://, got '{}'", self.remote.base_url);
        }
        if self.remote.api_token_env.trim().is_empty() {
            anyhow::bail!("api_token_env cannot be empty");
        }
        if self.remote.user_id_env.trim().is_empty() {
            anyhow::bail!("user_id_env cannot be empty");
        }
        if self.remote.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }

        // Validate logging
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Unknown log level '{}'. Expected one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    /// Generate default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

        // Add header comment
        let header = format!(
            "# fieldnote configuration file\n# Generated on {}\n\n",
            chrono::Local::now().format("%Y-%m-%d")
        );

        let full_content = header + &toml_content;

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(&path, full_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        println!("{}: {}", CONFIG_GENERATED, path.as_ref().display());
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn get_xdg_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
            .map(|dir| dir.join(APP_NAME))
    }

    /// Get the default config file path
    pub fn get_default_config_path() -> Result<PathBuf> {
        Ok(Self::get_xdg_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Directory for the database and log file
    pub fn get_data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
            .map(|dir| dir.join(APP_NAME))
    }
}
