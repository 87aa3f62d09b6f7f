//! Configuration management for rcaledger.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::eviction::{EvictionPolicy, DEFAULT_MAX_REMARKS_PER_AWB};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "rcaledger";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "ledger.db";

/// Prefix for environment overrides, e.g. `RCALEDGER_LEDGER__MAX_BATCH_SIZE`.
pub const ENV_PREFIX: &str = "RCALEDGER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RCALEDGER_`, sections split on `__`)
/// 2. TOML config file at `~/.config/rcaledger/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Remark ledger limits and validation.
    pub ledger: LedgerConfig,
    /// Archive and audit retention.
    pub retention: RetentionConfig,
    /// Spreadsheet export.
    pub export: ExportConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/rcaledger/ledger.db`
    pub database_path: Option<PathBuf>,
    /// How long to wait for another writer's lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Ledger limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Live remarks kept per AWB before the oldest is evicted.
    pub max_remarks_per_awb: usize,
    /// AWBs accepted per bulk submission; the rest are dropped.
    pub max_batch_size: usize,
    /// Optional regex every AWB must match.
    pub awb_pattern: Option<String>,
}

/// Retention for the archive and login audit. Live remarks are never pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Age in days after which archive and audit rows are pruned.
    /// Set to 0 to keep them forever.
    pub retention_days: u32,
}

/// Export-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// File name used when no output path is given.
    pub file_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_remarks_per_awb: DEFAULT_MAX_REMARKS_PER_AWB,
            max_batch_size: 10_000,
            awb_pattern: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "RCA_Full_Report.xlsx".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        EvictionPolicy::new(self.ledger.max_remarks_per_awb)?;

        if self.ledger.max_batch_size == 0 {
            return Err(Error::ConfigValidation {
                message: "max_batch_size must be greater than 0".to_string(),
            });
        }

        if let Some(pattern) = &self.ledger.awb_pattern {
            if regex::Regex::new(pattern).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("invalid awb_pattern regex: {pattern}"),
                });
            }
        }

        if self.export.file_name.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "export file_name must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    /// Get the retention window, or `None` if retention is disabled.
    #[must_use]
    pub fn retention(&self) -> Option<chrono::Duration> {
        if self.retention.retention_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.retention.retention_days)))
        }
    }
}
