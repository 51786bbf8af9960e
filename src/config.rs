//! Configuration loading and logging setup
use super::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const DB_PATH_ENV: &str = "CUSTODY_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "CUSTODY_LOG_LEVEL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the sled database holding both the projection and the ledger.
    pub path: PathBuf,
    /// Remove the database when it is dropped.
    pub temporary: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("custody.db"),
            temporary: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CustodyConfig {
    /// Load a TOML file, then apply `CUSTODY_DB_PATH` and `CUSTODY_LOG_LEVEL` overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&contents)?.with_env_overrides())
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }
        self
    }

    /// Temporary database in a fresh location, removed on drop.
    pub fn temporary() -> Self {
        Self {
            storage: StorageConfig {
                temporary: true,
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        let config = sled::Config::new().temporary(self.storage.temporary);
        // sled picks a unique location for temporary databases without a path
        if self.storage.temporary {
            config.open()
        } else {
            config.path(&self.storage.path).open()
        }
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to the configured
/// level. Does nothing if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
