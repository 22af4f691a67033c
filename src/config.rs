//! Configuration module for blobvault.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, VaultError};

/// Chunk storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for chunk storage.
    #[serde(default = "default_chunk_root")]
    pub chunk_root: String,
    /// Chunk payload size in bytes.
    ///
    /// Every engine instance that writes or reads a shared store must use
    /// the same value; mismatched chunk sizes across instances sharing one
    /// store are undefined behavior.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

fn default_chunk_root() -> String {
    "data/chunks".to_string()
}

fn default_chunk_size() -> usize {
    crate::store::DEFAULT_CHUNK_SIZE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_root: default_chunk_root(),
            chunk_size_bytes: default_chunk_size(),
        }
    }
}

/// Metadata catalog configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Path to the SQLite catalog file.
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

fn default_catalog_path() -> String {
    "data/catalog.db".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/blobvault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chunk storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the chunk size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.storage.chunk_size_bytes == 0 {
            return Err(VaultError::Config(
                "chunk_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
