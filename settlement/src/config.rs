//! Configuration for the settlement engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Wallet store data directory
    pub ledger_data_dir: PathBuf,

    /// Retry configuration
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "settlement-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger_data_dir: PathBuf::from("./data/wallet"),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after a lost version race before failing with Conflict
    ///
    /// The per-user guard already serializes same-user operations, so
    /// conflicts are the backstop for writers outside the guard.
    pub max_cas_retries: u32,

    /// Total attempts against a transiently failing store
    pub store_attempts: u32,

    /// Base backoff between store attempts (milliseconds, grows linearly)
    pub store_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: 3,
            store_attempts: 3,
            store_backoff_ms: 50,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DIR") {
            config.ledger_data_dir = PathBuf::from(dir);
        }

        if let Ok(retries) = std::env::var("SETTLEMENT_MAX_CAS_RETRIES") {
            config.retry.max_cas_retries = retries
                .parse()
                .map_err(|_| crate::Error::Config(format!("Bad SETTLEMENT_MAX_CAS_RETRIES: {}", retries)))?;
        }

        if let Ok(backoff) = std::env::var("SETTLEMENT_STORE_BACKOFF_MS") {
            config.retry.store_backoff_ms = backoff
                .parse()
                .map_err(|_| crate::Error::Config(format!("Bad SETTLEMENT_STORE_BACKOFF_MS: {}", backoff)))?;
        }

        Ok(config)
    }
}
