//! Configuration for the points ledger

use crate::policy::PolicyTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// Reward-day boundary: minutes east of UTC
    pub timezone_offset_minutes: i32,

    /// Per-source earning limits
    #[serde(default)]
    pub policy: PolicyTable,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Lock and retry tuning
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/points-ledger"),
            service_name: "points-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
            timezone_offset_minutes: 0,
            policy: PolicyTable::default(),
            rocksdb: RocksDbConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

/// Per-user lock and commit retry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How long an Award/Spend may wait for the user's lock (ms)
    pub lock_timeout_ms: u64,

    /// Bounded commit retry attempts before surfacing a transient error
    pub commit_retry_attempts: u32,

    /// Base backoff between commit retries (ms, doubled each attempt)
    pub commit_retry_base_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            commit_retry_attempts: 3,
            commit_retry_base_ms: 10,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("POINTS_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("POINTS_LEDGER_METRICS_ADDR") {
            config.metrics_listen_addr = addr;
        }

        if let Ok(offset) = std::env::var("POINTS_LEDGER_TZ_OFFSET_MINUTES") {
            config.timezone_offset_minutes = offset.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid timezone offset: {}", offset))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "points-ledger");
        assert_eq!(config.timezone_offset_minutes, 0);
        assert_eq!(config.runtime.commit_retry_attempts, 3);
        assert_eq!(config.policy.get(Source::Game).per_action_cap, 50);
    }
}
