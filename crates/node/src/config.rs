//! Node Configuration

use anyhow::Context;
use beacon_runtime::BeaconConfig;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where published rounds are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Every round appended to the on-disk ledger
    Ledger,
    /// Only the latest round, in memory
    Memory,
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP RPC bind address
    pub rpc_addr: String,
    /// Data directory for persistent state
    pub data_dir: PathBuf,
    pub storage: StorageKind,
    /// Per-member time unit of the round timeout
    pub round_timeout_unit_ms: u64,
    /// Upper bound on setup's wait for the first round
    pub ready_timeout_secs: u64,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_addr: "127.0.0.1:7770".to_string(),
            data_dir: PathBuf::from("./data"),
            storage: StorageKind::Ledger,
            round_timeout_unit_ms: beacon_runtime::DEFAULT_ROUND_TIMEOUT_UNIT_MS,
            ready_timeout_secs: beacon_runtime::DEFAULT_READY_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("couldn't read config file {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {:?}", path))?;
        Ok(config)
    }

    pub fn beacon_config(&self) -> BeaconConfig {
        BeaconConfig {
            round_timeout_unit: Duration::from_millis(self.round_timeout_unit_ms),
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"storage": "memory", "ready_timeout_secs": 5}}"#).unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.ready_timeout_secs, 5);
        assert_eq!(config.rpc_addr, NodeConfig::default().rpc_addr);

        let beacon = config.beacon_config();
        assert_eq!(beacon.ready_timeout, Duration::from_secs(5));
        assert_eq!(beacon.round_timeout_unit, Duration::from_secs(1));
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"storage": "tape"}}"#).unwrap();
        assert!(NodeConfig::load(file.path()).is_err());

        assert!(NodeConfig::load(Path::new("/nonexistent/beacon.json")).is_err());
    }
}
