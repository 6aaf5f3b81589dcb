//! Node configuration.
//!
//! Unlike the original Go implementation's process-wide mutable `cfg`
//! singleton (`config.Load()` / `config.Get()`), this is built once into an
//! immutable [`Config`] value and threaded through constructors. Nothing in
//! this crate reaches for ambient global configuration state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use libp2p::PeerId;
use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

const DEFAULT_PORT: u16 = 11111;
const DEFAULT_NAMESPACE: &str = "dsn";

/// Storage-side dispersal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Total number of Shamir shares generated per key (`n`).
    pub total_shares: u8,
    /// Minimum shares required to reconstruct a key (`k`).
    pub threshold: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            total_shares: 5,
            threshold: 3,
        }
    }
}

/// Peer-connectivity engine tuning knobs, grounded on `core/PeerDiscovery.go`.
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    pub health_check_interval: Duration,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub min_connections: usize,
    pub discovery_interval: Duration,
    pub stale_peer_horizon: Duration,
    pub enable_discovery: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            min_connections: 3,
            discovery_interval: Duration::from_secs(30),
            stale_peer_horizon: Duration::from_secs(30 * 60),
            enable_discovery: true,
        }
    }
}

/// Immutable node configuration, built once at startup from environment
/// variables and CLI overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub namespace: String,
    pub data_dir: PathBuf,
    pub bootstrap_peers: Vec<String>,
    pub announce_addresses: Vec<String>,
    pub storage: StorageConfig,
    pub connectivity: ConnectivityConfig,
    /// Peers excluded from dispersal's `pick_peer()` — configurable, never a
    /// hardcoded admin multiaddress.
    pub peer_blacklist: HashSet<PeerId>,
    pub metrics_port: u16,
}

impl Config {
    /// Build configuration from the `DSN_*` environment variables, applying
    /// the documented defaults where unset.
    pub fn from_env() -> DfsResult<Self> {
        let port = std::env::var("DSN_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let namespace =
            std::env::var("DSN_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());

        let data_dir = std::env::var("DSN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let bootstrap_peers = std::env::var("DSN_BOOTSTRAP_PEERS")
            .map(|v| split_csv(&v))
            .unwrap_or_default();

        let announce_addresses = std::env::var("DSN_ANNOUNCE_ADDRESSES")
            .map(|v| split_csv(&v))
            .unwrap_or_default();

        Ok(Config {
            port,
            namespace,
            data_dir,
            bootstrap_peers,
            announce_addresses,
            storage: StorageConfig::default(),
            connectivity: ConnectivityConfig::default(),
            peer_blacklist: HashSet::new(),
            metrics_port: port + 1,
        })
    }

    /// Apply CLI overrides on top of the environment-derived defaults. Only
    /// `Some` fields take precedence; unset flags leave the env-var value in
    /// place.
    pub fn apply_overrides(
        &mut self,
        port: Option<u16>,
        namespace: Option<String>,
        data_dir: Option<PathBuf>,
    ) {
        if let Some(port) = port {
            self.port = port;
            self.metrics_port = port + 1;
        }
        if let Some(namespace) = namespace {
            self.namespace = namespace;
        }
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
    }

    pub fn id_file_path(&self) -> PathBuf {
        self.data_dir.join("ID.json")
    }

    pub fn bootstrap_file_path(&self) -> PathBuf {
        self.data_dir.join("Bootstrap.txt")
    }

    pub fn has_bootstrap_peers(&self) -> bool {
        !self.bootstrap_peers.is_empty()
    }

    pub fn has_announce_addresses(&self) -> bool {
        !self.announce_addresses.is_empty()
    }

    /// Validate k <= n and k >= 1, as required by Shamir's scheme.
    pub fn validate(&self) -> DfsResult<()> {
        if self.storage.threshold == 0 || self.storage.threshold > self.storage.total_shares {
            return Err(DfsError::Config(format!(
                "invalid threshold {} for {} total shares",
                self.storage.threshold, self.storage.total_shares
            )));
        }
        Ok(())
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ensure the data directory exists.
pub fn ensure_data_dir(path: &Path) -> DfsResult<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let storage = StorageConfig::default();
        assert_eq!(storage.total_shares, 5);
        assert_eq!(storage.threshold, 3);
    }

    #[test]
    fn validate_rejects_threshold_above_total() {
        let mut cfg = Config {
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
            data_dir: PathBuf::from("."),
            bootstrap_peers: vec![],
            announce_addresses: vec![],
            storage: StorageConfig {
                total_shares: 3,
                threshold: 5,
            },
            connectivity: ConnectivityConfig::default(),
            peer_blacklist: HashSet::new(),
            metrics_port: DEFAULT_PORT + 1,
        };
        assert!(cfg.validate().is_err());
        cfg.storage.threshold = 2;
        assert!(cfg.validate().is_ok());
    }
}
