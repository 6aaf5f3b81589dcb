//! Exercises the metrics HTTP surface end to end: starts a node with no
//! bootstrap peers, serves `/health` and `/metrics`, and checks the shapes
//! the dashboard/ops tooling depends on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dsn::config::{Config, ConnectivityConfig, StorageConfig};
use dsn::connectivity::ConnectivityHandle;
use libp2p::identity::Keypair;

const TEST_METRICS_PORT: u16 = 18_199;

fn test_config(data_dir: std::path::PathBuf) -> Config {
    Config {
        port: 0,
        namespace: "dsn-test".to_string(),
        data_dir,
        bootstrap_peers: vec![],
        announce_addresses: vec![],
        storage: StorageConfig::default(),
        connectivity: ConnectivityConfig::default(),
        peer_blacklist: HashSet::new(),
        metrics_port: TEST_METRICS_PORT,
    }
}

#[tokio::test]
async fn health_and_metrics_endpoints_respond() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path().to_path_buf()));
    let keypair = Keypair::generate_ed25519();

    let connectivity = ConnectivityHandle::spawn(config.clone(), keypair)
        .await
        .unwrap();

    tokio::spawn(dsn::metrics::serve(connectivity.clone(), TEST_METRICS_PORT));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{TEST_METRICS_PORT}");

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let metrics: serde_json::Value = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["connected_peers"], 0);

    let peers: serde_json::Value = client
        .get(format!("{base}/metrics/peers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(peers.as_array().unwrap().is_empty());
}
