//! Exercises dispersal over real connectivity: two nodes connect, node A
//! disperses a payload, and node B — the only peer `pick_peer()` can ever
//! draw — ends up holding the data block and every fragment.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dsn::config::{Config, ConnectivityConfig, StorageConfig};
use dsn::connectivity::ConnectivityHandle;
use dsn::handlers::StoreHandler;
use dsn::persistence::{SqliteSink, StorageSink};
use dsn::streams::Framework;
use libp2p::identity::Keypair;
use libp2p::Multiaddr;

const NODE_A_PORT: u16 = 18_301;
const NODE_B_PORT: u16 = 18_302;

fn test_config(port: u16, data_dir: std::path::PathBuf) -> Config {
    Config {
        port,
        namespace: "dsn-test".to_string(),
        data_dir,
        bootstrap_peers: vec![],
        announce_addresses: vec![],
        storage: StorageConfig::default(),
        connectivity: ConnectivityConfig::default(),
        peer_blacklist: HashSet::new(),
        metrics_port: port + 1000,
    }
}

#[tokio::test]
async fn disperse_reaches_the_only_connected_peer() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let config_a = Arc::new(test_config(NODE_A_PORT, dir_a.path().to_path_buf()));
    let config_b = Arc::new(test_config(NODE_B_PORT, dir_b.path().to_path_buf()));

    let node_a = ConnectivityHandle::spawn(config_a.clone(), Keypair::generate_ed25519())
        .await
        .unwrap();
    let node_b = ConnectivityHandle::spawn(config_b.clone(), Keypair::generate_ed25519())
        .await
        .unwrap();

    let sink = Arc::new(SqliteSink::open_in_memory().unwrap());
    let mut framework_b = Framework::new(node_b.control.clone());
    framework_b
        .register(Arc::new(StoreHandler::new(sink.clone())))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let addr_b: Multiaddr = format!(
        "/ip4/127.0.0.1/tcp/{NODE_B_PORT}/p2p/{}",
        node_b.local_peer_id
    )
    .parse()
    .unwrap();
    node_a
        .add_peer_address(node_b.local_peer_id, addr_b)
        .await
        .unwrap();
    node_a.dial(node_b.local_peer_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let connected = node_a.connected_peers().await.unwrap();
    assert_eq!(connected, vec![node_b.local_peer_id]);

    let hash = dsn::dispersal::disperse(&node_a, b"network integration payload")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let block = sink.get_block(&hash).unwrap();
    assert!(block.is_some(), "data block never reached the only peer");

    let fragments = sink.get_fragments(&hash).unwrap();
    assert_eq!(
        fragments.len(),
        config_a.storage.total_shares as usize,
        "all shares should land on the single connected peer"
    );
}
