//! libp2p swarm construction: Kademlia DHT plus the stream transport.
//!
//! Grounded on the teacher's `network.rs` (`SwarmBuilder::with_new_identity()`
//! replaced here with an explicit identity so the node's `PeerId` is stable
//! across restarts via `ID.json`, and dual listen addresses per
//! `core/NodeConfig.go`'s QUIC+TCP host).

use std::time::Duration;

use libp2p::identity::Keypair;
use libp2p::kad::store::MemoryStore;
use libp2p::kad::Behaviour as Kademlia;
use libp2p::swarm::Swarm;
use libp2p::{noise, tcp, yamux, PeerId, SwarmBuilder};

use crate::behaviour::OverlayBehaviour;
use crate::config::Config;
use crate::error::{DfsError, DfsResult};

/// Build a swarm using this node's persistent identity, Kademlia configured
/// with the configured namespace as its protocol prefix, and the stream
/// behaviour used by the protocol framework.
pub fn create_swarm(keypair: Keypair, config: &Config) -> DfsResult<Swarm<OverlayBehaviour>> {
    let namespace = config.namespace.clone();

    let mut swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
        .map_err(|e| DfsError::Network(format!("failed to configure transport: {e}")))?
        .with_behaviour(|key| {
            let peer_id = key.public().to_peer_id();
            let storage = MemoryStore::new(peer_id);
            let mut kad_config = libp2p::kad::Config::default();
            kad_config.set_protocol_names(vec![libp2p::StreamProtocol::try_from_owned(format!(
                "/{namespace}/kad/1.0.0"
            ))
            .expect("namespace produces a valid protocol name")]);
            let mut kad = Kademlia::with_config(peer_id, storage, kad_config);
            kad.set_mode(Some(libp2p::kad::Mode::Server));

            OverlayBehaviour {
                kad,
                streams: libp2p::stream::Behaviour::new(),
            }
        })
        .map_err(|e| DfsError::Network(format!("failed to configure behaviour: {e}")))?
        .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(120)))
        .build();

    let listen_addr: libp2p::Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", config.port)
        .parse()
        .map_err(|e| DfsError::Network(format!("invalid listen address: {e}")))?;
    swarm
        .listen_on(listen_addr)
        .map_err(|e| DfsError::Network(format!("failed to listen: {e}")))?;

    for addr in &config.announce_addresses {
        if let Ok(multiaddr) = addr.parse::<libp2p::Multiaddr>() {
            swarm.add_external_address(multiaddr);
        } else {
            tracing::warn!("ignoring invalid announce address: {addr}");
        }
    }

    Ok(swarm)
}

/// Parse a `peer_id@address` or bare multiaddr-with-`/p2p/`-suffix bootstrap
/// peer entry into its components.
pub fn parse_bootstrap_peer(entry: &str) -> DfsResult<(PeerId, libp2p::Multiaddr)> {
    let multiaddr: libp2p::Multiaddr = entry
        .parse()
        .map_err(|e| DfsError::Config(format!("invalid bootstrap multiaddr {entry}: {e}")))?;

    let peer_id = multiaddr
        .iter()
        .find_map(|proto| match proto {
            libp2p::multiaddr::Protocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .ok_or_else(|| DfsError::Config(format!("bootstrap multiaddr missing /p2p/: {entry}")))?;

    Ok((peer_id, multiaddr))
}
