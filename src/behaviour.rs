//! Combined libp2p network behaviour: Kademlia DHT plus the stream-handler
//! transport used by the protocol framework.
//!
//! Grounded on the teacher's `network.rs` (`MyBehaviour`/`MyBehaviourEvent`,
//! `SwarmBuilder::with_new_identity()...with_behaviour(...)`), extended with
//! `libp2p::stream` — the Rust-ecosystem analogue of `go-libp2p`'s
//! `host.SetStreamHandler`/`host.NewStream` used throughout
//! `core/StreamHandlers.go`.

use libp2p::kad::{store::MemoryStore, Behaviour as Kademlia, Event as KademliaEvent};
use libp2p::swarm::NetworkBehaviour;

#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "OverlayEvent")]
pub struct OverlayBehaviour {
    pub kad: Kademlia<MemoryStore>,
    pub streams: libp2p::stream::Behaviour,
}

#[derive(Debug)]
pub enum OverlayEvent {
    Kad(KademliaEvent),
}

impl From<KademliaEvent> for OverlayEvent {
    fn from(event: KademliaEvent) -> Self {
        OverlayEvent::Kad(event)
    }
}

impl From<void::Void> for OverlayEvent {
    fn from(event: void::Void) -> Self {
        match event {}
    }
}
