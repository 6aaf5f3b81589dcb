//! Peer-Connectivity Engine: an actor that isolates the non-`Send` libp2p
//! `Swarm` on a dedicated thread, reachable through a clone-able handle, plus
//! the four background loops that keep the node's connection set healthy
//! under churn.
//!
//! Grounded on the teacher's `network_actor.rs` (`NetworkActor`/`NetworkHandle`,
//! the `std::thread::spawn` + per-thread `tokio::runtime::Runtime` +
//! `LocalSet` pattern for hosting a non-`Send` `Swarm`), generalized from a
//! DHT put/get interface to the connection-health tracking and
//! bootstrap/discovery/reconnection loops described by the original's
//! `core/Host.go` and `core/PeerManager.go`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::StreamExt;
use libp2p::kad::{QueryId, QueryResult};
use libp2p::swarm::SwarmEvent;
use libp2p::{Multiaddr, PeerId, Swarm};
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behaviour::{OverlayBehaviour, OverlayEvent};
use crate::config::Config;
use crate::error::DfsError;
use crate::network;

/// Coarse signal of how reliable a peer has been, derived from how long its
/// current connection (or absence of one) has persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionQuality {
    Unknown,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ConnectionQuality {
    fn from_duration(connected_for: Duration) -> Self {
        if connected_for > Duration::from_secs(3600) {
            ConnectionQuality::Excellent
        } else if connected_for > Duration::from_secs(600) {
            ConnectionQuality::Good
        } else if connected_for > Duration::from_secs(60) {
            ConnectionQuality::Fair
        } else {
            ConnectionQuality::Unknown
        }
    }

    /// `quality >= Fair`, used by `NetworkStats::healthy_connections`.
    fn is_healthy(self) -> bool {
        matches!(
            self,
            ConnectionQuality::Fair | ConnectionQuality::Good | ConnectionQuality::Excellent
        )
    }
}

/// Per-peer connection history, refreshed on every swarm connection event and
/// consulted by the reconnection and health-monitor loops.
#[derive(Debug, Clone)]
pub struct PeerHealthInfo {
    pub last_seen: Instant,
    pub last_connect_time: Option<Instant>,
    pub connect_attempts: u32,
    pub failed_attempts: u32,
    pub is_connected: bool,
    pub connection_quality: ConnectionQuality,
    pub addresses: Vec<Multiaddr>,
}

impl Default for PeerHealthInfo {
    fn default() -> Self {
        PeerHealthInfo {
            last_seen: Instant::now(),
            last_connect_time: None,
            connect_attempts: 0,
            failed_attempts: 0,
            is_connected: false,
            connection_quality: ConnectionQuality::Unknown,
            addresses: Vec::new(),
        }
    }
}

pub type HealthMap = Arc<RwLock<HashMap<PeerId, PeerHealthInfo>>>;

/// Aggregated snapshot derived from `PeerHealth` and the substrate, per
/// `spec.md` §3.
#[derive(Debug, Clone)]
pub struct NetworkStats {
    pub local_peer_id: PeerId,
    /// Distinct peers with an open connection right now.
    pub connected_peers: usize,
    /// Every peer ever tracked in the health map, connected or not.
    pub known_peers: usize,
    /// Total open connections (a peer may hold more than one).
    pub total_connections: usize,
    /// Number of entries across the Kademlia routing table's k-buckets.
    pub routing_table_size: usize,
    /// Tracked peers currently without an open connection.
    pub disconnected_peers: usize,
    /// Connected peers whose `connection_quality` is at least `Fair`.
    pub healthy_connections: usize,
}

enum ConnectivityMessage {
    Bootstrap {
        response_tx: oneshot::Sender<Result<(), DfsError>>,
    },
    GetConnectedPeers {
        response_tx: oneshot::Sender<Vec<PeerId>>,
    },
    GetNetworkStats {
        response_tx: oneshot::Sender<NetworkStats>,
    },
    AddPeerAddress {
        peer_id: PeerId,
        address: Multiaddr,
        response_tx: oneshot::Sender<Result<(), DfsError>>,
    },
    Dial {
        peer_id: PeerId,
        response_tx: oneshot::Sender<Result<(), DfsError>>,
    },
    FindClosestPeers {
        target: PeerId,
        response_tx: oneshot::Sender<Vec<PeerId>>,
    },
    Shutdown,
}

/// Clone-able front for the connectivity actor. Safe to share across tasks
/// and across the stream-handler framework.
#[derive(Clone)]
pub struct ConnectivityHandle {
    tx: mpsc::UnboundedSender<ConnectivityMessage>,
    pub health: HealthMap,
    pub control: libp2p::stream::Control,
    pub local_peer_id: PeerId,
    pub config: Arc<Config>,
    cancellation: CancellationToken,
}

impl ConnectivityHandle {
    pub async fn spawn(config: Arc<Config>, keypair: libp2p::identity::Keypair) -> Result<Self> {
        let mut swarm = network::create_swarm(keypair, &config)?;
        let local_peer_id = *swarm.local_peer_id();
        let control = swarm.behaviour().streams.new_control();

        for entry in &config.bootstrap_peers {
            if let Ok((peer_id, addr)) = network::parse_bootstrap_peer(entry) {
                swarm.behaviour_mut().kad.add_address(&peer_id, addr);
            } else {
                warn!("ignoring malformed bootstrap peer entry: {entry}");
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let health: HealthMap = Arc::new(RwLock::new(HashMap::new()));
        let cancellation = CancellationToken::new();

        let actor = ConnectivityActor {
            swarm,
            rx,
            health: health.clone(),
            pending_closest: HashMap::new(),
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("failed to start connectivity runtime");
            let local_set = tokio::task::LocalSet::new();
            local_set.spawn_local(async move {
                let _ = ready_tx.send(());
                actor.run().await;
            });
            rt.block_on(local_set);
        });
        let _ = ready_rx.await;

        let handle = ConnectivityHandle {
            tx,
            health,
            control,
            local_peer_id,
            config,
            cancellation,
        };

        spawn_background_loops(handle.clone());

        Ok(handle)
    }

    pub async fn bootstrap(&self) -> Result<(), DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::Bootstrap { response_tx })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))?
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::GetConnectedPeers { response_tx })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))
    }

    /// Copy-out lookup of a single peer's tracked health record.
    pub async fn peer_health(&self, peer_id: &PeerId) -> Option<PeerHealthInfo> {
        self.health.read().await.get(peer_id).cloned()
    }

    pub async fn network_stats(&self) -> Result<NetworkStats, DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::GetNetworkStats { response_tx })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))
    }

    pub async fn add_peer_address(
        &self,
        peer_id: PeerId,
        address: Multiaddr,
    ) -> Result<(), DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::AddPeerAddress {
                peer_id,
                address,
                response_tx,
            })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))?
    }

    pub async fn dial(&self, peer_id: PeerId) -> Result<(), DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::Dial {
                peer_id,
                response_tx,
            })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))?
    }

    /// Bounded Kademlia closest-peers lookup for `target`, used by the
    /// discovery loop's random-walk and find-peer steps.
    pub async fn find_closest_peers(&self, target: PeerId) -> Result<Vec<PeerId>, DfsError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ConnectivityMessage::FindClosestPeers {
                target,
                response_tx,
            })
            .map_err(|_| DfsError::Network("connectivity actor unavailable".into()))?;
        response_rx
            .await
            .map_err(|_| DfsError::Network("connectivity actor dropped the request".into()))
    }

    /// Signals cancellation to every background loop and tells the actor to
    /// exit. Idempotent.
    pub fn stop(&self) {
        self.cancellation.cancel();
        let _ = self.tx.send(ConnectivityMessage::Shutdown);
    }

    /// Uniformly-random selection from the peers currently connected,
    /// excluding the local node and the configured blacklist. Each call is an
    /// independent draw: the same peer may legitimately be returned by
    /// consecutive calls. Returns an error if no eligible peer is connected.
    pub async fn pick_peer(&self) -> Result<PeerId, DfsError> {
        let candidates: Vec<PeerId> = self
            .connected_peers()
            .await?
            .into_iter()
            .filter(|p| *p != self.local_peer_id && !self.config.peer_blacklist.contains(p))
            .collect();

        candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| DfsError::Network("no eligible peers connected".into()))
    }
}

struct ConnectivityActor {
    swarm: Swarm<OverlayBehaviour>,
    rx: mpsc::UnboundedReceiver<ConnectivityMessage>,
    health: HealthMap,
    pending_closest: HashMap<QueryId, oneshot::Sender<Vec<PeerId>>>,
}

impl ConnectivityActor {
    async fn run(mut self) {
        info!(
            "connectivity actor starting, peer id {}",
            self.swarm.local_peer_id()
        );

        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(ConnectivityMessage::Shutdown) | None => {
                            info!("connectivity actor shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message).await,
                    }
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event).await;
                }
            }
        }
    }

    async fn handle_message(&mut self, message: ConnectivityMessage) {
        match message {
            ConnectivityMessage::Bootstrap { response_tx } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .kad
                    .bootstrap()
                    .map(|_| ())
                    .map_err(|e| DfsError::Network(format!("bootstrap failed: {e}")));
                let _ = response_tx.send(result);
            }
            ConnectivityMessage::GetConnectedPeers { response_tx } => {
                let peers = self.swarm.connected_peers().cloned().collect();
                let _ = response_tx.send(peers);
            }
            ConnectivityMessage::GetNetworkStats { response_tx } => {
                let health = self.health.read().await;
                let known_peers = health.len();
                let disconnected_peers = health.values().filter(|info| !info.is_connected).count();
                let healthy_connections = health
                    .values()
                    .filter(|info| info.is_connected && info.connection_quality.is_healthy())
                    .count();
                let routing_table_size = self
                    .swarm
                    .behaviour_mut()
                    .kad
                    .kbuckets()
                    .map(|bucket| bucket.num_entries())
                    .sum();
                let network_info = self.swarm.network_info();
                let stats = NetworkStats {
                    local_peer_id: *self.swarm.local_peer_id(),
                    connected_peers: self.swarm.connected_peers().count(),
                    known_peers,
                    total_connections: network_info.connection_counters().num_established() as usize,
                    routing_table_size,
                    disconnected_peers,
                    healthy_connections,
                };
                let _ = response_tx.send(stats);
            }
            ConnectivityMessage::AddPeerAddress {
                peer_id,
                address,
                response_tx,
            } => {
                self.swarm
                    .behaviour_mut()
                    .kad
                    .add_address(&peer_id, address.clone());
                self.health
                    .write()
                    .await
                    .entry(peer_id)
                    .or_default()
                    .addresses
                    .push(address);
                let _ = response_tx.send(Ok(()));
            }
            ConnectivityMessage::Dial { peer_id, response_tx } => {
                let opts = libp2p::swarm::dial_opts::DialOpts::peer_id(peer_id).build();
                let result = self
                    .swarm
                    .dial(opts)
                    .map_err(|e| DfsError::Network(format!("dial failed: {e}")));
                {
                    let mut health = self.health.write().await;
                    let entry = health.entry(peer_id).or_default();
                    entry.connect_attempts += 1;
                    if result.is_err() {
                        entry.failed_attempts += 1;
                    }
                }
                let _ = response_tx.send(result);
            }
            ConnectivityMessage::FindClosestPeers {
                target,
                response_tx,
            } => {
                let query_id = self.swarm.behaviour_mut().kad.get_closest_peers(target);
                self.pending_closest.insert(query_id, response_tx);
            }
            ConnectivityMessage::Shutdown => {}
        }
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<OverlayEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("listening on {address}");
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!("connection established with {peer_id}");
                let mut health = self.health.write().await;
                let entry = health.entry(peer_id).or_default();
                entry.is_connected = true;
                entry.failed_attempts = 0;
                entry.last_connect_time = Some(Instant::now());
                entry.last_seen = Instant::now();
                entry.connection_quality = ConnectionQuality::Good;
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!("connection closed with {peer_id}");
                let mut health = self.health.write().await;
                let entry = health.entry(peer_id).or_default();
                entry.is_connected = false;
            }
            SwarmEvent::Behaviour(OverlayEvent::Kad(libp2p::kad::Event::OutboundQueryProgressed {
                id,
                result: QueryResult::GetClosestPeers(result),
                step,
                ..
            })) => {
                if step.last {
                    if let Some(response_tx) = self.pending_closest.remove(&id) {
                        let peers = match result {
                            Ok(ok) => ok.peers,
                            Err(e) => e.peers,
                        };
                        let _ = response_tx.send(peers);
                    }
                }
            }
            SwarmEvent::Behaviour(event) => {
                debug!("behaviour event: {event:?}");
            }
            _ => {}
        }
    }
}

/// Spawns the four background loops described for the connectivity engine:
/// a one-shot bootstrap, an optional peer-discovery random walk, a
/// health-monitor reconciliation loop, and a reconnection loop that tops
/// connections back up to `min_connections`.
fn spawn_background_loops(handle: ConnectivityHandle) {
    let bootstrap_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = bootstrap_handle.bootstrap().await {
            warn!("initial bootstrap failed: {e}");
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        if let Err(e) = bootstrap_handle.bootstrap().await {
            debug!("routing-table refresh after initial bootstrap failed: {e}");
        }
    });

    if handle.config.connectivity.enable_discovery {
        let discovery_handle = handle.clone();
        tokio::spawn(discovery_loop(discovery_handle));
    }

    let health_handle = handle.clone();
    tokio::spawn(health_monitor_loop(health_handle));

    let reconnect_handle = handle.clone();
    tokio::spawn(reconnection_loop(reconnect_handle));
}

/// Every `discovery_interval`: refresh the routing table, perform three
/// bounded find-peer lookups against random peer IDs (side-effectful —
/// discovery happens along the way, not by actually finding the fictional
/// target), then one bounded closest-peers lookup against a random key,
/// dialing any returned peer that isn't already connected.
async fn discovery_loop(handle: ConnectivityHandle) {
    let mut interval = tokio::time::interval(handle.config.connectivity.discovery_interval);
    loop {
        tokio::select! {
            _ = handle.cancellation.cancelled() => return,
            _ = interval.tick() => {}
        }

        if let Err(e) = handle.bootstrap().await {
            debug!("discovery routing-table refresh failed: {e}");
        }

        for _ in 0..3 {
            let target = PeerId::random();
            match tokio::time::timeout(Duration::from_secs(10), handle.find_closest_peers(target))
                .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!("discovery find-peer lookup failed: {e}"),
                Err(_) => debug!("discovery find-peer lookup timed out"),
            }
        }

        let random_key = PeerId::random();
        match tokio::time::timeout(
            Duration::from_secs(15),
            handle.find_closest_peers(random_key),
        )
        .await
        {
            Ok(Ok(peers)) => {
                let connected: HashSet<PeerId> = handle
                    .connected_peers()
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                for peer in peers {
                    if peer != handle.local_peer_id && !connected.contains(&peer) {
                        let dial_handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dial_handle.dial(peer).await {
                                debug!("discovery dial to {peer} failed: {e}");
                            }
                        });
                    }
                }
            }
            Ok(Err(e)) => debug!("discovery closest-peers lookup failed: {e}"),
            Err(_) => debug!("discovery closest-peers lookup timed out"),
        }
    }
}

async fn health_monitor_loop(handle: ConnectivityHandle) {
    let mut interval = tokio::time::interval(handle.config.connectivity.health_check_interval);
    loop {
        tokio::select! {
            _ = handle.cancellation.cancelled() => return,
            _ = interval.tick() => {}
        }

        let connected = match handle.connected_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                warn!("health monitor could not read connected peers: {e}");
                continue;
            }
        };
        let connected: HashSet<PeerId> = connected.into_iter().collect();

        let mut health = handle.health.write().await;
        for peer_id in &connected {
            let entry = health.entry(*peer_id).or_default();
            entry.is_connected = true;
            entry.failed_attempts = 0;
            entry.last_seen = Instant::now();
            if let Some(since) = entry.last_connect_time {
                entry.connection_quality = ConnectionQuality::from_duration(since.elapsed());
            }
        }
        for (peer_id, info) in health.iter_mut() {
            if info.is_connected && !connected.contains(peer_id) {
                info.is_connected = false;
            }
        }
    }
}

async fn reconnection_loop(handle: ConnectivityHandle) {
    let mut interval = tokio::time::interval(handle.config.connectivity.reconnect_interval);
    loop {
        tokio::select! {
            _ = handle.cancellation.cancelled() => return,
            _ = interval.tick() => {}
        }

        let connected = match handle.connected_peers().await {
            Ok(peers) => peers,
            Err(_) => continue,
        };
        if connected.len() >= handle.config.connectivity.min_connections {
            continue;
        }
        let connected: HashSet<PeerId> = connected.into_iter().collect();

        let horizon = handle.config.connectivity.stale_peer_horizon;
        let max_attempts = handle.config.connectivity.max_reconnect_attempts;

        let mut candidates: HashSet<PeerId> = {
            let health = handle.health.read().await;
            health
                .iter()
                .filter(|(_, info)| {
                    !info.is_connected
                        && info.failed_attempts < max_attempts
                        && info.last_seen.elapsed() < horizon
                })
                .map(|(peer_id, _)| *peer_id)
                .collect()
        };

        for entry in &handle.config.bootstrap_peers {
            if let Ok((peer_id, _)) = network::parse_bootstrap_peer(entry) {
                if !connected.contains(&peer_id) {
                    candidates.insert(peer_id);
                }
            }
        }

        for peer_id in candidates {
            let dial_handle = handle.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(Duration::from_secs(15), dial_handle.dial(peer_id)).await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("reconnection dial to {peer_id} failed: {e}"),
                    Err(_) => debug!("reconnection dial to {peer_id} timed out"),
                }
            });
        }
    }
}
