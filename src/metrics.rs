//! External metrics HTTP surface: `/health`, `/metrics`, `/metrics/peers`,
//! `/metrics/latency`, `/metrics/connections`.
//!
//! Grounded on `core/MetricsServer.go`; `axum` is already the teacher crate's
//! REST surface of choice (see the deleted `api_server.rs`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use libp2p::{PeerId, StreamProtocol};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::connectivity::ConnectivityHandle;
use crate::streams::{self, PRINT_PROTOCOL};

pub type LatencyCache = Arc<RwLock<HashMap<PeerId, Duration>>>;

#[derive(Clone)]
struct MetricsState {
    connectivity: ConnectivityHandle,
    latency: LatencyCache,
    started_at: Instant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    peers: usize,
    timestamp: chrono::DateTime<Utc>,
}

/// Mirrors `spec.md`'s `NetworkMetrics` snapshot: uptime, connection counts,
/// a per-peer breakdown, and aggregate latency stats over the ping cache.
#[derive(Serialize)]
struct NetworkMetrics {
    node_id: String,
    uptime_secs: u64,
    total_connections: usize,
    connected_peers: usize,
    known_peers: usize,
    routing_table_size: usize,
    disconnected_peers: usize,
    healthy_connections: usize,
    peers: Vec<PeerMetric>,
    latency: LatencyStats,
}

#[derive(Serialize)]
struct PeerMetric {
    peer_id: String,
    is_connected: bool,
    connect_attempts: u32,
    failed_attempts: u32,
    connection_quality: String,
    latency_ms: Option<f64>,
}

#[derive(Serialize)]
struct LatencyStats {
    samples: usize,
    min_ms: Option<f64>,
    max_ms: Option<f64>,
    avg_ms: Option<f64>,
}

#[derive(Serialize)]
struct PeerEntry {
    peer_id: String,
}

#[derive(Serialize)]
struct ConnectionEntry {
    peer_id: String,
    is_connected: bool,
    connect_attempts: u32,
    failed_attempts: u32,
    connection_quality: String,
}

/// Starts the 30s ping loop and serves the metrics surface until the process
/// exits. Intended to be spawned alongside the main run loop, not awaited.
pub async fn serve(connectivity: ConnectivityHandle, port: u16) -> anyhow::Result<()> {
    let latency: LatencyCache = Arc::new(RwLock::new(HashMap::new()));
    tokio::spawn(ping_loop(connectivity.clone(), latency.clone()));

    let state = MetricsState {
        connectivity,
        latency,
        started_at: Instant::now(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/metrics/peers", get(metrics_peers))
        .route("/metrics/latency", get(metrics_latency))
        .route("/metrics/connections", get(metrics_connections))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("metrics server listening on :{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<MetricsState>) -> Json<HealthResponse> {
    let peers = state
        .connectivity
        .connected_peers()
        .await
        .map(|p| p.len())
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok",
        node_id: state.connectivity.local_peer_id.to_string(),
        peers,
        timestamp: Utc::now(),
    })
}

async fn metrics(State(state): State<MetricsState>) -> Json<NetworkMetrics> {
    let stats = state.connectivity.network_stats().await.ok();
    let health = state.connectivity.health.read().await;
    let latency = state.latency.read().await;

    let peers = health
        .iter()
        .map(|(peer_id, info)| PeerMetric {
            peer_id: peer_id.to_string(),
            is_connected: info.is_connected,
            connect_attempts: info.connect_attempts,
            failed_attempts: info.failed_attempts,
            connection_quality: format!("{:?}", info.connection_quality),
            latency_ms: latency.get(peer_id).map(|d| d.as_secs_f64() * 1000.0),
        })
        .collect();

    let samples: Vec<f64> = latency.values().map(|d| d.as_secs_f64() * 1000.0).collect();
    let latency_stats = LatencyStats {
        samples: samples.len(),
        min_ms: samples.iter().cloned().fold(None, |acc, v| {
            Some(acc.map_or(v, |m: f64| m.min(v)))
        }),
        max_ms: samples.iter().cloned().fold(None, |acc, v| {
            Some(acc.map_or(v, |m: f64| m.max(v)))
        }),
        avg_ms: if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<f64>() / samples.len() as f64)
        },
    };

    Json(NetworkMetrics {
        node_id: state.connectivity.local_peer_id.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        total_connections: stats.as_ref().map(|s| s.total_connections).unwrap_or(0),
        connected_peers: stats.as_ref().map(|s| s.connected_peers).unwrap_or(0),
        known_peers: stats.as_ref().map(|s| s.known_peers).unwrap_or(0),
        routing_table_size: stats.as_ref().map(|s| s.routing_table_size).unwrap_or(0),
        disconnected_peers: stats.as_ref().map(|s| s.disconnected_peers).unwrap_or(0),
        healthy_connections: stats.as_ref().map(|s| s.healthy_connections).unwrap_or(0),
        peers,
        latency: latency_stats,
    })
}

async fn metrics_peers(State(state): State<MetricsState>) -> Json<Vec<PeerEntry>> {
    let peers = state
        .connectivity
        .connected_peers()
        .await
        .unwrap_or_default();
    Json(
        peers
            .into_iter()
            .map(|peer_id| PeerEntry {
                peer_id: peer_id.to_string(),
            })
            .collect(),
    )
}

async fn metrics_latency(State(state): State<MetricsState>) -> Json<HashMap<String, f64>> {
    let latency = state.latency.read().await;
    Json(
        latency
            .iter()
            .map(|(peer_id, duration)| (peer_id.to_string(), duration.as_secs_f64() * 1000.0))
            .collect(),
    )
}

async fn metrics_connections(State(state): State<MetricsState>) -> Json<Vec<ConnectionEntry>> {
    let health = state.connectivity.health.read().await;
    Json(
        health
            .iter()
            .map(|(peer_id, info)| ConnectionEntry {
                peer_id: peer_id.to_string(),
                is_connected: info.is_connected,
                connect_attempts: info.connect_attempts,
                failed_attempts: info.failed_attempts,
                connection_quality: format!("{:?}", info.connection_quality),
            })
            .collect(),
    )
}

/// Every 30s, opens a short-lived `/print/1.0.0` stream to each connected
/// peer and times the round trip. A failed ping leaves any existing cache
/// entry for that peer untouched rather than clearing it.
async fn ping_loop(connectivity: ConnectivityHandle, latency: LatencyCache) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let peers = match connectivity.connected_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                debug!("ping loop could not list connected peers: {e}");
                continue;
            }
        };

        for peer in peers {
            let mut control = connectivity.control.clone();
            let protocol = StreamProtocol::new(PRINT_PROTOCOL);
            let start = Instant::now();
            match streams::open_line_stream(&mut control, peer, protocol).await {
                Ok(mut line_stream) => {
                    let _ = line_stream.write_line("ping").await;
                    let _ = line_stream.close().await;
                    latency.write().await.insert(peer, start.elapsed());
                }
                Err(e) => debug!("ping to {peer} failed: {e}"),
            }
        }
    }
}
