//! Health check, service info, and snapshot endpoints.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::server::AppState;
use crate::stats::LiveStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    pub connections: ConnectionHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub subscribed_dashboards: usize,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = state.store.ping().await.is_ok();
    let conn_stats = state.connection_manager.stats();

    let status = if store_connected { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.store.backend_name().to_string(),
            connected: store_connected,
        },
        connections: ConnectionHealthResponse {
            total: conn_stats.total_connections,
            subscribed_dashboards: conn_stats.subscribed_dashboards,
        },
    })
}

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections: state.connection_manager.connection_count(),
    })
}

/// One-off live snapshot, same payload the broadcast pushes over WebSocket.
pub async fn stats(State(state): State<AppState>) -> Result<Json<LiveStats>> {
    let snapshot = state
        .aggregator
        .compute_snapshot(Utc::now().timestamp_millis())
        .await?;
    Ok(Json(snapshot))
}
