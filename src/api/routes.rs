use axum::{routing::get, Router};

use crate::server::AppState;

use super::health::{health, info, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
}
