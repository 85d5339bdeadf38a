//! Prometheus metrics for the live stats service.
//!
//! Covers the surfaces that matter operationally:
//! - WebSocket connection counts and lifecycle
//! - Visitor heartbeat / disconnect volume
//! - Broadcast and snapshot tick outcomes
//! - History request volume
//! - Store (Redis) error counts

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "beacon";

lazy_static! {
    // Connection metrics

    /// Total number of active WebSocket connections
    pub static ref CONNECTIONS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_connections_total", METRIC_PREFIX),
        "Total number of active WebSocket connections"
    ).unwrap();

    /// Number of connections subscribed to the stats broadcast
    pub static ref DASHBOARDS_SUBSCRIBED: IntGauge = register_int_gauge!(
        format!("{}_dashboards_subscribed", METRIC_PREFIX),
        "Number of connections subscribed to the stats broadcast"
    ).unwrap();

    /// Total WebSocket connections opened since start
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// Total WebSocket connections closed since start
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket connection duration in seconds
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 7200.0]
    ).unwrap();

    // Presence metrics

    /// Total visitor heartbeats recorded
    pub static ref HEARTBEATS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeats_total", METRIC_PREFIX),
        "Total visitor heartbeats recorded"
    ).unwrap();

    /// Total visitor disconnect cleanups performed
    pub static ref DISCONNECTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_disconnects_total", METRIC_PREFIX),
        "Total visitor disconnect cleanups performed"
    ).unwrap();

    // Broadcast / sampler metrics

    /// Total broadcast ticks that delivered a snapshot
    pub static ref BROADCAST_TICKS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_ticks_total", METRIC_PREFIX),
        "Total broadcast ticks that delivered a snapshot"
    ).unwrap();

    /// Total broadcast ticks skipped due to aggregation failure
    pub static ref BROADCAST_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_failures_total", METRIC_PREFIX),
        "Total broadcast ticks skipped due to aggregation failure"
    ).unwrap();

    /// Total history snapshot captures
    pub static ref SNAPSHOT_CAPTURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_snapshot_captures_total", METRIC_PREFIX),
        "Total history snapshot captures"
    ).unwrap();

    /// Total failed history snapshot captures
    pub static ref SNAPSHOT_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_snapshot_failures_total", METRIC_PREFIX),
        "Total failed history snapshot captures"
    ).unwrap();

    /// Snapshot aggregation duration in seconds
    pub static ref AGGREGATION_DURATION: Histogram = register_histogram!(
        format!("{}_aggregation_duration_seconds", METRIC_PREFIX),
        "Snapshot aggregation duration in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    /// Total history requests served
    pub static ref HISTORY_REQUESTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_history_requests_total", METRIC_PREFIX),
        "Total history requests served"
    ).unwrap();

    // Store metrics

    /// Total store operation errors
    pub static ref STORE_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total store operation errors"
    ).unwrap();
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        HEARTBEATS_TOTAL.inc();
        let output = encode_metrics().expect("encoding should succeed");
        assert!(output.contains("beacon_heartbeats_total"));
    }

    #[test]
    fn test_gauges_settable() {
        CONNECTIONS_TOTAL.set(3);
        assert_eq!(CONNECTIONS_TOTAL.get(), 3);
        CONNECTIONS_TOTAL.set(0);
    }
}
