use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::connection_manager::ConnectionManager;
use crate::metrics::{BROADCAST_FAILURES_TOTAL, BROADCAST_TICKS_TOTAL};
use crate::stats::StatsAggregator;
use crate::websocket::ServerMessage;

/// Background task that pushes live snapshots to subscribed dashboards.
///
/// One timer, one snapshot per tick, pushed to every member of the broadcast
/// group. A failed tick is logged and skipped; the timer itself never stops
/// until shutdown.
pub struct BroadcastTask {
    interval_ms: u64,
    aggregator: Arc<StatsAggregator>,
    connection_manager: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl BroadcastTask {
    pub fn new(
        interval_ms: u64,
        aggregator: Arc<StatsAggregator>,
        connection_manager: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval_ms,
            aggregator,
            connection_manager,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(Duration::from_millis(self.interval_ms));

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(interval_ms = self.interval_ms, "Broadcast task started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Broadcast task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.broadcast_snapshot().await;
                }
            }
        }

        tracing::info!("Broadcast task stopped");
    }

    async fn broadcast_snapshot(&self) {
        let subscribers = self.connection_manager.dashboard_connections();
        if subscribers.is_empty() {
            return;
        }

        let stats = match self
            .aggregator
            .compute_snapshot(Utc::now().timestamp_millis())
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                BROADCAST_FAILURES_TOTAL.inc();
                tracing::error!(error = %e, "Error broadcasting stats, skipping tick");
                return;
            }
        };

        BROADCAST_TICKS_TOTAL.inc();

        let mut delivered = 0;
        for handle in &subscribers {
            match handle.send(ServerMessage::stats_update(stats.clone())).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    // Connection on its way out; cleanup happens in its own handler
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Failed to push snapshot, connection may be closing"
                    );
                }
            }
        }

        tracing::debug!(
            subscribers = subscribers.len(),
            delivered = delivered,
            total_visitors = stats.total_visitors,
            "Snapshot broadcast"
        );
    }
}
