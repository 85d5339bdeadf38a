use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::history::HistorySampler;
use crate::metrics::{SNAPSHOT_CAPTURES_TOTAL, SNAPSHOT_FAILURES_TOTAL};

/// Background task driving the history sampler.
///
/// Captures once immediately on start, then on a fixed cadence until
/// shutdown. Each capture failure is logged and swallowed; the next tick
/// proceeds regardless.
pub struct SnapshotTask {
    interval_ms: u64,
    sampler: Arc<HistorySampler>,
    shutdown: broadcast::Receiver<()>,
}

impl SnapshotTask {
    pub fn new(
        interval_ms: u64,
        sampler: Arc<HistorySampler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval_ms,
            sampler,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(interval_ms = self.interval_ms, "Snapshot task started");

        // Immediate first capture
        self.capture().await;

        let mut timer = tokio::time::interval(Duration::from_millis(self.interval_ms));

        // Skip immediate first tick
        timer.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Snapshot task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.capture().await;
                }
            }
        }

        tracing::info!("Snapshot task stopped");
    }

    async fn capture(&self) {
        match self.sampler.capture(Utc::now().timestamp_millis()).await {
            Ok(()) => {
                SNAPSHOT_CAPTURES_TOTAL.inc();
            }
            Err(e) => {
                SNAPSHOT_FAILURES_TOTAL.inc();
                tracing::error!(error = %e, "Error capturing snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TimeRange;
    use crate::stats::StatsAggregator;
    use crate::store::MemoryStore;

    fn task_fixture(interval_ms: u64) -> (SnapshotTask, Arc<HistorySampler>, broadcast::Sender<()>) {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Arc::new(StatsAggregator::new(store.clone()));
        let sampler = Arc::new(HistorySampler::new(store, aggregator));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = SnapshotTask::new(interval_ms, sampler.clone(), shutdown_rx);
        (task, sampler, shutdown_tx)
    }

    #[tokio::test]
    async fn test_snapshot_task_shutdown() {
        let (task, _sampler, shutdown_tx) = task_fixture(1000);

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_immediate_capture_on_start() {
        let (task, sampler, shutdown_tx) = task_fixture(60_000);

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        // Well before the first interval tick, one sample already exists
        tokio::time::sleep(Duration::from_millis(200)).await;
        let now = Utc::now().timestamp_millis();
        let history = sampler.history(TimeRange::OneHour, now).await.unwrap();
        assert_eq!(history.total_visitors.len(), 1);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
