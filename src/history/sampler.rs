use std::sync::Arc;

use crate::stats::StatsAggregator;
use crate::store::{keys, StatsStore, StoreError, WriteBatch};

use super::{
    HistoricalDeviceBreakdown, HistoricalPageStats, HistoricalStats, TimeRange, TimeSeriesPoint,
};

/// Number of top pages sampled into per-page history windows.
pub const TOP_PAGE_SAMPLES: usize = 5;

const CORE_METRICS: [&str; 4] = ["total", "mobile", "desktop", "tablet"];

/// Captures aggregator snapshots into the bounded history windows.
///
/// Sole writer and pruner of the windows. Every capture writes the 4 core
/// metrics and the current top pages into both ranges, then trims each
/// written-to window below its retention. A page that falls out of the top
/// list stops receiving samples; its window ages out via pruning on later
/// captures and an empty window is a valid read result.
pub struct HistorySampler {
    store: Arc<dyn StatsStore>,
    aggregator: Arc<StatsAggregator>,
}

impl HistorySampler {
    pub fn new(store: Arc<dyn StatsStore>, aggregator: Arc<StatsAggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Capture one sample of the current aggregates into both ranges.
    #[tracing::instrument(name = "history.capture", skip(self))]
    pub async fn capture(&self, now_ms: i64) -> Result<(), StoreError> {
        let stats = self.aggregator.compute_snapshot(now_ms).await?;

        let core_values = [
            stats.total_visitors,
            stats.device_breakdown.mobile,
            stats.device_breakdown.desktop,
            stats.device_breakdown.tablet,
        ];
        let top_pages: Vec<_> = stats.top_pages.iter().take(TOP_PAGE_SAMPLES).collect();

        let mut batch = WriteBatch::new();
        for range in TimeRange::ALL {
            let r = range.as_str();
            let cutoff = now_ms - range.retention_ms();

            for (metric, value) in CORE_METRICS.into_iter().zip(core_values) {
                let key = keys::history(r, metric);
                batch = batch
                    .series_add(&key, now_ms, encode_point(now_ms, value)?)
                    .series_trim(&key, cutoff);
            }

            for page in &top_pages {
                let key = keys::history_page(r, &page.page_hash);
                batch = batch
                    .series_add(&key, now_ms, encode_point(now_ms, page.visitors)?)
                    .series_trim(&key, cutoff);
            }
        }

        tracing::debug!(
            total_visitors = stats.total_visitors,
            pages = top_pages.len(),
            ops = batch.len(),
            "Capturing history sample"
        );

        self.store.apply(batch).await
    }

    /// Compose the requested range's windows into a single read.
    ///
    /// Window reads are bounded to `[now - retention, now]` even though
    /// pruning should already guarantee it. Empty windows yield empty
    /// data-point lists, never errors.
    #[tracing::instrument(name = "history.read", skip(self), fields(range = %range))]
    pub async fn history(
        &self,
        range: TimeRange,
        now_ms: i64,
    ) -> Result<HistoricalStats, StoreError> {
        let start_time = now_ms - range.retention_ms();
        let r = range.as_str();

        let total_visitors = self
            .read_window(&keys::history(r, "total"), start_time, now_ms)
            .await?;
        let device_breakdown = HistoricalDeviceBreakdown {
            mobile: self
                .read_window(&keys::history(r, "mobile"), start_time, now_ms)
                .await?,
            desktop: self
                .read_window(&keys::history(r, "desktop"), start_time, now_ms)
                .await?,
            tablet: self
                .read_window(&keys::history(r, "tablet"), start_time, now_ms)
                .await?,
        };

        // Page windows are selected by the current top-page ranking
        let snapshot = self.aggregator.compute_snapshot(now_ms).await?;
        let mut top_pages = Vec::new();
        for page in snapshot.top_pages.into_iter().take(TOP_PAGE_SAMPLES) {
            let data_points = self
                .read_window(&keys::history_page(r, &page.page_hash), start_time, now_ms)
                .await?;
            top_pages.push(HistoricalPageStats {
                page_hash: page.page_hash,
                original_path: page.original_path,
                data_points,
            });
        }

        Ok(HistoricalStats {
            total_visitors,
            device_breakdown,
            top_pages,
            time_range: range,
            start_time,
            end_time: now_ms,
        })
    }

    async fn read_window(
        &self,
        key: &str,
        min_score: i64,
        max_score: i64,
    ) -> Result<Vec<TimeSeriesPoint>, StoreError> {
        let raw = self.store.series_range(key, min_score, max_score).await?;
        // Malformed members are skipped, not fatal
        Ok(raw
            .iter()
            .filter_map(|member| serde_json::from_str::<TimeSeriesPoint>(member).ok())
            .collect())
    }
}

fn encode_point(timestamp: i64, value: u64) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&TimeSeriesPoint { timestamp, value })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymize::hash_path;
    use crate::presence::{DeviceCategory, PresenceTracker, VisitorData};
    use crate::store::MemoryStore;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        tracker: PresenceTracker,
        sampler: HistorySampler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Arc::new(StatsAggregator::new(store.clone()));
        Fixture {
            store: store.clone(),
            tracker: PresenceTracker::new(store.clone(), 300),
            sampler: HistorySampler::new(store, aggregator),
        }
    }

    async fn heartbeat(f: &Fixture, page: &str, device: DeviceCategory) -> Uuid {
        let session = Uuid::new_v4();
        f.tracker
            .record_heartbeat(
                session,
                &VisitorData {
                    page_hash: hash_path(page),
                    device_category: device,
                    screen_bucket: "1366x768".to_string(),
                    timestamp: 0,
                },
            )
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_capture_writes_both_ranges() {
        let f = fixture();
        heartbeat(&f, "/home", DeviceCategory::Desktop).await;

        f.sampler.capture(10_000).await.unwrap();

        for range in TimeRange::ALL {
            let points = f
                .store
                .series_range(&keys::history(range.as_str(), "total"), 0, 20_000)
                .await
                .unwrap();
            assert_eq!(points.len(), 1, "range {range} should hold one sample");
        }
    }

    #[tokio::test]
    async fn test_history_returns_sampled_series() {
        let f = fixture();
        heartbeat(&f, "/home", DeviceCategory::Desktop).await;

        for t in [0, 10_000, 20_000] {
            f.sampler.capture(t).await.unwrap();
        }

        let history = f.sampler.history(TimeRange::OneHour, 20_000).await.unwrap();
        let values: Vec<_> = history
            .total_visitors
            .iter()
            .map(|p| (p.timestamp, p.value))
            .collect();
        assert_eq!(values, vec![(0, 1), (10_000, 1), (20_000, 1)]);
        assert_eq!(history.start_time, 20_000 - 3_600_000);
        assert_eq!(history.end_time, 20_000);
    }

    #[tokio::test]
    async fn test_pruning_respects_each_retention() {
        let f = fixture();
        heartbeat(&f, "/home", DeviceCategory::Mobile).await;

        f.sampler.capture(0).await.unwrap();
        // Two hours later: outside 1h retention, inside 24h
        let later = 7_200_000;
        f.sampler.capture(later).await.unwrap();

        let one_hour = f.sampler.history(TimeRange::OneHour, later).await.unwrap();
        assert_eq!(one_hour.total_visitors.len(), 1);
        assert!(one_hour
            .total_visitors
            .iter()
            .all(|p| p.timestamp >= later - 3_600_000));

        let day = f
            .sampler
            .history(TimeRange::TwentyFourHours, later)
            .await
            .unwrap();
        assert_eq!(day.total_visitors.len(), 2);
    }

    #[tokio::test]
    async fn test_page_windows_are_pruned() {
        let f = fixture();
        heartbeat(&f, "/home", DeviceCategory::Desktop).await;

        f.sampler.capture(0).await.unwrap();
        let later = 7_200_000;
        f.sampler.capture(later).await.unwrap();

        let page_key = keys::history_page("1h", &hash_path("/home"));
        let points = f.store.series_range(&page_key, 0, later).await.unwrap();
        assert_eq!(points.len(), 1);
    }

    #[tokio::test]
    async fn test_history_with_no_samples_is_empty_not_error() {
        let f = fixture();
        let history = f.sampler.history(TimeRange::OneHour, 1_000).await.unwrap();
        assert!(history.total_visitors.is_empty());
        assert!(history.device_breakdown.mobile.is_empty());
        assert!(history.top_pages.is_empty());
    }

    #[tokio::test]
    async fn test_only_top_five_pages_sampled() {
        let f = fixture();
        // Six distinct pages, one visitor each plus two on the first page
        for i in 0..6 {
            heartbeat(&f, &format!("/p{i}"), DeviceCategory::Desktop).await;
        }
        heartbeat(&f, "/p0", DeviceCategory::Mobile).await;

        f.sampler.capture(0).await.unwrap();

        let mut sampled = 0;
        for i in 0..6 {
            let key = keys::history_page("1h", &hash_path(&format!("/p{i}")));
            if !f.store.series_range(&key, 0, 0).await.unwrap().is_empty() {
                sampled += 1;
            }
        }
        assert_eq!(sampled, TOP_PAGE_SAMPLES);

        // The two-visitor page is certainly in the top five
        let key = keys::history_page("1h", &hash_path("/p0"));
        assert_eq!(f.store.series_range(&key, 0, 0).await.unwrap().len(), 1);
    }
}
