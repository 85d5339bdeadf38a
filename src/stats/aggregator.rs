use std::sync::Arc;
use std::time::Instant;

use crate::anonymize::unhash_path;
use crate::metrics::AGGREGATION_DURATION;
use crate::store::{keys, StatsStore, StoreError};

use super::{DeviceBreakdown, LiveStats, PageStats};

/// Computes live snapshots from the presence sets.
///
/// Pure read: never mutates presence state and is safe to call concurrently
/// from the broadcast loop, the sampler, and request handlers. Counts are
/// best-effort cardinalities; keys can expire between reads and the result
/// is still valid.
pub struct StatsAggregator {
    store: Arc<dyn StatsStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    /// Compute a fresh snapshot. Cost is proportional to the number of
    /// distinct pages currently tracked.
    pub async fn compute_snapshot(&self, now_ms: i64) -> Result<LiveStats, StoreError> {
        let start = Instant::now();

        let total_visitors = self.store.set_count(keys::ACTIVE).await?;

        let device_breakdown = DeviceBreakdown {
            mobile: self.store.set_count(&keys::device("mobile")).await?,
            desktop: self.store.set_count(&keys::device("desktop")).await?,
            tablet: self.store.set_count(&keys::device("tablet")).await?,
        };

        let mut top_pages = Vec::new();
        for key in self.store.scan_keys(keys::PAGE_PREFIX).await? {
            let visitors = self.store.set_count(&key).await?;
            // A zero count means the page is already vacated even if the key
            // still lingers in the store
            if visitors == 0 {
                continue;
            }
            let page_hash = key
                .strip_prefix(keys::PAGE_PREFIX)
                .unwrap_or(&key)
                .to_string();
            let original_path = Some(unhash_path(&page_hash));
            top_pages.push(PageStats {
                page_hash,
                original_path,
                visitors,
            });
        }

        // Stable sort: equal counts keep their relative order
        top_pages.sort_by(|a, b| b.visitors.cmp(&a.visitors));

        AGGREGATION_DURATION.observe(start.elapsed().as_secs_f64());

        Ok(LiveStats {
            total_visitors,
            top_pages,
            device_breakdown,
            last_update: now_ms,
        })
    }
}
