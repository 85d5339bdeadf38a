//! Historical time-series sampling.
//!
//! Aggregator snapshots are sampled on a fixed cadence into two bounded
//! windows (1 hour and 24 hours) that differ only in retention. Old points
//! are pruned as time advances; nothing here is long-term storage.

mod sampler;
mod types;

pub use sampler::{HistorySampler, TOP_PAGE_SAMPLES};
pub use types::{
    HistoricalDeviceBreakdown, HistoricalPageStats, HistoricalStats, TimeRange, TimeSeriesPoint,
};
