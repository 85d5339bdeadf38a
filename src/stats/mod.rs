//! Live aggregate statistics.

mod aggregator;
mod types;

pub use aggregator::StatsAggregator;
pub use types::{DeviceBreakdown, LiveStats, PageStats};
