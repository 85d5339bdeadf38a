use serde::{Deserialize, Serialize};

/// Supported historical retention spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl TimeRange {
    pub const ALL: [TimeRange; 2] = [TimeRange::OneHour, TimeRange::TwentyFourHours];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::TwentyFourHours => "24h",
        }
    }

    /// Window retention in milliseconds.
    pub fn retention_ms(&self) -> i64 {
        match self {
            TimeRange::OneHour => 3_600_000,
            TimeRange::TwentyFourHours => 86_400_000,
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sample in a history window. Immutable once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: i64,
    pub value: u64,
}

/// Per-device history series for one range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDeviceBreakdown {
    pub mobile: Vec<TimeSeriesPoint>,
    pub desktop: Vec<TimeSeriesPoint>,
    pub tablet: Vec<TimeSeriesPoint>,
}

/// History series for one of the current top pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPageStats {
    pub page_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    pub data_points: Vec<TimeSeriesPoint>,
}

/// Read-time composition of one range's windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalStats {
    pub total_visitors: Vec<TimeSeriesPoint>,
    pub device_breakdown: HistoricalDeviceBreakdown,
    pub top_pages: Vec<HistoricalPageStats>,
    pub time_range: TimeRange,
    pub start_time: i64,
    pub end_time: i64,
}
