use serde::{Deserialize, Serialize};

/// Current-moment aggregate view pushed to dashboards.
///
/// Produced fresh on every read, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub total_visitors: u64,
    pub top_pages: Vec<PageStats>,
    pub device_breakdown: DeviceBreakdown,
    pub last_update: i64,
}

/// Active visitor count per device category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBreakdown {
    pub mobile: u64,
    pub desktop: u64,
    pub tablet: u64,
}

/// Visitor count for one tracked page, ordered by count descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    pub page_hash: String,
    /// Best-effort reversed path; server-side only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    pub visitors: u64,
}

impl DeviceBreakdown {
    pub fn total(&self) -> u64 {
        self.mobile + self.desktop + self.tablet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_stats_wire_shape() {
        let stats = LiveStats {
            total_visitors: 2,
            top_pages: vec![PageStats {
                page_hash: "L2hvbWU=".to_string(),
                original_path: Some("/home".to_string()),
                visitors: 2,
            }],
            device_breakdown: DeviceBreakdown {
                mobile: 1,
                desktop: 1,
                tablet: 0,
            },
            last_update: 123,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalVisitors"], 2);
        assert_eq!(json["deviceBreakdown"]["mobile"], 1);
        assert_eq!(json["topPages"][0]["pageHash"], "L2hvbWU=");
        assert_eq!(json["topPages"][0]["originalPath"], "/home");
        assert_eq!(json["lastUpdate"], 123);
    }

    #[test]
    fn test_missing_original_path_omitted() {
        let page = PageStats {
            page_hash: "x".to_string(),
            original_path: None,
            visitors: 1,
        };
        let json = serde_json::to_string(&page).unwrap();
        assert!(!json.contains("originalPath"));
    }
}
