use serde::{Deserialize, Serialize};

/// Coarse device category derived client-side from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Mobile,
    Desktop,
    Tablet,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 3] = [
        DeviceCategory::Mobile,
        DeviceCategory::Desktop,
        DeviceCategory::Tablet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Mobile => "mobile",
            DeviceCategory::Desktop => "desktop",
            DeviceCategory::Tablet => "tablet",
        }
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anonymized payload of a visitor heartbeat.
///
/// The page identifier is a base64 token; the screen bucket is a coarse
/// resolution label. Neither identifies a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorData {
    pub page_hash: String,
    pub device_category: DeviceCategory,
    pub screen_bucket: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_category_wire_names() {
        assert_eq!(
            serde_json::to_string(&DeviceCategory::Mobile).unwrap(),
            "\"mobile\""
        );
        let parsed: DeviceCategory = serde_json::from_str("\"tablet\"").unwrap();
        assert_eq!(parsed, DeviceCategory::Tablet);
    }

    #[test]
    fn test_visitor_data_camel_case() {
        let data = VisitorData {
            page_hash: "L2hvbWU=".to_string(),
            device_category: DeviceCategory::Desktop,
            screen_bucket: "1920x1080".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"pageHash\""));
        assert!(json.contains("\"deviceCategory\":\"desktop\""));
        assert!(json.contains("\"screenBucket\""));
    }

    #[test]
    fn test_rejects_unknown_device_category() {
        let raw = r#"{"pageHash":"x","deviceCategory":"watch","screenBucket":"s","timestamp":0}"#;
        assert!(serde_json::from_str::<VisitorData>(raw).is_err());
    }
}
