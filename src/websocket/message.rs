use serde::{Deserialize, Serialize};

use crate::history::{HistoricalStats, TimeRange};
use crate::presence::VisitorData;
use crate::stats::LiveStats;

/// Messages sent from client to server.
///
/// Closed set of events; the gateway dispatches them through one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "visitor:heartbeat")]
    Heartbeat(VisitorData),
    #[serde(rename = "visitor:disconnect")]
    Disconnect,
    #[serde(rename = "admin:subscribe")]
    Subscribe,
    #[serde(rename = "admin:unsubscribe")]
    Unsubscribe,
    #[serde(rename = "admin:history:request")]
    HistoryRequest { range: TimeRange },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connection:ack")]
    ConnectionAck,
    #[serde(rename = "stats:update")]
    StatsUpdate {
        #[serde(flatten)]
        stats: LiveStats,
    },
    #[serde(rename = "admin:history:response")]
    HistoryResponse {
        #[serde(flatten)]
        stats: HistoricalStats,
    },
    #[serde(rename = "admin:history:error")]
    HistoryError { message: String },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn stats_update(stats: LiveStats) -> Self {
        Self::StatsUpdate { stats }
    }

    pub fn history_response(stats: HistoricalStats) -> Self {
        Self::HistoryResponse { stats }
    }

    pub fn history_error(message: impl Into<String>) -> Self {
        Self::HistoryError {
            message: message.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::DeviceCategory;

    #[test]
    fn test_heartbeat_event_parses() {
        let raw = r#"{
            "type": "visitor:heartbeat",
            "payload": {
                "pageHash": "L2hvbWU=",
                "deviceCategory": "mobile",
                "screenBucket": "375x667",
                "timestamp": 1700000000000
            }
        }"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Heartbeat(data) => {
                assert_eq!(data.page_hash, "L2hvbWU=");
                assert_eq!(data.device_category, DeviceCategory::Mobile);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_payloadless_events_parse() {
        for (raw, expect_subscribe) in [
            (r#"{"type":"admin:subscribe"}"#, true),
            (r#"{"type":"visitor:disconnect"}"#, false),
        ] {
            let msg: ClientMessage = serde_json::from_str(raw).unwrap();
            match msg {
                ClientMessage::Subscribe => assert!(expect_subscribe),
                ClientMessage::Disconnect => assert!(!expect_subscribe),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_history_request_parses_range() {
        let raw = r#"{"type":"admin:history:request","payload":{"range":"24h"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::HistoryRequest {
                range: TimeRange::TwentyFourHours
            }
        ));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"visitor:track"}"#).is_err());
    }

    #[test]
    fn test_stats_update_is_flattened() {
        let msg = ServerMessage::stats_update(LiveStats {
            total_visitors: 1,
            top_pages: vec![],
            device_breakdown: Default::default(),
            last_update: 7,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "stats:update");
        assert_eq!(json["totalVisitors"], 1);
        assert_eq!(json["lastUpdate"], 7);
    }

    #[test]
    fn test_error_message_shape() {
        let msg = ServerMessage::error("INVALID_MESSAGE", "bad payload");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "INVALID_MESSAGE");
    }
}
