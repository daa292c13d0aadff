use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Envelope carried by every transport: the topic, the payload as
/// published by the core, and the wall-clock publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Notification {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Check if this notification matches a topic filter.
    pub fn matches_topic(&self, filter: Option<&str>) -> bool {
        match filter {
            Some(topic) => self.topic == topic,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_matches_topic() {
        let n = Notification::new("events.occupancy", json!({"eventId": "e1"}));
        assert!(n.matches_topic(Some("events.occupancy")));
        assert!(!n.matches_topic(Some("events.attendance")));
        assert!(n.matches_topic(None));
    }

    #[test]
    fn test_notification_serialization() {
        let n = Notification::new("events.occupancy", json!({"delta": 1}));
        let text = serde_json::to_string(&n).unwrap();
        let parsed: Notification = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.topic, "events.occupancy");
        assert_eq!(parsed.payload["delta"], 1);
    }
}
