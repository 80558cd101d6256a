//! Event types for notification publishing

use crate::models::{Alert, MatchedItem, Role, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Notification event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A saved alert matched a new item
    MatchAlert,
}

/// Parameters of a match notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAlertParams {
    pub alert: Alert,
    pub role: Role,
    pub entity: MatchedItem,
}

/// A notification handed to the publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event: EventKind,

    /// Who caused the event: the uploader of the matched item
    pub actor_id: Option<RoleId>,

    pub params: MatchAlertParams,
}

impl NotificationEvent {
    /// Match notification for `role`'s `alert` on `entity`
    pub fn match_alert(alert: Alert, role: Role, entity: MatchedItem) -> Self {
        Self {
            event: EventKind::MatchAlert,
            actor_id: entity.uploader_id,
            params: MatchAlertParams {
                alert,
                role,
                entity,
            },
        }
    }

    /// Role the notification is addressed to
    pub fn recipient(&self) -> RoleId {
        self.params.role.id
    }
}

/// Message metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Message ID
    pub message_id: String,

    /// Correlation ID
    pub correlation_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Source service
    pub source: String,

    /// Custom headers
    pub headers: HashMap<String, String>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            correlation_id: None,
            timestamp: Utc::now(),
            source: "query-alert-engine".to_string(),
            headers: HashMap::new(),
        }
    }
}

/// Message envelope wrapping the event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    /// Message metadata
    pub metadata: MessageMetadata,

    /// Message payload
    pub payload: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(payload: T) -> Self {
        Self {
            metadata: MessageMetadata::default(),
            payload,
        }
    }

    /// Create with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.metadata.correlation_id = Some(correlation_id);
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.metadata.headers.insert(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use uuid::Uuid;

    fn item(uploader: Option<RoleId>) -> MatchedItem {
        MatchedItem {
            id: "e-1".to_string(),
            name: "Acme Corp".to_string(),
            created_at: Utc::now(),
            uploader_id: uploader,
            collection_id: Some(1),
            schema: Some("Thing".to_string()),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_match_alert_event() {
        let role = Role::new("analyst", "analyst@example.com");
        let alert = Alert::new(role.id, "acme corp");
        let uploader = Uuid::new_v4();

        let event = NotificationEvent::match_alert(alert.clone(), role.clone(), item(Some(uploader)));

        assert_eq!(event.event, EventKind::MatchAlert);
        assert_eq!(event.actor_id, Some(uploader));
        assert_eq!(event.recipient(), role.id);
        assert_eq!(event.params.alert, alert);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "MATCH_ALERT");
        assert_eq!(json["params"]["entity"]["name"], "Acme Corp");
    }

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::MatchAlert.to_string(), "MATCH_ALERT");
        assert_eq!(EventKind::from_str("MATCH_ALERT").unwrap(), EventKind::MatchAlert);
    }

    #[test]
    fn test_message_envelope() {
        let envelope = MessageEnvelope::new("payload")
            .with_correlation_id("corr-123".to_string())
            .with_header("event".to_string(), "MATCH_ALERT".to_string());

        assert_eq!(envelope.metadata.correlation_id.as_ref().unwrap(), "corr-123");
        assert_eq!(envelope.metadata.headers.get("event").unwrap(), "MATCH_ALERT");
        assert_eq!(envelope.metadata.source, "query-alert-engine");
    }
}
