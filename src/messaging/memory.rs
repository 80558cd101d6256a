//! In-process publishers

use crate::messaging::events::NotificationEvent;
use crate::messaging::metrics::record_published;
use crate::messaging::traits::EventPublisher;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects published events in memory
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return all collected events
    pub fn drain(&self) -> Vec<NotificationEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, event: NotificationEvent) {
        record_published(&event.event.to_string(), self.backend());
        self.events.lock().push(event);
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Writes each event to the structured log
#[derive(Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: NotificationEvent) {
        tracing::info!(
            event = %event.event,
            alert_id = %event.params.alert.id,
            role_id = %event.params.role.id,
            entity_id = %event.params.entity.id,
            actor_id = ?event.actor_id,
            "Notification published"
        );
        record_published(&event.event.to_string(), self.backend());
    }

    fn backend(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, MatchedItem, Role};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn event() -> NotificationEvent {
        let role = Role::new("analyst", "analyst@example.com");
        let alert = Alert::new(role.id, "acme");
        let entity = MatchedItem {
            id: "e-1".to_string(),
            name: "Acme".to_string(),
            created_at: Utc::now(),
            uploader_id: None,
            collection_id: None,
            schema: None,
            properties: BTreeMap::new(),
        };
        NotificationEvent::match_alert(alert, role, entity)
    }

    #[tokio::test]
    async fn test_in_memory_publisher_collects() {
        let publisher = InMemoryPublisher::new();
        assert!(publisher.is_empty());

        publisher.publish(event()).await;
        publisher.publish(event()).await;
        assert_eq!(publisher.len(), 2);

        assert_eq!(publisher.drain().len(), 2);
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn test_log_publisher_never_fails() {
        LogPublisher.publish(event()).await;
    }
}
