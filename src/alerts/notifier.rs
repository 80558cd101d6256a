use crate::messaging::{EventPublisher, NotificationEvent};
use crate::metrics::NOTIFICATIONS_TOTAL;
use crate::models::{Alert, MatchedItem, Role};
use std::sync::Arc;

/// Turns matched items into notification events
#[derive(Clone)]
pub struct MatchNotifier {
    publisher: Arc<dyn EventPublisher>,
}

impl MatchNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Dispatch exactly one `MATCH_ALERT` event for `item`
    pub async fn notify(&self, alert: &Alert, role: &Role, item: MatchedItem) {
        tracing::info!(alert_id = %alert.id, entity_id = %item.id, "Alert [{}]: {}", alert.query, item.name);

        let event = NotificationEvent::match_alert(alert.clone(), role.clone(), item);
        self.publisher.publish(event).await;
        NOTIFICATIONS_TOTAL.inc();
    }
}
