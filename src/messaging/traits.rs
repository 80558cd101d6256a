//! Messaging trait abstractions

use crate::messaging::events::NotificationEvent;
use async_trait::async_trait;

/// Notification transport.
///
/// Publishing is fire-and-forget: implementations log and count their own
/// failures, callers never see them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand one event to the transport
    async fn publish(&self, event: NotificationEvent);

    /// Backend label used in logs and metrics
    fn backend(&self) -> &'static str;
}
