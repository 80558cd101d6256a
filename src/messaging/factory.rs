use crate::messaging::config::{MessagingBackend, MessagingConfig};
use crate::messaging::error::MessagingResult;
use crate::messaging::memory::{InMemoryPublisher, LogPublisher};
use crate::messaging::nats::NatsPublisher;
use crate::messaging::traits::EventPublisher;
use std::sync::Arc;

/// Create the notification publisher based on configuration
pub async fn create_publisher(config: &MessagingConfig) -> MessagingResult<Arc<dyn EventPublisher>> {
    crate::messaging::metrics::init_messaging_metrics();

    match config.backend {
        MessagingBackend::Nats => {
            tracing::info!(servers = ?config.nats.servers, "Initializing NATS publisher");
            Ok(Arc::new(NatsPublisher::new(config).await?))
        }

        MessagingBackend::Log => {
            tracing::info!("Initializing log publisher");
            Ok(Arc::new(LogPublisher))
        }

        MessagingBackend::Memory => {
            tracing::info!("Initializing in-memory publisher");
            Ok(Arc::new(InMemoryPublisher::new()))
        }
    }
}
