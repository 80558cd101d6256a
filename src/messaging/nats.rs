//! NATS publisher

use crate::messaging::config::MessagingConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::events::{MessageEnvelope, NotificationEvent};
use crate::messaging::metrics::{record_failure, record_published, MESSAGING_METRICS};
use crate::messaging::traits::EventPublisher;
use async_nats::Client;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Publishes JSON envelopes to a NATS subject
pub struct NatsPublisher {
    client: Arc<Client>,
    subject: String,
    max_message_size: usize,
    timeout: Duration,
}

impl NatsPublisher {
    /// Connect to the first configured server
    pub async fn new(config: &MessagingConfig) -> MessagingResult<Self> {
        let server = config.nats.servers.first().ok_or_else(|| {
            MessagingError::ConfigurationError("No NATS servers configured".to_string())
        })?;

        let client = async_nats::ConnectOptions::new()
            .name(&config.nats.connection_name)
            .connect(server.as_str())
            .await
            .map_err(|e| MessagingError::ConnectionFailed(format!("NATS connection failed: {}", e)))?;

        tracing::info!(server = %server, subject = %config.subject, "Connected NATS publisher");

        Ok(Self {
            client: Arc::new(client),
            subject: config.subject.clone(),
            max_message_size: config.max_message_size,
            timeout: Duration::from_millis(config.nats.request_timeout_ms),
        })
    }

    /// Serialized envelope for an event
    pub fn encode(event: &NotificationEvent) -> MessagingResult<Vec<u8>> {
        let envelope = MessageEnvelope::new(event)
            .with_correlation_id(event.params.alert.id.to_string())
            .with_header("event".to_string(), event.event.to_string());

        Ok(serde_json::to_vec(&envelope)?)
    }

    async fn try_publish(&self, event: &NotificationEvent) -> MessagingResult<()> {
        let payload = Self::encode(event)?;
        if payload.len() > self.max_message_size {
            return Err(MessagingError::MessageTooLarge {
                size: payload.len(),
                limit: self.max_message_size,
            });
        }

        MESSAGING_METRICS
            .message_size
            .with_label_values(&[self.backend()])
            .observe(payload.len() as f64);

        let publish = self.client.publish(self.subject.clone(), payload.into());
        match tokio::time::timeout(self.timeout, publish).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MessagingError::PublishFailed(format!("NATS publish failed: {}", e))),
            Err(_) => Err(MessagingError::PublishFailed("NATS publish timed out".to_string())),
        }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: NotificationEvent) {
        let start = Instant::now();

        match self.try_publish(&event).await {
            Ok(()) => {
                record_published(&event.event.to_string(), self.backend());
                MESSAGING_METRICS
                    .publish_latency
                    .with_label_values(&[self.backend()])
                    .observe(start.elapsed().as_secs_f64());
            }
            Err(e) => {
                tracing::error!(
                    alert_id = %event.params.alert.id,
                    entity_id = %event.params.entity.id,
                    error = %e,
                    "Failed to publish notification"
                );
                record_failure(self.backend(), e.kind());
            }
        }
    }

    fn backend(&self) -> &'static str {
        "nats"
    }
}
