//! Notification publishing
//!
//! Match notifications leave the engine through an [`EventPublisher`].
//! Backends:
//!
//! - **memory**: collects events in process ([`InMemoryPublisher`])
//! - **log**: writes one structured log line per event ([`LogPublisher`])
//! - **nats**: publishes a JSON [`MessageEnvelope`] per event on a subject
//!   ([`NatsPublisher`])
//!
//! Publishing never fails from the caller's point of view; transport errors
//! are logged and counted in [`MESSAGING_METRICS`].

mod config;
mod error;
mod events;
mod factory;
mod memory;
mod metrics;
mod nats;
mod traits;

pub use self::config::{MessagingBackend, MessagingConfig, NatsConfig};
pub use error::{MessagingError, MessagingResult};
pub use events::{EventKind, MatchAlertParams, MessageEnvelope, MessageMetadata, NotificationEvent};
pub use factory::create_publisher;
pub use memory::{InMemoryPublisher, LogPublisher};
pub use metrics::{init_messaging_metrics, MESSAGING_METRICS};
pub use nats::NatsPublisher;
pub use traits::EventPublisher;
