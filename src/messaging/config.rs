//! Messaging configuration

use serde::{Deserialize, Serialize};

/// Where notification events go
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessagingBackend {
    /// Kept in process memory (tests, dry runs)
    Memory,
    /// Written to the structured log
    #[default]
    Log,
    /// Published to a NATS subject
    Nats,
}

/// NATS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,

    /// Connection name
    pub connection_name: String,

    /// Maximum reconnect attempts
    pub max_reconnects: Option<usize>,

    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            connection_name: "query-alert-engine".to_string(),
            max_reconnects: Some(10),
            request_timeout_ms: 5000,
        }
    }
}

/// Main messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Backend to use
    pub backend: MessagingBackend,

    /// NATS configuration
    pub nats: NatsConfig,

    /// Subject match notifications are published on
    pub subject: String,

    /// Maximum message size in bytes
    pub max_message_size: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: MessagingBackend::default(),
            nats: NatsConfig::default(),
            subject: "alerts.match".to_string(),
            max_message_size: 1_048_576, // 1MB
        }
    }
}
