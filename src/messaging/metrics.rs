//! Prometheus metrics for messaging

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Messaging metrics
pub struct MessagingMetrics {
    /// Events published counter
    pub events_published: CounterVec,

    /// Publish failures
    pub publish_failures: CounterVec,

    /// Publish latency
    pub publish_latency: HistogramVec,

    /// Message size histogram
    pub message_size: HistogramVec,
}

lazy_static! {
    pub static ref MESSAGING_METRICS: MessagingMetrics = MessagingMetrics {
        events_published: register_counter_vec!(
            "qae_messaging_events_published_total",
            "Total number of notification events published",
            &["event", "backend"]
        )
        .unwrap(),

        publish_failures: register_counter_vec!(
            "qae_messaging_publish_failures_total",
            "Total number of publish failures",
            &["backend", "error"]
        )
        .unwrap(),

        publish_latency: register_histogram_vec!(
            "qae_messaging_publish_latency_seconds",
            "Event publish latency in seconds",
            &["backend"]
        )
        .unwrap(),

        message_size: register_histogram_vec!(
            "qae_messaging_message_size_bytes",
            "Published message size in bytes",
            &["backend"],
            prometheus::exponential_buckets(64.0, 4.0, 8).unwrap()
        )
        .unwrap(),
    };
}

/// Initialize messaging metrics
pub fn init_messaging_metrics() {
    lazy_static::initialize(&MESSAGING_METRICS);
}

/// Count one successfully published event
pub(crate) fn record_published(event: &str, backend: &str) {
    MESSAGING_METRICS
        .events_published
        .with_label_values(&[event, backend])
        .inc();
}

/// Count one failed publish
pub(crate) fn record_failure(backend: &str, error: &str) {
    MESSAGING_METRICS
        .publish_failures
        .with_label_values(&[backend, error])
        .inc();
}
