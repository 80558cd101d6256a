//! Prometheus metrics for the scan cycle
//!
//! Scanner metrics live in [`PROMETHEUS_REGISTRY`] and are registered by
//! [`init_metrics`]. Messaging and scheduler metrics use the default
//! registry; [`gather_metrics`] renders both.
//!
//! # Example
//! ```no_run
//! use query_alert_engine::metrics;
//!
//! metrics::init_metrics().unwrap();
//! println!("{}", metrics::gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};

const NAMESPACE: &str = "query_alert_engine";

lazy_static! {
    /// Global Prometheus registry for scanner metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Scan cycles by result
    ///
    /// Labels: result (completed, cancelled, overlapped, aborted)
    pub static ref SCAN_CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("scan_cycles_total", "Total number of alert scan cycles").namespace(NAMESPACE),
        &["result"]
    ).expect("Failed to create SCAN_CYCLES_TOTAL metric");

    /// Scan cycle duration in seconds
    pub static ref SCAN_CYCLE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("scan_cycle_duration_seconds", "Alert scan cycle duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["result"]
    ).expect("Failed to create SCAN_CYCLE_DURATION_SECONDS metric");

    /// Alerts processed by terminal outcome
    ///
    /// Labels: outcome (committed, skipped, failed), reason
    pub static ref ALERTS_PROCESSED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("alerts_processed_total", "Total number of alerts processed").namespace(NAMESPACE),
        &["outcome", "reason"]
    ).expect("Failed to create ALERTS_PROCESSED_TOTAL metric");

    /// Duplicate alerts removed before scanning
    pub static ref ALERTS_DEDUPLICATED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("alerts_deduplicated_total", "Total number of duplicate alerts removed")
            .namespace(NAMESPACE)
    ).expect("Failed to create ALERTS_DEDUPLICATED_TOTAL metric");

    /// Match notifications handed to the publisher
    pub static ref NOTIFICATIONS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("notifications_total", "Total number of match notifications dispatched")
            .namespace(NAMESPACE)
    ).expect("Failed to create NOTIFICATIONS_TOTAL metric");

    /// Hits that could not be unpacked into matched items
    pub static ref UNPACK_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("unpack_failures_total", "Total number of index hits skipped as unreadable")
            .namespace(NAMESPACE)
    ).expect("Failed to create UNPACK_FAILURES_TOTAL metric");

    /// Searches whose result set exceeded the page size
    pub static ref TRUNCATED_SEARCHES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("truncated_searches_total", "Total number of alert searches cut at the page size")
            .namespace(NAMESPACE)
    ).expect("Failed to create TRUNCATED_SEARCHES_TOTAL metric");

    /// Cached snapshots that could not be deleted after a watermark commit
    pub static ref CACHE_INVALIDATION_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new(
            "cache_invalidation_failures_total",
            "Total number of alert snapshots left in the cache after a failed invalidation"
        )
        .namespace(NAMESPACE)
    ).expect("Failed to create CACHE_INVALIDATION_FAILURES_TOTAL metric");

    /// Build information
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information").namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register scanner metrics with [`PROMETHEUS_REGISTRY`]
///
/// Call once at startup; a second call fails with `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SCAN_CYCLES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SCAN_CYCLE_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ALERTS_PROCESSED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ALERTS_DEDUPLICATED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(UNPACK_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TRUNCATED_SEARCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CACHE_INVALIDATION_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut metric_families = PROMETHEUS_REGISTRY.gather();
    metric_families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
