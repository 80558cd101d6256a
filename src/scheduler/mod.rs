//! Cron-driven job scheduling
//!
//! Wraps `tokio-cron-scheduler` with per-job statistics, Prometheus metrics,
//! an execution timeout and cooperative cancellation. The engine registers a
//! single job, `check_alerts`, which runs one [`AlertScanner`](crate::alerts::AlertScanner)
//! cycle per tick.

mod config;
mod core;
mod error;
mod jobs;
mod metrics;
mod tasks;

pub use self::config::{JobConfig, JobsConfig, SchedulerConfig, SchedulerConfigBuilder};
pub use self::core::{SchedulerService, SchedulerStats};
pub use error::{SchedulerError, SchedulerResult};
pub use jobs::{Job, JobContext, JobId, JobMetadata, JobStatus};
pub use metrics::{init_scheduler_metrics, SCHEDULER_METRICS};
pub use tasks::{check_alerts, check_alerts_job, CHECK_ALERTS_JOB};

use crate::alerts::AlertScanner;
use std::sync::Arc;

/// Register every enabled predefined job
pub async fn register_default_jobs(
    service: &SchedulerService,
    config: &SchedulerConfig,
    scanner: Arc<AlertScanner>,
) -> SchedulerResult<Vec<JobId>> {
    let mut ids = Vec::new();

    if config.jobs.check_alerts.enabled {
        ids.push(service.add_job(check_alerts_job(&config.jobs.check_alerts, scanner)).await?);
    } else {
        tracing::info!("check_alerts job disabled");
    }

    Ok(ids)
}
