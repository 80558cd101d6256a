//! Predefined scheduled tasks

use super::config::JobConfig;
use super::error::{SchedulerError, SchedulerResult};
use super::jobs::{Job, JobContext, JobMetadata};
use crate::alerts::AlertScanner;
use std::sync::Arc;
use tracing::{info, warn};

pub const CHECK_ALERTS_JOB: &str = "check_alerts";

/// Run one alert scan cycle.
///
/// Individual alert failures are part of a successful cycle; only a cycle
/// that could not scan, or was cancelled, fails the job.
///
/// Default schedule: every 5 minutes (`0 */5 * * * *`)
pub async fn check_alerts(scanner: Arc<AlertScanner>, ctx: JobContext) -> SchedulerResult<()> {
    let report = scanner.run(&ctx.cancel).await;

    if report.overlapped {
        warn!("check_alerts skipped, previous cycle still running");
        return Ok(());
    }

    if let Some(error) = report.error {
        return Err(SchedulerError::JobExecutionFailed(error));
    }

    if report.cancelled {
        return Err(SchedulerError::JobExecutionFailed(format!(
            "cycle cancelled with {} alerts not started",
            report.not_started
        )));
    }

    info!(
        committed = report.committed,
        skipped = report.skipped,
        failed = report.failed,
        notifications = report.notifications,
        "check_alerts completed"
    );

    Ok(())
}

/// The `check_alerts` job bound to a scanner
pub fn check_alerts_job(config: &JobConfig, scanner: Arc<AlertScanner>) -> Job {
    let metadata = JobMetadata::new(CHECK_ALERTS_JOB, config.schedule.clone())
        .with_description("Re-run every saved query and notify owners of new matches")
        .with_config(config.config.clone());

    Job::new(metadata, move |ctx| check_alerts(scanner.clone(), ctx))
}
