//! Error types for the scheduler module

use crate::error::AppError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to start scheduler: {0}")]
    StartupFailed(String),

    #[error("Failed to shutdown scheduler: {0}")]
    ShutdownFailed(String),

    /// Cron registration failed, usually an invalid expression
    #[error("Failed to create job: {0}")]
    JobCreationFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job execution failed: {0}")]
    JobExecutionFailed(String),

    /// Execution exceeded the configured job timeout
    #[error("Job timed out after {0}s")]
    JobTimedOut(u64),

    #[error("Internal scheduler error: {0}")]
    InternalError(String),
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobNotFound(msg) => AppError::NotFound(msg),
            SchedulerError::JobCreationFailed(msg) => AppError::Configuration(msg),
            SchedulerError::JobTimedOut(secs) => {
                AppError::Timeout(format!("job exceeded {}s", secs))
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for SchedulerError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        SchedulerError::InternalError(format!("tokio-cron-scheduler error: {}", err))
    }
}
