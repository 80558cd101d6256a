//! Job definitions and management

use super::error::SchedulerResult;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for a scheduled job
pub type JobId = Uuid;

/// Status of a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next tick
    Scheduled,
    Running,
    /// Last execution succeeded
    Completed,
    /// Last execution failed or timed out
    Failed,
}

/// Metadata about a scheduled job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub id: JobId,

    /// Human-readable job name, used as the metrics label
    pub name: String,

    pub description: Option<String>,

    /// Cron expression
    pub schedule: String,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    /// When the job last finished
    pub last_run: Option<DateTime<Utc>>,

    /// Error of the last failed execution
    pub last_error: Option<String>,

    pub run_count: u64,
    pub success_count: u64,
    pub failure_count: u64,

    /// Average execution duration in milliseconds
    pub avg_duration_ms: f64,

    /// Job-specific configuration
    pub config: serde_json::Value,
}

impl JobMetadata {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            schedule: schedule.into(),
            status: JobStatus::Scheduled,
            created_at: Utc::now(),
            last_run: None,
            last_error: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            avg_duration_ms: 0.0,
            config: serde_json::Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn update_execution(&mut self, error: Option<String>, duration_ms: u64) {
        self.run_count += 1;
        match error {
            None => {
                self.success_count += 1;
                self.status = JobStatus::Completed;
            }
            Some(_) => {
                self.failure_count += 1;
                self.status = JobStatus::Failed;
            }
        }
        self.last_error = error;

        // Incremental mean
        self.avg_duration_ms = ((self.avg_duration_ms * (self.run_count - 1) as f64)
            + duration_ms as f64)
            / self.run_count as f64;

        self.last_run = Some(Utc::now());
    }

    pub fn success_rate(&self) -> f64 {
        if self.run_count == 0 {
            0.0
        } else {
            (self.success_count as f64 / self.run_count as f64) * 100.0
        }
    }
}

/// Context passed to job execution functions
#[derive(Clone)]
pub struct JobContext {
    /// Snapshot of the job's metadata at execution start
    pub metadata: JobMetadata,

    /// Cancelled on shutdown or when the execution times out
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn new(metadata: JobMetadata, cancel: CancellationToken) -> Self {
        Self { metadata, cancel }
    }
}

type JobFn = dyn Fn(JobContext) -> BoxFuture<'static, SchedulerResult<()>> + Send + Sync;

/// A scheduled job
pub struct Job {
    metadata: tokio::sync::RwLock<JobMetadata>,
    execute: Arc<JobFn>,
}

impl Job {
    pub fn new<F, Fut>(metadata: JobMetadata, execute: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
    {
        Self {
            metadata: tokio::sync::RwLock::new(metadata),
            execute: Arc::new(move |ctx| Box::pin(execute(ctx))),
        }
    }

    pub async fn get_metadata(&self) -> JobMetadata {
        self.metadata.read().await.clone()
    }

    /// Run once with the given cancellation token, updating statistics
    pub async fn execute(&self, cancel: CancellationToken) -> SchedulerResult<()> {
        let start = std::time::Instant::now();

        let ctx = {
            let mut metadata = self.metadata.write().await;
            metadata.status = JobStatus::Running;
            JobContext::new(metadata.clone(), cancel)
        };

        let result = (self.execute)(ctx).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.metadata.write().await.update_execution(
            result.as_ref().err().map(|e| e.to_string()),
            duration_ms,
        );

        result
    }
}
