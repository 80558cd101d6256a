//! Core scheduler service implementation

use super::{
    config::SchedulerConfig,
    error::{SchedulerError, SchedulerResult},
    jobs::{Job, JobId, JobMetadata, JobStatus},
    metrics::SCHEDULER_METRICS,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_cron_scheduler::{JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct RegisteredJob {
    job: Arc<Job>,
    cron_id: Uuid,
}

/// Runs registered jobs on their cron schedules
pub struct SchedulerService {
    config: SchedulerConfig,

    /// Underlying tokio-cron-scheduler instance
    scheduler: JobScheduler,

    jobs: Arc<DashMap<JobId, RegisteredJob>>,

    running: Arc<tokio::sync::RwLock<bool>>,

    /// Parent of every execution's cancellation token
    shutdown: CancellationToken,
}

impl SchedulerService {
    pub async fn new(config: SchedulerConfig, shutdown: CancellationToken) -> SchedulerResult<Self> {
        info!("Initializing scheduler service");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(Self {
            config,
            scheduler,
            jobs: Arc::new(DashMap::new()),
            running: Arc::new(tokio::sync::RwLock::new(false)),
            shutdown,
        })
    }

    pub async fn start(&mut self) -> SchedulerResult<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in configuration");
            return Ok(());
        }

        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Scheduler is already running");
                return Ok(());
            }
            *running = true;
        }

        info!(jobs = self.jobs.len(), "Starting scheduler service");

        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(())
    }

    /// Stop firing new executions; in-flight ones observe the shutdown token
    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        info!("Shutting down scheduler service");

        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Scheduler is not running");
                return Ok(());
            }
            *running = false;
        }

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))?;

        info!("Scheduler service shut down successfully");

        Ok(())
    }

    /// Register a job on its cron schedule
    pub async fn add_job(&self, job: Job) -> SchedulerResult<JobId> {
        let metadata = job.get_metadata().await;
        let job_id = metadata.id;

        info!(job_id = %job_id, job_name = %metadata.name, schedule = %metadata.schedule, "Adding job to scheduler");

        let job = Arc::new(job);
        let task_job = job.clone();
        let shutdown = self.shutdown.clone();
        let timeout = self.config.job_timeout();

        let cron_job = tokio_cron_scheduler::Job::new_async(metadata.schedule.as_str(), move |_uuid, _l| {
            let job = task_job.clone();
            let shutdown = shutdown.clone();
            Box::pin(async move {
                let _ = run_job(&job, &shutdown, timeout).await;
            })
        })
        .map_err(|e: JobSchedulerError| SchedulerError::JobCreationFailed(e.to_string()))?;

        let cron_id = self
            .scheduler
            .add(cron_job)
            .await
            .map_err(|e| SchedulerError::JobCreationFailed(e.to_string()))?;

        self.jobs.insert(job_id, RegisteredJob { job, cron_id });
        SCHEDULER_METRICS.update_job_count(self.jobs.len());

        Ok(job_id)
    }

    pub async fn remove_job(&self, job_id: &JobId) -> SchedulerResult<()> {
        let (_, registered) = self
            .jobs
            .remove(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        self.scheduler.remove(&registered.cron_id).await?;
        SCHEDULER_METRICS.update_job_count(self.jobs.len());

        info!(job_id = %job_id, "Job removed");

        Ok(())
    }

    /// Execute a registered job immediately, outside its schedule
    pub async fn run_now(&self, job_id: &JobId) -> SchedulerResult<()> {
        let job = self
            .jobs
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        run_job(&job, &self.shutdown, self.config.job_timeout()).await
    }

    pub async fn get_job_metadata(&self, job_id: &JobId) -> SchedulerResult<JobMetadata> {
        let job = self
            .jobs
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        Ok(job.get_metadata().await)
    }

    pub async fn list_jobs(&self) -> Vec<JobMetadata> {
        let jobs: Vec<Arc<Job>> = self.jobs.iter().map(|entry| entry.job.clone()).collect();

        let mut metadata = Vec::with_capacity(jobs.len());
        for job in jobs {
            metadata.push(job.get_metadata().await);
        }
        metadata
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let jobs = self.list_jobs().await;

        let total_executions: u64 = jobs.iter().map(|j| j.run_count).sum();
        let total_failures: u64 = jobs.iter().map(|j| j.failure_count).sum();

        let success_rate = if total_executions > 0 {
            ((total_executions - total_failures) as f64 / total_executions as f64) * 100.0
        } else {
            0.0
        };

        SchedulerStats {
            total_jobs: jobs.len(),
            running_jobs: jobs.iter().filter(|j| j.status == JobStatus::Running).count(),
            total_executions,
            total_failures,
            success_rate,
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// One execution: metrics, a child cancellation token and the timeout.
///
/// On timeout the job is cancelled and awaited so it can release what it holds.
async fn run_job(job: &Job, shutdown: &CancellationToken, timeout: Duration) -> SchedulerResult<()> {
    let metadata = job.get_metadata().await;
    let job_name = metadata.name;
    let job_id = metadata.id;

    if shutdown.is_cancelled() {
        debug!(job_id = %job_id, job_name = %job_name, "Shutdown in progress, not starting job");
        return Ok(());
    }

    debug!(job_id = %job_id, job_name = %job_name, "Executing scheduled job");
    SCHEDULER_METRICS.record_execution_start(&job_name);

    let start = Instant::now();
    let cancel = shutdown.child_token();
    let execution = job.execute(cancel.clone());
    tokio::pin!(execution);

    let result = tokio::select! {
        result = &mut execution => result,
        _ = tokio::time::sleep(timeout) => {
            cancel.cancel();
            let _ = execution.await;
            Err(SchedulerError::JobTimedOut(timeout.as_secs()))
        }
    };

    let duration = start.elapsed();
    let label = match &result {
        Ok(()) => "success",
        Err(SchedulerError::JobTimedOut(_)) => "timeout",
        Err(_) => "failure",
    };
    SCHEDULER_METRICS.record_execution_complete(&job_name, label, duration.as_secs_f64());

    match &result {
        Ok(()) => {
            info!(
                job_id = %job_id,
                job_name = %job_name,
                duration_ms = duration.as_millis() as u64,
                "Job executed successfully"
            );
        }
        Err(e) => {
            error!(
                job_id = %job_id,
                job_name = %job_name,
                error = %e,
                duration_ms = duration.as_millis() as u64,
                "Job execution failed"
            );
        }
    }

    result
}

/// Statistics about the scheduler
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub total_executions: u64,
    pub total_failures: u64,
    pub success_rate: f64,
}
