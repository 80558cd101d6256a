//! Prometheus metrics for the scheduler module

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Gauge, GaugeVec, HistogramVec,
};

/// Scheduler metrics collection
pub struct SchedulerMetrics {
    /// Number of registered jobs
    pub jobs_registered: Gauge,

    /// Job executions by job and result
    pub executions_total: CounterVec,

    /// Job execution duration in seconds
    pub execution_duration: HistogramVec,

    /// Number of currently running executions per job
    pub running_jobs: GaugeVec,

    /// Last execution timestamp (Unix timestamp)
    pub last_execution: GaugeVec,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self {
            jobs_registered: register_gauge!(
                "qae_scheduler_jobs_registered",
                "Number of registered scheduled jobs"
            )
            .unwrap(),

            executions_total: register_counter_vec!(
                "qae_scheduler_executions_total",
                "Total number of job executions",
                &["job_name", "result"]
            )
            .unwrap(),

            execution_duration: register_histogram_vec!(
                "qae_scheduler_execution_duration_seconds",
                "Job execution duration in seconds",
                &["job_name"],
                vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
            )
            .unwrap(),

            running_jobs: register_gauge_vec!(
                "qae_scheduler_running_jobs",
                "Number of currently running job executions",
                &["job_name"]
            )
            .unwrap(),

            last_execution: register_gauge_vec!(
                "qae_scheduler_last_execution_timestamp",
                "Unix timestamp of last job execution",
                &["job_name"]
            )
            .unwrap(),
        }
    }

    pub fn record_execution_start(&self, job_name: &str) {
        self.running_jobs.with_label_values(&[job_name]).inc();
    }

    pub fn record_execution_complete(&self, job_name: &str, result: &str, duration_secs: f64) {
        self.running_jobs.with_label_values(&[job_name]).dec();

        self.executions_total
            .with_label_values(&[job_name, result])
            .inc();

        self.execution_duration
            .with_label_values(&[job_name])
            .observe(duration_secs);

        self.last_execution
            .with_label_values(&[job_name])
            .set(chrono::Utc::now().timestamp() as f64);
    }

    pub fn update_job_count(&self, count: usize) {
        self.jobs_registered.set(count as f64);
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Global scheduler metrics instance
    pub static ref SCHEDULER_METRICS: SchedulerMetrics = SchedulerMetrics::new();
}

/// Initialize scheduler metrics (idempotent)
pub fn init_scheduler_metrics() {
    lazy_static::initialize(&SCHEDULER_METRICS);
}
