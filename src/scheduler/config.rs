//! Configuration for the scheduler module

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the scheduler service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the scheduler is enabled
    pub enabled: bool,

    /// Upper bound on one job execution (seconds); the job is cancelled after it
    pub job_timeout_secs: u64,

    /// Predefined jobs configuration
    pub jobs: JobsConfig,
}

impl SchedulerConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Configuration for predefined scheduled jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Periodic alert scan cycle
    pub check_alerts: JobConfig,
}

/// Configuration for a single scheduled job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Whether this job is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression with a leading seconds field
    pub schedule: String,

    /// Job-specific configuration as JSON
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            job_timeout_secs: 900,
            jobs: JobsConfig::default(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            check_alerts: JobConfig {
                enabled: true,
                schedule: "0 */5 * * * *".to_string(), // Every 5 minutes
                config: serde_json::Value::Null,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

/// Builder for SchedulerConfig
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout_secs = timeout.as_secs();
        self
    }

    pub fn check_alerts_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.config.jobs.check_alerts.schedule = schedule.into();
        self
    }

    pub fn check_alerts_enabled(mut self, enabled: bool) -> Self {
        self.config.jobs.check_alerts.enabled = enabled;
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
