use crate::authz::AuthzConfig;
use crate::messaging::MessagingConfig;
use crate::scheduler::SchedulerConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Alert scan cycle configuration
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Alert snapshot cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Alert/role storage configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Collection read grants
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Search index configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Notification publishing configuration
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Periodic job configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from `$CONFIG_PATH` (default `config/default.toml`) and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        Self::load_from(&config_path)
    }

    /// Load configuration layered as embedded defaults, `config_path` (optional), environment
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: QAE_)
            .add_source(
                config::Environment::with_prefix("QAE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Index holding the entities alerts are matched against
    #[serde(default = "default_index")]
    pub index: String,

    /// Full-text field the saved query is matched on
    #[serde(default = "default_text_field")]
    pub text_field: String,

    /// Timestamp field compared against the alert watermark
    #[serde(default = "default_created_at_field")]
    pub created_at_field: String,

    /// Share of query terms (percent) a hit must contain
    #[serde(default = "default_minimum_should_match")]
    pub minimum_should_match_percent: u8,

    /// Largest page the index client returns for one query
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Alerts processed concurrently within one cycle
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            text_field: default_text_field(),
            created_at_field: default_created_at_field(),
            minimum_should_match_percent: default_minimum_should_match(),
            max_page_size: default_max_page_size(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache backend type
    #[serde(default)]
    pub backend: CacheBackend,

    /// Redis connection string
    pub redis_url: Option<String>,

    /// Prefix for every cache key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Snapshot time-to-live (seconds)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum entries held by the in-process cache
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            ttl_secs: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for embedded database (sled)
    pub path: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Sled,
            path: Some(PathBuf::from("./data/state")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// Process memory; records do not survive a restart
    Memory,
    #[default]
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default value functions
fn default_index() -> String {
    "entities-thing".to_string()
}

fn default_text_field() -> String {
    "text".to_string()
}

fn default_created_at_field() -> String {
    "created_at".to_string()
}

fn default_minimum_should_match() -> u8 {
    90
}

fn default_max_page_size() -> usize {
    9999
}

fn default_concurrency() -> usize {
    4
}

fn default_key_prefix() -> String {
    "qae".to_string()
}

fn default_cache_ttl() -> u64 {
    84_600
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "query_alert_engine=info".to_string()
}

fn default_true() -> bool {
    true
}
