//! Saved-query alerting engine
//!
//! Roles register persistent search queries ("alerts"). A periodic job
//! re-runs every alert against the entity index, restricted to what the
//! owner may read and to entities newer than the alert's watermark, emits one
//! notification per new match and then advances the watermark.
//!
//! - [`alerts`]: scan cycle, notifier, snapshot cache, alert CRUD
//! - [`search`]: query building and the tantivy-backed index client
//! - [`authz`]: owner-scoped filter fragments
//! - [`state`]: alert/role storage and cache stores
//! - [`messaging`]: notification publishers
//! - [`scheduler`]: cron-driven `check_alerts` job

pub mod alerts;
pub mod authz;
pub mod config;
pub mod error;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod processing;
pub mod scheduler;
pub mod search;
pub mod shutdown;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
