//! Saved-query alerts
//!
//! - [`AlertScanner`] runs the periodic scan-and-match cycle
//! - [`MatchNotifier`] emits one notification per matched item
//! - [`AlertCache`] and [`CachedAlertStore`] keep alert snapshots cached and
//!   invalidate them on every mutation
//! - [`AlertService`] manages alerts on behalf of their owners

mod cache;
mod notifier;
mod scanner;
mod service;

pub use cache::{AlertCache, AlertSnapshot, CachedAlertStore};
pub use notifier::MatchNotifier;
pub use scanner::{AlertOutcome, AlertScanner, CycleReport, ScanFailure, SkipReason};
pub use service::AlertService;
