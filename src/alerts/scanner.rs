//! The alert scan cycle
//!
//! One cycle removes duplicate alerts, then runs every remaining alert
//! through a bounded pool:
//!
//! ```text
//! LOAD ─▶ ELIGIBILITY ─┬─▶ SKIP
//!                      └─▶ QUERY ─▶ EXECUTE ─▶ NOTIFY(0..n) ─▶ ADVANCE ─▶ COMMIT
//! ```
//!
//! Each alert gets its own unit of work. Any failure before commit leaves
//! that alert's watermark untouched and does not affect other alerts.
//! Cancellation is observed up to the commit; a started commit, including its
//! cache invalidation, always completes.

use crate::authz::AuthzFilterProvider;
use crate::config::ScannerConfig;
use crate::messaging::EventPublisher;
use crate::metrics::{
    ALERTS_DEDUPLICATED_TOTAL, ALERTS_PROCESSED_TOTAL, SCAN_CYCLES_TOTAL,
    SCAN_CYCLE_DURATION_SECONDS, TRUNCATED_SEARCHES_TOTAL, UNPACK_FAILURES_TOTAL,
};
use crate::models::AlertId;
use crate::search::{unpack_hit, IndexClient, QueryBuilder};
use crate::state::{AlertStore, RoleStore};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::notifier::MatchNotifier;

/// Why an alert was not scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Alert no longer exists
    AlertAbsent,
    /// Owning role no longer exists
    OwnerAbsent,
    /// Owner is muted, blocked, deleted, or has no email
    OwnerNotAlertable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlertAbsent => "alert_absent",
            SkipReason::OwnerAbsent => "owner_absent",
            SkipReason::OwnerNotAlertable => "owner_not_alertable",
        }
    }
}

/// Why an alert's scan failed; its watermark was not advanced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ScanFailure {
    #[error("Failed to load alert or owner: {0}")]
    Loading(String),

    #[error("Failed to resolve authorization: {0}")]
    Authorization(String),

    #[error("Index search failed: {0}")]
    Index(String),

    #[error("Failed to persist watermark: {0}")]
    Persistence(String),

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanFailure::Loading(_) => "loading",
            ScanFailure::Authorization(_) => "authorization",
            ScanFailure::Index(_) => "index",
            ScanFailure::Persistence(_) => "persistence",
            ScanFailure::Cancelled => "cancelled",
        }
    }
}

/// Terminal state of one alert within a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Watermark advanced after `matches` notifications
    Committed { matches: usize },
    Skipped { reason: SkipReason },
    Failed { failure: ScanFailure },
}

impl AlertOutcome {
    fn record(&self) {
        let (outcome, reason) = match self {
            AlertOutcome::Committed { .. } => ("committed", ""),
            AlertOutcome::Skipped { reason } => ("skipped", reason.as_str()),
            AlertOutcome::Failed { failure } => ("failed", failure.as_str()),
        };
        ALERTS_PROCESSED_TOTAL
            .with_label_values(&[outcome, reason])
            .inc();
    }
}

impl From<ScanFailure> for AlertOutcome {
    fn from(failure: ScanFailure) -> Self {
        AlertOutcome::Failed { failure }
    }
}

/// Summary of one scan cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Alerts considered after dedupe
    pub total: usize,
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Alerts never started because the cycle was cancelled
    pub not_started: usize,

    /// Notifications dispatched across all committed alerts
    pub notifications: usize,

    /// Duplicates removed before scanning
    pub deduplicated: usize,

    pub cancelled: bool,

    /// Another cycle was still running; nothing was scanned
    pub overlapped: bool,

    /// Cycle-level error that prevented scanning
    pub error: Option<String>,

    pub outcomes: Vec<(AlertId, AlertOutcome)>,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total: 0,
            committed: 0,
            skipped: 0,
            failed: 0,
            not_started: 0,
            notifications: 0,
            deduplicated: 0,
            cancelled: false,
            overlapped: false,
            error: None,
            outcomes: Vec::new(),
        }
    }

    /// Outcome recorded for one alert
    pub fn outcome(&self, id: &AlertId) -> Option<&AlertOutcome> {
        self.outcomes
            .iter()
            .find(|(alert_id, _)| alert_id == id)
            .map(|(_, outcome)| outcome)
    }

    fn result_label(&self) -> &'static str {
        if self.overlapped {
            "overlapped"
        } else if self.error.is_some() {
            "aborted"
        } else if self.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    }
}

/// Runs scan cycles over all stored alerts
pub struct AlertScanner {
    alerts: Arc<dyn AlertStore>,
    roles: Arc<dyn RoleStore>,
    authz: Arc<dyn AuthzFilterProvider>,
    index: Arc<dyn IndexClient>,
    notifier: MatchNotifier,
    queries: QueryBuilder,
    index_name: String,
    concurrency: usize,
    running: tokio::sync::Mutex<()>,
}

impl AlertScanner {
    pub fn new(
        config: &ScannerConfig,
        alerts: Arc<dyn AlertStore>,
        roles: Arc<dyn RoleStore>,
        authz: Arc<dyn AuthzFilterProvider>,
        index: Arc<dyn IndexClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            alerts,
            roles,
            authz,
            index,
            notifier: MatchNotifier::new(publisher),
            queries: QueryBuilder::new(config),
            index_name: config.index.clone(),
            concurrency: config.concurrency.max(1),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one full cycle.
    ///
    /// Returns immediately with `overlapped` set when another cycle on this
    /// scanner is still in progress.
    #[instrument(skip_all, fields(cycle_id = %uuid::Uuid::now_v7()))]
    pub async fn run(&self, cancel: &CancellationToken) -> CycleReport {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut report = CycleReport::empty(started_at);

        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("Previous scan cycle still running, skipping");
            report.overlapped = true;
            SCAN_CYCLES_TOTAL.with_label_values(&[report.result_label()]).inc();
            return report;
        };

        match self.alerts.dedupe().await {
            Ok(removed) => {
                if !removed.is_empty() {
                    tracing::info!(removed = removed.len(), "Removed duplicate alerts");
                }
                report.deduplicated = removed.len();
                ALERTS_DEDUPLICATED_TOTAL.inc_by(removed.len() as u64);
            }
            Err(e) => {
                tracing::error!(error = %e, "Alert dedupe failed, scanning without it");
            }
        }

        let ids = match self.alerts.all_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list alerts");
                report.error = Some(e.to_string());
                return self.finish(report, timer);
            }
        };

        report.total = ids.len();
        tracing::info!(alerts = ids.len(), "Scan cycle started");

        let outcomes: Mutex<Vec<(AlertId, AlertOutcome)>> = Mutex::new(Vec::with_capacity(ids.len()));
        let now = started_at;

        futures::stream::iter(ids)
            .for_each_concurrent(self.concurrency, |id| {
                let outcomes = &outcomes;
                async move {
                    if cancel.is_cancelled() {
                        return;
                    }

                    let outcome = self.check_alert(id, now, cancel).await;
                    outcome.record();
                    outcomes.lock().push((id, outcome));
                }
            })
            .await;

        report.outcomes = outcomes.into_inner();
        report.cancelled = cancel.is_cancelled();

        for (_, outcome) in &report.outcomes {
            match outcome {
                AlertOutcome::Committed { matches } => {
                    report.committed += 1;
                    report.notifications += matches;
                }
                AlertOutcome::Skipped { .. } => report.skipped += 1,
                AlertOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.not_started = report.total - report.outcomes.len();

        self.finish(report, timer)
    }

    fn finish(&self, mut report: CycleReport, timer: Instant) -> CycleReport {
        report.finished_at = Utc::now();

        let label = report.result_label();
        SCAN_CYCLES_TOTAL.with_label_values(&[label]).inc();
        SCAN_CYCLE_DURATION_SECONDS
            .with_label_values(&[label])
            .observe(timer.elapsed().as_secs_f64());

        tracing::info!(
            total = report.total,
            committed = report.committed,
            skipped = report.skipped,
            failed = report.failed,
            not_started = report.not_started,
            notifications = report.notifications,
            cancelled = report.cancelled,
            "Scan cycle finished"
        );

        report
    }

    /// Scan one alert, using `now` as the new watermark.
    ///
    /// `cancel` is honoured until the commit starts; once the watermark is
    /// being written the alert runs to completion.
    #[instrument(skip_all, fields(alert_id = %id))]
    pub async fn check_alert(
        &self,
        id: AlertId,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> AlertOutcome {
        let outcome = match self.try_check_alert(id, now, cancel).await {
            Ok(outcome) => outcome,
            Err(failure) => AlertOutcome::from(failure),
        };

        match &outcome {
            AlertOutcome::Committed { matches } => {
                tracing::debug!(matches, "Alert committed");
            }
            AlertOutcome::Skipped { reason } => {
                tracing::info!(reason = reason.as_str(), "Alert skipped");
            }
            AlertOutcome::Failed { failure } => {
                tracing::warn!(reason = failure.as_str(), error = %failure, "Alert scan failed");
            }
        }

        outcome
    }

    async fn try_check_alert(
        &self,
        id: AlertId,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<AlertOutcome, ScanFailure> {
        let Some(mut alert) = self
            .alerts
            .by_id(&id)
            .await
            .map_err(|e| ScanFailure::Loading(e.to_string()))?
        else {
            return Ok(AlertOutcome::Skipped {
                reason: SkipReason::AlertAbsent,
            });
        };

        let Some(role) = self
            .roles
            .role_by_id(&alert.role_id)
            .await
            .map_err(|e| ScanFailure::Loading(e.to_string()))?
        else {
            return Ok(AlertOutcome::Skipped {
                reason: SkipReason::OwnerAbsent,
            });
        };

        if !role.is_alertable() {
            return Ok(AlertOutcome::Skipped {
                reason: SkipReason::OwnerNotAlertable,
            });
        }

        let authz = self
            .authz
            .from_identity(&role)
            .await
            .map_err(|e| ScanFailure::Authorization(e.to_string()))?;
        let query = self.queries.build(&alert, now, self.authz.filter_fragment(&authz));

        if cancel.is_cancelled() {
            return Err(ScanFailure::Cancelled);
        }

        let mut uow = self
            .alerts
            .begin()
            .await
            .map_err(|e| ScanFailure::Persistence(e.to_string()))?;

        let searched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.index.search(&self.index_name, &query) => Some(result),
        };

        let hits = match searched {
            Some(Ok(hits)) => hits,
            Some(Err(e)) => {
                uow.rollback().await;
                return Err(ScanFailure::Index(e.to_string()));
            }
            None => {
                uow.rollback().await;
                return Err(ScanFailure::Cancelled);
            }
        };

        if hits.total > hits.hits.len() {
            tracing::warn!(total = hits.total, page = hits.hits.len(), "Result set truncated at page size");
            TRUNCATED_SEARCHES_TOTAL.inc();
        }

        let mut matches = 0;
        for hit in &hits.hits {
            match unpack_hit(hit) {
                Ok(item) => {
                    self.notifier.notify(&alert, &role, item).await;
                    matches += 1;
                }
                Err(e) => {
                    tracing::warn!(hit_id = %hit.id, error = %e, "Skipping unreadable hit");
                    UNPACK_FAILURES_TOTAL.inc();
                }
            }
        }

        if cancel.is_cancelled() {
            uow.rollback().await;
            return Err(ScanFailure::Cancelled);
        }

        if let Err(e) = uow.advance_watermark(&mut alert, now).await {
            uow.rollback().await;
            return Err(ScanFailure::Persistence(e.to_string()));
        }

        // Not raced against `cancel`: a commit that started always finishes
        let written = uow
            .commit()
            .await
            .map_err(|e| ScanFailure::Persistence(e.to_string()))?;

        if !written.contains(&id) {
            // Deleted while being scanned
            return Ok(AlertOutcome::Skipped {
                reason: SkipReason::AlertAbsent,
            });
        }

        Ok(AlertOutcome::Committed { matches })
    }
}
