use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::role::RoleId;

/// Unique alert identifier
pub type AlertId = Uuid;

/// A saved search owned by a role and re-executed on every scan cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Alert {
    /// Unique alert identifier
    pub id: AlertId,

    /// Owning role
    pub role_id: RoleId,

    /// Free-form search expression, stored as entered
    #[validate(length(min = 1, max = 4096))]
    pub query: String,

    /// Exclusive lower bound for results that still need a notification
    pub notified_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert that has never been notified
    pub fn new(role_id: RoleId, query: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            role_id,
            query: query.into(),
            notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the watermark (builder style, mostly for seeding data)
    pub fn with_notified_at(mut self, notified_at: DateTime<Utc>) -> Self {
        self.notified_at = Some(notified_at);
        self
    }

    /// Query text with whitespace collapsed and case folded.
    ///
    /// Two alerts of the same owner with the same normalized query are
    /// duplicates of each other.
    pub fn normalized_query(&self) -> String {
        normalize_query(&self.query)
    }

    /// Generate fingerprint for deduplication
    pub fn generate_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.role_id.as_bytes());
        hasher.update(self.normalized_query().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Move the watermark to `now`.
    ///
    /// The watermark never moves backward: a stored value ahead of `now`
    /// (clock skew between workers) is kept.
    pub fn advance_watermark(&mut self, now: DateTime<Utc>) {
        self.notified_at = Some(match self.notified_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        self.updated_at = now;
    }
}

/// Collapse runs of whitespace and lowercase a query string
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| term.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
