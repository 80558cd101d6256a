pub mod cache;
pub mod factory;
pub mod redis_cache;
pub mod sled_store;
pub mod store;

pub use cache::*;
pub use factory::{create_cache_store, create_in_memory_store, create_store, StoreHandles};
pub use redis_cache::RedisCacheStore;
pub use sled_store::SledStore;
pub use store::*;

use crate::error::Result;
use crate::models::{Alert, AlertId, Role, RoleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for alert storage operations
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Ids of every stored alert
    async fn all_ids(&self) -> Result<Vec<AlertId>>;

    /// Get an alert by ID
    async fn by_id(&self, id: &AlertId) -> Result<Option<Alert>>;

    /// Alerts owned by a role
    async fn list_by_role(&self, role_id: &RoleId) -> Result<Vec<Alert>>;

    /// Insert or replace an alert
    async fn save_alert(&self, alert: &Alert) -> Result<()>;

    /// Delete an alert; returns whether it existed
    async fn delete_alert(&self, id: &AlertId) -> Result<bool>;

    /// Remove duplicate alerts, returning the ids that were deleted
    async fn dedupe(&self) -> Result<Vec<AlertId>>;

    /// Open a unit of work for one alert's watermark update
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// A scoped persistence session.
///
/// Changes are staged and only become visible on `commit`. Dropping a unit
/// without committing discards everything it staged.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Advance the alert's watermark to `now` and stage the change
    async fn advance_watermark(&mut self, alert: &mut Alert, now: DateTime<Utc>) -> Result<()>;

    /// Persist staged changes; returns the ids that were written
    async fn commit(self: Box<Self>) -> Result<Vec<AlertId>>;

    /// Discard staged changes
    async fn rollback(self: Box<Self>);
}

/// Trait for role lookups
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Get a role by ID
    async fn role_by_id(&self, id: &RoleId) -> Result<Option<Role>>;

    /// Insert or replace a role
    async fn save_role(&self, role: &Role) -> Result<()>;
}

/// Apply a staged watermark update onto the stored record.
///
/// Only watermark bookkeeping is copied so a concurrent edit of the query
/// is not lost, and the stored watermark never moves backward.
pub(crate) fn merge_watermark(stored: &mut Alert, staged: &Alert) {
    stored.notified_at = stored.notified_at.max(staged.notified_at);
    stored.updated_at = stored.updated_at.max(staged.updated_at);
}
