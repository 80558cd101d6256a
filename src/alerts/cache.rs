//! Alert snapshot caching

use crate::config::CacheConfig;
use crate::error::{AppError, Result};
use crate::metrics::CACHE_INVALIDATION_FAILURES_TOTAL;
use crate::models::{Alert, AlertId, RoleId};
use crate::state::{object_key, AlertStore, CacheStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Denormalized scalar fields of an alert, as held in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub id: AlertId,
    pub query: String,
    pub role_id: RoleId,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Alert> for AlertSnapshot {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            query: alert.query.clone(),
            role_id: alert.role_id,
            notified_at: alert.notified_at,
            created_at: alert.created_at,
            updated_at: alert.updated_at,
        }
    }
}

/// Typed read-through cache of [`AlertSnapshot`]s over a [`CacheStore`]
#[derive(Clone)]
pub struct AlertCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
    ttl: Duration,
}

impl AlertCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            prefix: config.key_prefix.clone(),
            ttl: config.ttl(),
        }
    }

    /// Default time-to-live of cached snapshots
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(&self, id: &AlertId) -> String {
        object_key(&self.prefix, "alert", id)
    }

    /// Cached snapshot, if any.
    ///
    /// Store failures and undecodable entries are logged and count as a miss.
    pub async fn get(&self, id: &AlertId) -> Option<AlertSnapshot> {
        let key = self.key(id);

        let value = match self.store.get_complex(&key).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(alert_id = %id, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(alert_id = %id, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set(&self, id: &AlertId, snapshot: &AlertSnapshot, ttl: Duration) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;
        self.store.set_complex(&self.key(id), value, ttl).await
    }

    /// Drop the cached snapshot; the next `get` misses
    pub async fn invalidate(&self, id: &AlertId) -> Result<()> {
        self.store.delete(&self.key(id)).await.map_err(|e| {
            tracing::error!(alert_id = %id, error = %e, "Failed to invalidate cached alert");
            e
        })
    }

    /// Snapshot of an alert, loading it from `alerts` on a miss.
    ///
    /// Absent alerts are not cached.
    pub async fn get_alert(&self, alerts: &dyn AlertStore, id: &AlertId) -> Result<Option<AlertSnapshot>> {
        if let Some(snapshot) = self.get(id).await {
            return Ok(Some(snapshot));
        }

        let Some(alert) = alerts.by_id(id).await? else {
            return Ok(None);
        };

        let snapshot = AlertSnapshot::from(&alert);
        if let Err(e) = self.set(id, &snapshot, self.ttl).await {
            tracing::warn!(alert_id = %id, error = %e, "Failed to cache alert snapshot");
        }

        Ok(Some(snapshot))
    }
}

/// [`AlertStore`] decorator that invalidates cached snapshots on every mutation
#[derive(Clone)]
pub struct CachedAlertStore {
    inner: Arc<dyn AlertStore>,
    cache: AlertCache,
}

impl CachedAlertStore {
    pub fn new(inner: Arc<dyn AlertStore>, cache: AlertCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &AlertCache {
        &self.cache
    }

    pub fn inner(&self) -> &dyn AlertStore {
        self.inner.as_ref()
    }

    /// Read-through snapshot lookup
    pub async fn get_alert(&self, id: &AlertId) -> Result<Option<AlertSnapshot>> {
        self.cache.get_alert(self.inner.as_ref(), id).await
    }

    async fn invalidate_all(&self, ids: &[AlertId]) -> Result<()> {
        let mut failed = 0;
        for id in ids {
            if self.cache.invalidate(id).await.is_err() {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(AppError::Cache(format!(
                "Failed to invalidate {} of {} cached alerts",
                failed,
                ids.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for CachedAlertStore {
    async fn all_ids(&self) -> Result<Vec<AlertId>> {
        self.inner.all_ids().await
    }

    async fn by_id(&self, id: &AlertId) -> Result<Option<Alert>> {
        self.inner.by_id(id).await
    }

    async fn list_by_role(&self, role_id: &RoleId) -> Result<Vec<Alert>> {
        self.inner.list_by_role(role_id).await
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        self.inner.save_alert(alert).await?;
        self.cache.invalidate(&alert.id).await
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<bool> {
        let existed = self.inner.delete_alert(id).await?;
        self.cache.invalidate(id).await?;
        Ok(existed)
    }

    async fn dedupe(&self) -> Result<Vec<AlertId>> {
        let removed = self.inner.dedupe().await?;
        self.invalidate_all(&removed).await?;
        Ok(removed)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(CachedUnitOfWork {
            inner: self.inner.begin().await?,
            cache: self.cache.clone(),
            staged: Vec::new(),
        }))
    }
}

/// Unit of work that invalidates staged alerts around the commit.
///
/// Snapshots are deleted before the write so a failing cache aborts the
/// commit, and again afterwards to drop anything a concurrent reader cached
/// from the old record in between.
struct CachedUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    cache: AlertCache,
    staged: Vec<AlertId>,
}

#[async_trait]
impl UnitOfWork for CachedUnitOfWork {
    async fn advance_watermark(&mut self, alert: &mut Alert, now: DateTime<Utc>) -> Result<()> {
        self.inner.advance_watermark(alert, now).await?;
        if !self.staged.contains(&alert.id) {
            self.staged.push(alert.id);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<AlertId>> {
        let Self { inner, cache, staged } = *self;

        for id in &staged {
            if let Err(e) = cache.invalidate(id).await {
                inner.rollback().await;
                return Err(e);
            }
        }

        let written = inner.commit().await?;

        for id in &written {
            if cache.invalidate(id).await.is_err() {
                CACHE_INVALIDATION_FAILURES_TOTAL.inc();
            }
        }

        Ok(written)
    }

    async fn rollback(self: Box<Self>) {
        self.inner.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InMemoryStore, MokaCacheStore};
    use uuid::Uuid;

    fn cache() -> AlertCache {
        let config = CacheConfig::default();
        let store = Arc::new(MokaCacheStore::new(config.max_capacity));
        AlertCache::new(store, &config)
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = cache();
        let alert = Alert::new(Uuid::new_v4(), "acme corp");
        let snapshot = AlertSnapshot::from(&alert);

        assert!(cache.get(&alert.id).await.is_none());

        cache.set(&alert.id, &snapshot, cache.ttl()).await.unwrap();
        assert_eq!(cache.get(&alert.id).await, Some(snapshot));

        cache.invalidate(&alert.id).await.unwrap();
        assert!(cache.get(&alert.id).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_expires() {
        let cache = cache();
        let alert = Alert::new(Uuid::new_v4(), "acme corp");

        cache
            .set(&alert.id, &AlertSnapshot::from(&alert), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get(&alert.id).await.is_none());
    }

    #[tokio::test]
    async fn test_key_format() {
        let cache = cache();
        let id = Uuid::nil();
        assert_eq!(cache.key(&id), format!("qae:object:alert:{}", id));
    }

    #[tokio::test]
    async fn test_read_through_and_invalidation_on_save() {
        let store = CachedAlertStore::new(Arc::new(InMemoryStore::new()), cache());
        let mut alert = Alert::new(Uuid::new_v4(), "acme corp");
        store.save_alert(&alert).await.unwrap();

        let first = store.get_alert(&alert.id).await.unwrap().unwrap();
        assert_eq!(first.query, "acme corp");
        assert!(store.cache().get(&alert.id).await.is_some());

        alert.query = "acme inc".to_string();
        store.save_alert(&alert).await.unwrap();
        assert!(store.cache().get(&alert.id).await.is_none());

        let second = store.get_alert(&alert.id).await.unwrap().unwrap();
        assert_eq!(second.query, "acme inc");
    }

    #[tokio::test]
    async fn test_absent_alert_is_not_cached() {
        let store = CachedAlertStore::new(Arc::new(InMemoryStore::new()), cache());
        let id = Uuid::new_v4();

        assert!(store.get_alert(&id).await.unwrap().is_none());
        assert!(store.cache().get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_commit_invalidates() {
        let store = CachedAlertStore::new(Arc::new(InMemoryStore::new()), cache());
        let mut alert = Alert::new(Uuid::new_v4(), "acme corp");
        store.save_alert(&alert).await.unwrap();
        store.get_alert(&alert.id).await.unwrap();

        let now = Utc::now();
        let mut uow = store.begin().await.unwrap();
        uow.advance_watermark(&mut alert, now).await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.cache().get(&alert.id).await.is_none());
        let snapshot = store.get_alert(&alert.id).await.unwrap().unwrap();
        assert_eq!(snapshot.notified_at, Some(now));
    }
}
