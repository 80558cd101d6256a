use crate::error::{AppError, Result};
use crate::models::{Alert, AlertId, Role, RoleId};
use crate::processing::plan_dedupe;
use crate::state::{merge_watermark, AlertStore, RoleStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent alert and role store using Sled embedded database
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    alerts_tree: sled::Tree,
    roles_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let alerts_tree = db.open_tree("alerts").map_err(|e| {
            AppError::Database(format!("Failed to open alerts tree: {}", e))
        })?;

        let roles_tree = db.open_tree("roles").map_err(|e| {
            AppError::Database(format!("Failed to open roles tree: {}", e))
        })?;

        tracing::info!("Initialized Sled store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            alerts_tree,
            roles_tree,
        })
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize record: {}", e)))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize record: {}", e)))
    }

    fn key(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    fn load_all_alerts(&self) -> Result<Vec<Alert>> {
        self.alerts_tree
            .iter()
            .values()
            .map(|value| Self::deserialize(&value?))
            .collect()
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Database(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl AlertStore for SledStore {
    async fn all_ids(&self) -> Result<Vec<AlertId>> {
        self.alerts_tree
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                Uuid::from_slice(&key)
                    .map_err(|e| AppError::Database(format!("Corrupt alert key: {}", e)))
            })
            .collect()
    }

    async fn by_id(&self, id: &AlertId) -> Result<Option<Alert>> {
        match self.alerts_tree.get(Self::key(id))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_by_role(&self, role_id: &RoleId) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .load_all_alerts()?
            .into_iter()
            .filter(|alert| alert.role_id == *role_id)
            .collect();

        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts_tree
            .insert(Self::key(&alert.id), Self::serialize(alert)?)?;
        self.flush().await?;

        tracing::debug!(alert_id = %alert.id, "Alert saved");
        Ok(())
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<bool> {
        let existed = self.alerts_tree.remove(Self::key(id))?.is_some();
        self.flush().await?;
        Ok(existed)
    }

    async fn dedupe(&self) -> Result<Vec<AlertId>> {
        let alerts = self.load_all_alerts()?;
        let removed = plan_dedupe(alerts.iter());

        for id in &removed {
            self.alerts_tree.remove(Self::key(id))?;
        }
        if !removed.is_empty() {
            self.flush().await?;
        }

        Ok(removed)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(SledUnitOfWork {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }
}

#[async_trait]
impl RoleStore for SledStore {
    async fn role_by_id(&self, id: &RoleId) -> Result<Option<Role>> {
        match self.roles_tree.get(Self::key(id))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        self.roles_tree
            .insert(Self::key(&role.id), Self::serialize(role)?)?;
        self.flush().await
    }
}

/// Unit of work that writes each staged alert with compare-and-swap
pub struct SledUnitOfWork {
    store: SledStore,
    staged: Vec<Alert>,
}

impl SledUnitOfWork {
    /// Returns false when the alert no longer exists
    fn write_one(&self, staged: &Alert) -> Result<bool> {
        let key = SledStore::key(&staged.id);

        loop {
            let Some(current) = self.store.alerts_tree.get(&key)? else {
                return Ok(false);
            };

            let mut stored: Alert = SledStore::deserialize(&current)?;
            merge_watermark(&mut stored, staged);
            let updated = SledStore::serialize(&stored)?;

            match self
                .store
                .alerts_tree
                .compare_and_swap(&key, Some(current), Some(updated))?
            {
                Ok(()) => return Ok(true),
                // Concurrent writer; reload and retry
                Err(_) => continue,
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for SledUnitOfWork {
    async fn advance_watermark(&mut self, alert: &mut Alert, now: DateTime<Utc>) -> Result<()> {
        alert.advance_watermark(now);
        self.staged.push(alert.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<AlertId>> {
        let mut written = Vec::with_capacity(self.staged.len());

        for staged in &self.staged {
            if self.write_one(staged)? {
                written.push(staged.id);
            } else {
                tracing::debug!(alert_id = %staged.id, "Alert deleted before commit");
            }
        }

        self.store.flush().await?;
        Ok(written)
    }

    async fn rollback(self: Box<Self>) {
        tracing::debug!(staged = self.staged.len(), "Unit of work rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        let role = Role::new("analyst", "analyst@example.com");
        store.save_role(&role).await.unwrap();
        assert_eq!(store.role_by_id(&role.id).await.unwrap(), Some(role.clone()));

        let alert = Alert::new(role.id, "acme corp");
        store.save_alert(&alert).await.unwrap();
        assert_eq!(store.by_id(&alert.id).await.unwrap(), Some(alert.clone()));
        assert_eq!(store.all_ids().await.unwrap(), vec![alert.id]);
        assert_eq!(store.list_by_role(&role.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sled_unit_of_work() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        let mut alert = Alert::new(Uuid::new_v4(), "acme corp");
        store.save_alert(&alert).await.unwrap();

        let now = Utc::now();
        let mut uow = store.begin().await.unwrap();
        uow.advance_watermark(&mut alert, now).await.unwrap();
        assert_eq!(uow.commit().await.unwrap(), vec![alert.id]);

        let stored = store.by_id(&alert.id).await.unwrap().unwrap();
        assert_eq!(stored.notified_at, Some(now));
    }

    #[tokio::test]
    async fn test_sled_dedupe() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        let role_id = Uuid::new_v4();
        store.save_alert(&Alert::new(role_id, "acme corp")).await.unwrap();
        store.save_alert(&Alert::new(role_id, "Acme Corp")).await.unwrap();

        assert_eq!(store.dedupe().await.unwrap().len(), 1);
        assert!(store.dedupe().await.unwrap().is_empty());
        assert_eq!(store.all_ids().await.unwrap().len(), 1);
    }
}
