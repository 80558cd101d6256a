use crate::error::Result;
use crate::models::{Alert, AlertId, Role, RoleId};
use crate::processing::plan_dedupe;
use crate::state::{merge_watermark, AlertStore, RoleStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory alert and role store (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    alerts: Arc<DashMap<AlertId, Alert>>,
    roles: Arc<DashMap<RoleId, Role>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            alerts: Arc::new(DashMap::new()),
            roles: Arc::new(DashMap::new()),
        }
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn all_ids(&self) -> Result<Vec<AlertId>> {
        let mut ids: Vec<AlertId> = self.alerts.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn by_id(&self, id: &AlertId) -> Result<Option<Alert>> {
        Ok(self.alerts.get(id).map(|entry| entry.clone()))
    }

    async fn list_by_role(&self, role_id: &RoleId) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.role_id == *role_id)
            .map(|entry| entry.value().clone())
            .collect();

        // Newest first
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts.insert(alert.id, alert.clone());
        tracing::debug!(alert_id = %alert.id, "Alert saved");
        Ok(())
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<bool> {
        let existed = self.alerts.remove(id).is_some();
        if existed {
            tracing::debug!(alert_id = %id, "Alert deleted");
        }
        Ok(existed)
    }

    async fn dedupe(&self) -> Result<Vec<AlertId>> {
        let snapshot: Vec<Alert> = self.alerts.iter().map(|entry| entry.value().clone()).collect();
        let removed = plan_dedupe(snapshot.iter());

        for id in &removed {
            self.alerts.remove(id);
        }

        Ok(removed)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            alerts: self.alerts.clone(),
            staged: Vec::new(),
        }))
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn role_by_id(&self, id: &RoleId) -> Result<Option<Role>> {
        Ok(self.roles.get(id).map(|entry| entry.clone()))
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        self.roles.insert(role.id, role.clone());
        Ok(())
    }
}

/// Unit of work over the in-memory alert map
pub struct InMemoryUnitOfWork {
    alerts: Arc<DashMap<AlertId, Alert>>,
    staged: Vec<Alert>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn advance_watermark(&mut self, alert: &mut Alert, now: DateTime<Utc>) -> Result<()> {
        alert.advance_watermark(now);
        self.staged.push(alert.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<AlertId>> {
        let mut written = Vec::with_capacity(self.staged.len());

        for staged in &self.staged {
            match self.alerts.get_mut(&staged.id) {
                Some(mut stored) => {
                    merge_watermark(&mut stored, staged);
                    written.push(staged.id);
                }
                None => {
                    tracing::debug!(alert_id = %staged.id, "Alert deleted before commit");
                }
            }
        }

        Ok(written)
    }

    async fn rollback(self: Box<Self>) {
        tracing::debug!(staged = self.staged.len(), "Unit of work rolled back");
    }
}
