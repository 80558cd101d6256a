use crate::alerts::cache::{AlertSnapshot, CachedAlertStore};
use crate::error::{AppError, Result};
use crate::models::{Alert, AlertId, RoleId};
use crate::state::{AlertStore, RoleStore};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

/// Alert management; every mutation goes through the invalidating store
#[derive(Clone)]
pub struct AlertService {
    alerts: CachedAlertStore,
    roles: Arc<dyn RoleStore>,
}

impl AlertService {
    pub fn new(alerts: CachedAlertStore, roles: Arc<dyn RoleStore>) -> Self {
        Self { alerts, roles }
    }

    /// Register a saved query for an existing role
    pub async fn create_alert(&self, role_id: RoleId, query: impl Into<String>) -> Result<Alert> {
        if self.roles.role_by_id(&role_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Role {} not found", role_id)));
        }

        let alert = Alert::new(role_id, query);
        alert.validate()?;

        self.alerts.save_alert(&alert).await?;
        tracing::info!(alert_id = %alert.id, role_id = %role_id, "Alert created");

        Ok(alert)
    }

    /// Replace an alert's query text; the watermark is kept
    pub async fn update_query(&self, id: &AlertId, query: impl Into<String>) -> Result<Alert> {
        let mut alert = self
            .alerts
            .by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

        alert.query = query.into();
        alert.updated_at = Utc::now();
        alert.validate()?;

        self.alerts.save_alert(&alert).await?;
        tracing::info!(alert_id = %id, "Alert query updated");

        Ok(alert)
    }

    /// Delete an alert; returns whether it existed
    pub async fn delete_alert(&self, id: &AlertId) -> Result<bool> {
        let existed = self.alerts.delete_alert(id).await?;
        if existed {
            tracing::info!(alert_id = %id, "Alert deleted");
        }
        Ok(existed)
    }

    /// Cached snapshot of an alert
    pub async fn get_alert(&self, id: &AlertId) -> Result<Option<AlertSnapshot>> {
        self.alerts.get_alert(id).await
    }

    /// Drop the cached snapshot so the next read reloads it
    pub async fn refresh_alert(&self, id: &AlertId) -> Result<()> {
        self.alerts.cache().invalidate(id).await
    }

    /// Alerts owned by a role, newest first
    pub async fn list_alerts(&self, role_id: &RoleId) -> Result<Vec<Alert>> {
        self.alerts.list_by_role(role_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::cache::AlertCache;
    use crate::config::CacheConfig;
    use crate::models::Role;
    use crate::state::{InMemoryStore, MokaCacheStore};
    use uuid::Uuid;

    async fn service() -> (AlertService, Role) {
        let store = Arc::new(InMemoryStore::new());
        let config = CacheConfig::default();
        let cache = AlertCache::new(
            Arc::new(MokaCacheStore::new(config.max_capacity)),
            &config,
        );

        let role = Role::new("analyst", "analyst@example.com");
        store.save_role(&role).await.unwrap();

        let service = AlertService::new(CachedAlertStore::new(store.clone(), cache), store);
        (service, role)
    }

    #[tokio::test]
    async fn test_create_requires_role() {
        let (service, _) = service().await;
        let result = service.create_alert(Uuid::new_v4(), "acme").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_query() {
        let (service, role) = service().await;
        let result = service.create_alert(role.id, "").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_invalidates_snapshot() {
        let (service, role) = service().await;
        let alert = service.create_alert(role.id, "acme corp").await.unwrap();

        let cached = service.get_alert(&alert.id).await.unwrap().unwrap();
        assert_eq!(cached.query, "acme corp");

        service.update_query(&alert.id, "globex").await.unwrap();
        let cached = service.get_alert(&alert.id).await.unwrap().unwrap();
        assert_eq!(cached.query, "globex");
    }

    #[tokio::test]
    async fn test_delete_and_refresh() {
        let (service, role) = service().await;
        let alert = service.create_alert(role.id, "acme corp").await.unwrap();
        assert_eq!(service.list_alerts(&role.id).await.unwrap().len(), 1);

        service.get_alert(&alert.id).await.unwrap();
        service.refresh_alert(&alert.id).await.unwrap();

        assert!(service.delete_alert(&alert.id).await.unwrap());
        assert!(!service.delete_alert(&alert.id).await.unwrap());
        assert!(service.get_alert(&alert.id).await.unwrap().is_none());
    }
}
