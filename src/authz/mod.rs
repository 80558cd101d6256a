//! Authorization scoping for alert queries
//!
//! An [`AuthzFilterProvider`] turns the alert owner into an [`AuthzContext`]
//! and the context into an opaque [`QueryFragment`] that the search layer
//! adds to the filter clause verbatim.

use crate::error::Result;
use crate::models::{Role, RoleId};
use crate::search::QueryFragment;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Collection identifier in the entity index
pub type CollectionId = i64;

/// What one role may read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzContext {
    pub role_id: RoleId,
    pub is_admin: bool,
    pub collections: BTreeSet<CollectionId>,
}

/// Static collection grants loaded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Index field holding an entity's collection
    pub collection_field: String,

    /// Collections each role may read
    pub grants: BTreeMap<RoleId, Vec<CollectionId>>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            collection_field: "collection_id".to_string(),
            grants: BTreeMap::new(),
        }
    }
}

/// Produces the visibility filter for a requesting identity
#[async_trait]
pub trait AuthzFilterProvider: Send + Sync {
    /// Resolve what the role may read
    async fn from_identity(&self, role: &Role) -> Result<AuthzContext>;

    /// Filter fragment restricting a query to the context's visible content
    fn filter_fragment(&self, authz: &AuthzContext) -> QueryFragment;
}

/// Authorization based on per-role collection read grants
#[derive(Clone, Default)]
pub struct CollectionGrants {
    grants: Arc<DashMap<RoleId, BTreeSet<CollectionId>>>,
    field: Option<String>,
}

impl CollectionGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AuthzConfig) -> Self {
        let grants = Self::new().with_field(config.collection_field.clone());
        for (role_id, collections) in &config.grants {
            for collection_id in collections {
                grants.grant(*role_id, *collection_id);
            }
        }
        grants
    }

    /// Use a different index field for the collection filter
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn grant(&self, role_id: RoleId, collection_id: CollectionId) {
        self.grants.entry(role_id).or_default().insert(collection_id);
    }

    fn field(&self) -> &str {
        self.field.as_deref().unwrap_or("collection_id")
    }
}

#[async_trait]
impl AuthzFilterProvider for CollectionGrants {
    async fn from_identity(&self, role: &Role) -> Result<AuthzContext> {
        let collections = self
            .grants
            .get(&role.id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        Ok(AuthzContext {
            role_id: role.id,
            is_admin: role.is_admin,
            collections,
        })
    }

    fn filter_fragment(&self, authz: &AuthzContext) -> QueryFragment {
        if authz.is_admin {
            return QueryFragment::match_all();
        }

        QueryFragment::terms(self.field(), authz.collections.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fragment_lists_granted_collections() {
        let grants = CollectionGrants::new();
        let role = Role::new("analyst", "analyst@example.com");
        grants.grant(role.id, 7);
        grants.grant(role.id, 3);

        let authz = grants.from_identity(&role).await.unwrap();
        assert!(!authz.is_admin);
        assert_eq!(authz.collections, BTreeSet::from([3, 7]));

        let fragment = grants.filter_fragment(&authz);
        assert_eq!(fragment.as_json(), &json!({"terms": {"collection_id": [3, 7]}}));
    }

    #[tokio::test]
    async fn test_admin_sees_everything() {
        let grants = CollectionGrants::new();
        let mut role = Role::new("admin", "admin@example.com");
        role.is_admin = true;

        let authz = grants.from_identity(&role).await.unwrap();
        assert!(authz.collections.is_empty());
        assert_eq!(grants.filter_fragment(&authz).as_json(), &json!({"match_all": {}}));
    }

    #[tokio::test]
    async fn test_ungranted_role_sees_nothing() {
        let grants = CollectionGrants::new().with_field("collection");
        let role = Role::new("analyst", "analyst@example.com");
        grants.grant(uuid::Uuid::new_v4(), 1);

        let authz = grants.from_identity(&role).await.unwrap();
        assert_eq!(
            grants.filter_fragment(&authz).as_json(),
            &json!({"terms": {"collection": []}})
        );
    }

    #[tokio::test]
    async fn test_from_config() {
        let role = Role::new("analyst", "analyst@example.com");
        let mut config = AuthzConfig::default();
        config.grants.insert(role.id, vec![5, 2]);

        let grants = CollectionGrants::from_config(&config);
        let authz = grants.from_identity(&role).await.unwrap();
        assert_eq!(authz.collections, BTreeSet::from([2, 5]));
    }
}
