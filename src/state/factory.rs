use crate::config::{CacheBackend, CacheConfig, StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{AlertStore, CacheStore, InMemoryStore, MokaCacheStore, RedisCacheStore, RoleStore, SledStore};
use std::sync::Arc;

/// Alert and role accessors backed by the same storage engine
#[derive(Clone)]
pub struct StoreHandles {
    pub alerts: Arc<dyn AlertStore>,
    pub roles: Arc<dyn RoleStore>,
}

impl StoreHandles {
    fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: AlertStore + RoleStore + 'static,
    {
        Self {
            alerts: store.clone(),
            roles: store,
        }
    }
}

/// Create alert/role storage based on configuration
pub async fn create_store(config: &StateConfig) -> Result<StoreHandles> {
    match config.backend {
        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledStore::new(path)?;
            Ok(StoreHandles::from_backend(Arc::new(store)))
        }

        StateBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> StoreHandles {
    tracing::info!("Initializing in-memory storage backend");
    StoreHandles::from_backend(Arc::new(InMemoryStore::new()))
}

/// Create the snapshot cache store based on configuration
pub async fn create_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                AppError::Configuration("Redis cache requires 'redis_url' configuration".to_string())
            })?;

            tracing::info!(url = %redis_url, "Initializing Redis cache backend");

            let store = RedisCacheStore::new(redis_url).await?;
            Ok(Arc::new(store))
        }

        CacheBackend::Memory => {
            tracing::info!(capacity = config.max_capacity, "Initializing in-memory cache backend");
            Ok(Arc::new(MokaCacheStore::new(config.max_capacity)))
        }
    }
}
