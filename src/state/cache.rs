use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Key/value cache holding JSON values with a per-entry time-to-live
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value; a miss is `Ok(None)`
    async fn get_complex(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store a value that expires after `ttl`
    async fn set_complex(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    /// Remove a value if present
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Cache key for a stored object, derived from its type and id
pub fn object_key(prefix: &str, entity_type: &str, id: impl Display) -> String {
    format!("{}:object:{}:{}", prefix, entity_type, id)
}

#[derive(Clone)]
struct Expiring<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryExpiry;

impl<K, V> Expiry<K, Expiring<V>> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &K, entry: &Expiring<V>, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &Expiring<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Generic cache wrapper using Moka; every entry carries its own TTL
#[derive(Clone)]
pub struct AppCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, Expiring<V>>,
}

impl<K, V> AppCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).await.map(|entry| entry.value)
    }

    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.cache.insert(key, Expiring { value, ttl }).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.cache.invalidate(key).await;
    }
}

/// In-process cache store
pub type MokaCacheStore = AppCache<String, serde_json::Value>;

#[async_trait]
impl CacheStore for AppCache<String, serde_json::Value> {
    async fn get_complex(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.get(&key.to_string()).await)
    }

    async fn set_complex(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.insert_with_ttl(key.to_string(), value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.invalidate(&key.to_string()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = AppCache::new(100);

        cache
            .insert_with_ttl("key1".to_string(), "value1".to_string(), Duration::from_secs(60))
            .await;

        let value = cache.get(&"key1".to_string()).await;
        assert_eq!(value, Some("value1".to_string()));

        cache.invalidate(&"key1".to_string()).await;
        let value = cache.get(&"key1".to_string()).await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let cache = AppCache::new(100);

        cache
            .insert_with_ttl("key".to_string(), "value".to_string(), Duration::from_millis(100))
            .await;

        // Value should be present immediately
        assert!(cache.get(&"key".to_string()).await.is_some());

        // Wait for TTL to expire
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Value should be expired
        assert!(cache.get(&"key".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_store_contract() {
        let store = MokaCacheStore::new(100);
        let key = object_key("qae", "alert", 7);
        assert_eq!(key, "qae:object:alert:7");

        assert!(store.get_complex(&key).await.unwrap().is_none());

        store
            .set_complex(&key, serde_json::json!({"id": 7}), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get_complex(&key).await.unwrap(),
            Some(serde_json::json!({"id": 7}))
        );

        store.delete(&key).await.unwrap();
        assert!(store.get_complex(&key).await.unwrap().is_none());
    }
}
