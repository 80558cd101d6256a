//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use query_alert_engine::{
    alerts::{AlertCache, AlertScanner, CachedAlertStore},
    authz::CollectionGrants,
    config::{CacheConfig, ScannerConfig},
    error::{AppError, Result},
    messaging::InMemoryPublisher,
    models::{Alert, AlertId, Role, RoleId},
    search::{AlertQuery, IndexClient, RawHit, SearchError, SearchHits, SearchResult},
    state::{AlertStore, CacheStore, InMemoryStore, MokaCacheStore, RoleStore, UnitOfWork},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Index client returning a fixed page of hits and recording every query
#[derive(Default)]
pub struct ScriptedIndex {
    hits: Mutex<Vec<RawHit>>,
    total: Mutex<Option<usize>>,
    fail_on: Mutex<Option<String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, AlertQuery)>>,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(hits: Vec<RawHit>) -> Self {
        let index = Self::new();
        index.set_hits(hits);
        index
    }

    /// Sleep before answering, to keep a search in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_hits(&self, hits: Vec<RawHit>) {
        *self.hits.lock() = hits;
    }

    /// Report more matches than the page holds
    pub fn set_total(&self, total: usize) {
        *self.total.lock() = Some(total);
    }

    /// Fail every search whose query text contains `needle`
    pub fn fail_on(&self, needle: impl Into<String>) {
        *self.fail_on.lock() = Some(needle.into());
    }

    pub fn calls(&self) -> Vec<(String, AlertQuery)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl IndexClient for ScriptedIndex {
    async fn search(&self, index: &str, query: &AlertQuery) -> SearchResult<SearchHits> {
        self.calls.lock().push((index.to_string(), query.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self.fail_on.lock().clone();
        if let Some(needle) = failing {
            if query.to_json().to_string().contains(&needle) {
                return Err(SearchError::Unavailable("connection refused".to_string()));
            }
        }

        let hits = self.hits.lock().clone();
        let total = self.total.lock().unwrap_or(hits.len());
        Ok(SearchHits { hits, total })
    }
}

/// Alert store whose units of work never commit
pub struct FailingCommitStore {
    inner: Arc<InMemoryStore>,
}

impl FailingCommitStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AlertStore for FailingCommitStore {
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
        self.inner.save_alert(alert).await
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<bool> {
        self.inner.delete_alert(id).await
    }

    async fn dedupe(&self) -> Result<Vec<AlertId>> {
        self.inner.dedupe().await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(FailingUnit {
            inner: self.inner.begin().await?,
        }))
    }
}

struct FailingUnit {
    inner: Box<dyn UnitOfWork>,
}

#[async_trait]
impl UnitOfWork for FailingUnit {
    async fn advance_watermark(&mut self, alert: &mut Alert, now: DateTime<Utc>) -> Result<()> {
        self.inner.advance_watermark(alert, now).await
    }

    async fn commit(self: Box<Self>) -> Result<Vec<AlertId>> {
        self.inner.rollback().await;
        Err(AppError::Database("disk full".to_string()))
    }

    async fn rollback(self: Box<Self>) {
        self.inner.rollback().await
    }
}

/// Cache store whose deletes are slow or always fail
pub struct FlakyCache {
    inner: MokaCacheStore,
    delete_delay: Option<Duration>,
    fail_deletes: bool,
}

impl FlakyCache {
    pub fn slow_deletes(delay: Duration) -> Self {
        Self {
            inner: MokaCacheStore::new(1_000),
            delete_delay: Some(delay),
            fail_deletes: false,
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            inner: MokaCacheStore::new(1_000),
            delete_delay: None,
            fail_deletes: true,
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn get_complex(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.inner.get_complex(key).await
    }

    async fn set_complex(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.inner.set_complex(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deletes {
            return Err(AppError::Cache("connection reset".to_string()));
        }
        self.inner.delete(key).await
    }
}

/// In-memory engine wiring around a swappable index client
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub alerts: CachedAlertStore,
    pub grants: CollectionGrants,
    pub publisher: Arc<InMemoryPublisher>,
    pub config: ScannerConfig,
}

impl Harness {
    pub fn new() -> Self {
        let cache_config = CacheConfig::default();
        Self::with_cache_store(Arc::new(MokaCacheStore::new(cache_config.max_capacity)))
    }

    /// Harness whose alert snapshots live in `cache_store`
    pub fn with_cache_store(cache_store: Arc<dyn CacheStore>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = AlertCache::new(cache_store, &CacheConfig::default());

        Self {
            alerts: CachedAlertStore::new(store.clone(), cache),
            store,
            grants: CollectionGrants::new(),
            publisher: Arc::new(InMemoryPublisher::new()),
            config: ScannerConfig::default(),
        }
    }

    pub fn scanner(&self, index: Arc<dyn IndexClient>) -> AlertScanner {
        self.scanner_over(Arc::new(self.alerts.clone()), index)
    }

    /// Scanner reading and committing alerts through `alerts`
    pub fn scanner_over(&self, alerts: Arc<dyn AlertStore>, index: Arc<dyn IndexClient>) -> AlertScanner {
        AlertScanner::new(
            &self.config,
            alerts,
            self.store.clone(),
            Arc::new(self.grants.clone()),
            index,
            self.publisher.clone(),
        )
    }

    /// An alertable role with read access to collection 1
    pub async fn role(&self, name: &str) -> Role {
        let role = Role::new(name, format!("{}@example.com", name));
        self.store.save_role(&role).await.unwrap();
        self.grants.grant(role.id, 1);
        role
    }

    pub async fn save_role(&self, role: &Role) {
        self.store.save_role(role).await.unwrap();
    }

    pub async fn alert(&self, role: &Role, query: &str) -> Alert {
        let alert = Alert::new(role.id, query);
        self.store.save_alert(&alert).await.unwrap();
        alert
    }

    pub async fn stored(&self, id: &AlertId) -> Alert {
        self.store.by_id(id).await.unwrap().expect("alert should exist")
    }
}

/// A readable hit for an entity in collection 1
pub fn hit(id: &str, name: &str, uploader: Option<RoleId>) -> RawHit {
    RawHit {
        id: id.to_string(),
        score: 1.0,
        source: json!({
            "name": name,
            "created_at": Utc::now(),
            "uploader_id": uploader,
            "collection_id": 1,
            "schema": "Thing",
        }),
    }
}

/// A hit whose body cannot become a matched item
pub fn unreadable_hit(id: &str) -> RawHit {
    RawHit {
        id: id.to_string(),
        score: 0.5,
        source: json!({ "created_at": "not a timestamp" }),
    }
}
