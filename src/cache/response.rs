//! Structured cache keys and the API response cache.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::observer::CacheObserver;
use crate::cache::store::{Cache, CacheConfig, CacheStatistics};
use crate::error::Error;

/// A cache key component contained a `:`, which would corrupt the key
/// grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cache key component {0:?} contains a colon")]
pub struct InvalidCacheKey(pub String);

/// Hierarchical cache key rendering as `service:kind:seg1:seg2:...`,
/// e.g. `storage:bucket:my-bucket` or
/// `compute:instance:proj:us-central1-a:vm-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    service: String,
    kind: String,
    segments: Vec<String>,
}

impl CacheKey {
    /// Build a key. Components must not contain colons; segments are
    /// otherwise uninterpreted.
    pub fn new(service: &str, kind: &str, segments: &[&str]) -> Result<Self, InvalidCacheKey> {
        check_component(service)?;
        check_component(kind)?;
        for segment in segments {
            check_component(segment)?;
        }
        Ok(Self {
            service: service.to_string(),
            kind: kind.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

fn check_component(component: &str) -> Result<(), InvalidCacheKey> {
    if component.contains(':') {
        Err(InvalidCacheKey(component.to_string()))
    } else {
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.kind)?;
        for segment in &self.segments {
            write!(f, ":{segment}")?;
        }
        Ok(())
    }
}

/// Typed cache for decoded API responses, keyed by [`CacheKey`], with bulk
/// invalidation by key prefix.
pub struct ResponseCache {
    inner: Cache<CacheKey, Value, Error>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Cache::new(config),
        }
    }

    pub fn with_observer(config: CacheConfig, observer: Arc<dyn CacheObserver<CacheKey>>) -> Self {
        Self {
            inner: Cache::with_observer(config, observer),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.inner.get(key)
    }

    pub fn set(&self, key: CacheKey, value: Value) {
        self.inner.set(key, value);
    }

    pub fn set_with_ttl(&self, key: CacheKey, value: Value, ttl: Duration) {
        self.inner.set_with_ttl(key, value, ttl);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Value> {
        self.inner.remove(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.contains(key)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Value, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, Error>>,
    {
        self.inner.get_or_fetch(key, fetch).await
    }

    /// Remove every entry whose rendered key starts with `prefix`. An internal
    /// purge: no events, no statistics. Returns the number of removals.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.inner
            .purge_where(|key| key.to_string().starts_with(prefix))
    }

    /// Remove every entry belonging to `service`.
    pub fn invalidate_service(&self, service: &str) -> usize {
        self.invalidate_prefix(&format!("{service}:"))
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.inner.statistics()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
