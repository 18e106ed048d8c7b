//! Generic bounded TTL cache with pluggable eviction.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::observer::{CacheEvent, CacheObserver};
use crate::coalesce::{CoalesceError, Coalescer};
use crate::error::Error;

/// Which entry to sacrifice when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least recently used; ties broken by insertion time.
    #[default]
    Lru,
    /// Oldest insertion.
    Fifo,
    /// Least frequently used; ties broken by last access time.
    Lfu,
}

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
    pub eviction_policy: EvictionPolicy,
    /// Route `get_or_fetch` misses through the coalescer so concurrent misses
    /// for one key share a single fetch.
    pub coalesce_fetches: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
            eviction_policy: EvictionPolicy::Lru,
            coalesce_fetches: true,
        }
    }
}

/// Running counters plus the current entry count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entry_count: usize,
}

impl CacheStatistics {
    /// `hits / (hits + misses)`; 0.0 when no lookups have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// `misses / (hits + misses)`; 1.0 when no lookups have happened.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.misses as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    access_count: u64,
    last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.inserted_at + self.ttl
    }

    fn record_access(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> CacheState<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }
}

/// Bounded typed cache: TTL per entry, capacity-triggered eviction, hit/miss
/// statistics and an optional event observer.
///
/// `E` is the error type `get_or_fetch` fetches fail with; it defaults to the
/// crate umbrella error.
pub struct Cache<K, V, E = Error> {
    state: Mutex<CacheState<K, V>>,
    observer: Option<Arc<dyn CacheObserver<K>>>,
    flights: Coalescer<K, V, E>,
    config: CacheConfig,
}

impl<K, V, E> Cache<K, V, E> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            observer: None,
            flights: Coalescer::new(),
            config,
        }
    }

    pub fn with_observer(config: CacheConfig, observer: Arc<dyn CacheObserver<K>>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Look up `key`. Expired entries are dropped lazily and count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let (value, event) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let now = Instant::now();

            if state
                .entries
                .get(key)
                .is_some_and(|entry| entry.is_expired(now))
            {
                state.entries.remove(key);
            }

            match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.record_access(now);
                    state.hits += 1;
                    (Some(entry.value.clone()), CacheEvent::Hit(key.clone()))
                }
                None => {
                    state.misses += 1;
                    (None, CacheEvent::Miss(key.clone()))
                }
            }
        };
        self.notify(event);
        value
    }

    /// Insert or replace with the configured default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert or replace with an explicit TTL. When the cache is full and the
    /// key is new, one entry is evicted per the configured policy before the
    /// insert; replacement never double-counts capacity.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut events = Vec::with_capacity(2);
        {
            let mut state = self.lock();
            let now = Instant::now();

            if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_entries
            {
                if let Some(victim) = select_victim(&state.entries, self.config.eviction_policy) {
                    state.entries.remove(&victim);
                    state.evictions += 1;
                    tracing::debug!("cache entry evicted to make room");
                    events.push(CacheEvent::Evicted(victim));
                }
            }

            state.entries.insert(
                key.clone(),
                CacheEntry {
                    value,
                    inserted_at: now,
                    ttl,
                    access_count: 0,
                    last_accessed_at: now,
                },
            );
            events.push(CacheEvent::Set(key));
        }
        for event in events {
            self.notify(event);
        }
    }

    /// Remove `key`, returning its value when present.
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = {
            let mut state = self.lock();
            state.entries.remove(key)
        };
        match removed {
            Some(entry) => {
                self.notify(CacheEvent::Removed(key.clone()));
                Some(entry.value)
            }
            None => None,
        }
    }

    /// Whether `key` exists and has not expired. Does not touch access
    /// statistics.
    pub fn contains(&self, key: &K) -> bool {
        let state = self.lock();
        let now = Instant::now();
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Drop all entries without emitting per-entry events. Idempotent.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Sweep expired entries, emitting `Expired` for each removal. Returns the
    /// number of entries removed.
    pub fn cleanup(&self) -> usize {
        let expired: Vec<K> = {
            let mut state = self.lock();
            let now = Instant::now();
            let keys: Vec<K> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                state.entries.remove(key);
            }
            state.expirations += keys.len() as u64;
            keys
        };
        let count = expired.len();
        for key in expired {
            self.notify(CacheEvent::Expired(key));
        }
        count
    }

    /// Remove every entry whose key matches `predicate`, silently: no events,
    /// no statistics. Used for bulk invalidation.
    pub fn purge_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the running counters.
    pub fn statistics(&self) -> CacheStatistics {
        let state = self.lock();
        CacheStatistics {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
            entry_count: state.entries.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().expect("cache mutex poisoned")
    }

    fn notify(&self, event: CacheEvent<K>) {
        if let Some(observer) = &self.observer {
            let observer = Arc::clone(observer);
            if std::panic::catch_unwind(AssertUnwindSafe(move || observer.on_event(event)))
                .is_err()
            {
                tracing::warn!("cache observer panicked; event dropped");
            }
        }
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: CoalesceError,
{
    /// Return a cached value or produce one with `fetch`, storing it on
    /// success. Errors propagate without caching. With coalescing enabled,
    /// concurrent misses for one key share a single fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        if self.config.coalesce_fetches {
            self.flights
                .coalesce(key.clone(), || async {
                    let value = fetch().await?;
                    self.set(key.clone(), value.clone());
                    Ok(value)
                })
                .await
        } else {
            let value = fetch().await?;
            self.set(key, value.clone());
            Ok(value)
        }
    }

    /// Whether a coalesced fetch for `key` is in flight.
    pub fn fetch_in_flight(&self, key: &K) -> bool {
        self.flights.has_in_flight(key)
    }
}

fn select_victim<K, V>(
    entries: &HashMap<K, CacheEntry<V>>,
    policy: EvictionPolicy,
) -> Option<K>
where
    K: Clone,
{
    let candidate = match policy {
        EvictionPolicy::Lru => entries
            .iter()
            .min_by_key(|(_, e)| (e.last_accessed_at, e.inserted_at)),
        EvictionPolicy::Fifo => entries.iter().min_by_key(|(_, e)| e.inserted_at),
        EvictionPolicy::Lfu => entries
            .iter()
            .min_by_key(|(_, e)| (e.access_count, e.last_accessed_at)),
    };
    candidate.map(|(key, _)| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_entries: usize, policy: EvictionPolicy) -> CacheConfig {
        CacheConfig {
            max_entries,
            default_ttl: Duration::from_secs(60),
            eviction_policy: policy,
            coalesce_fetches: true,
        }
    }

    fn cache(max_entries: usize, policy: EvictionPolicy) -> Cache<String, u32, ApiError> {
        Cache::new(config(max_entries, policy))
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<CacheEvent<String>>>,
    }

    impl CacheObserver<String> for RecordingObserver {
        fn on_event(&self, event: CacheEvent<String>) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn get_set_remove_round_trip() {
        let cache = cache(10, EvictionPolicy::Lru);
        assert_eq!(cache.get(&"a".to_string()), None);

        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert!(cache.contains(&"a".to_string()));

        assert_eq!(cache.remove(&"a".to_string()), Some(1));
        assert_eq!(cache.remove(&"a".to_string()), None);
        assert!(!cache.contains(&"a".to_string()));
    }

    #[test]
    fn replacement_does_not_double_count_capacity() {
        let cache = cache(2, EvictionPolicy::Lru);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("a".to_string(), 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.statistics().evictions, 0);
        assert_eq!(cache.get(&"a".to_string()), Some(10));
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        // set k1,k2,k3; get k1; set k4 => k2 out, k1/k3/k4 in.
        let cache = cache(3, EvictionPolicy::Lru);
        cache.set("k1".to_string(), 1);
        cache.set("k2".to_string(), 2);
        cache.set("k3".to_string(), 3);
        assert_eq!(cache.get(&"k1".to_string()), Some(1));
        cache.set("k4".to_string(), 4);

        assert!(!cache.contains(&"k2".to_string()));
        assert!(cache.contains(&"k1".to_string()));
        assert!(cache.contains(&"k3".to_string()));
        assert!(cache.contains(&"k4".to_string()));
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn fifo_evicts_oldest_insertion() {
        let cache = cache(3, EvictionPolicy::Fifo);
        cache.set("k1".to_string(), 1);
        cache.set("k2".to_string(), 2);
        cache.set("k3".to_string(), 3);
        // Accessing k1 must not save it under FIFO.
        assert_eq!(cache.get(&"k1".to_string()), Some(1));
        cache.set("k4".to_string(), 4);

        assert!(!cache.contains(&"k1".to_string()));
        assert!(cache.contains(&"k2".to_string()));
    }

    #[test]
    fn lfu_evicts_least_frequently_used() {
        let cache = cache(3, EvictionPolicy::Lfu);
        cache.set("k1".to_string(), 1);
        cache.set("k2".to_string(), 2);
        cache.set("k3".to_string(), 3);
        // k1 twice, k3 once, k2 never.
        cache.get(&"k1".to_string());
        cache.get(&"k1".to_string());
        cache.get(&"k3".to_string());
        cache.set("k4".to_string(), 4);

        assert!(!cache.contains(&"k2".to_string()));
        assert!(cache.contains(&"k1".to_string()));
        assert!(cache.contains(&"k3".to_string()));
    }

    #[test]
    fn entry_count_never_exceeds_capacity() {
        let cache = cache(4, EvictionPolicy::Lru);
        for i in 0..50 {
            cache.set(format!("k{i}"), i);
            assert!(cache.len() <= 4);
        }
        assert_eq!(cache.statistics().entry_count, 4);
    }

    #[test]
    fn expired_entries_count_as_misses_on_get() {
        let cache = cache(10, EvictionPolicy::Lru);
        cache.set_with_ttl("a".to_string(), 1, Duration::ZERO);
        assert_eq!(cache.get(&"a".to_string()), None);

        let stats = cache.statistics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn cleanup_sweeps_only_expired_entries() {
        let cache = cache(10, EvictionPolicy::Lru);
        cache.set_with_ttl("old1".to_string(), 1, Duration::ZERO);
        cache.set_with_ttl("old2".to_string(), 2, Duration::ZERO);
        cache.set("fresh".to_string(), 3);

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.statistics().expirations, 2);
        assert!(cache.contains(&"fresh".to_string()));

        // Nothing left to sweep.
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn clear_is_idempotent_and_emits_no_events() {
        let observer = Arc::new(RecordingObserver::default());
        let cache: Cache<String, u32, ApiError> =
            Cache::with_observer(config(10, EvictionPolicy::Lru), observer.clone());
        cache.set("a".to_string(), 1);
        observer.events.lock().unwrap().clear();

        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
        assert!(observer.events.lock().unwrap().is_empty());
    }

    #[test]
    fn statistics_rates_on_empty_cache() {
        let cache = cache(10, EvictionPolicy::Lru);
        let stats = cache.statistics();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 1.0);
    }

    #[test]
    fn statistics_rates_after_traffic() {
        let cache = cache(10, EvictionPolicy::Lru);
        cache.set("a".to_string(), 1);
        cache.get(&"a".to_string());
        cache.get(&"a".to_string());
        cache.get(&"b".to_string());
        cache.get(&"c".to_string());

        let stats = cache.statistics();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.miss_rate(), 0.5);
    }

    #[test]
    fn observer_sees_lifecycle_events() {
        let observer = Arc::new(RecordingObserver::default());
        let cache: Cache<String, u32, ApiError> =
            Cache::with_observer(config(1, EvictionPolicy::Lru), observer.clone());

        cache.set("a".to_string(), 1);
        cache.get(&"a".to_string());
        cache.get(&"missing".to_string());
        cache.set("b".to_string(), 2); // evicts a
        cache.remove(&"b".to_string());
        cache.set_with_ttl("c".to_string(), 3, Duration::ZERO);
        cache.cleanup();

        let events = observer.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                CacheEvent::Set("a".to_string()),
                CacheEvent::Hit("a".to_string()),
                CacheEvent::Miss("missing".to_string()),
                CacheEvent::Evicted("a".to_string()),
                CacheEvent::Set("b".to_string()),
                CacheEvent::Removed("b".to_string()),
                CacheEvent::Set("c".to_string()),
                CacheEvent::Expired("c".to_string()),
            ]
        );
    }

    #[test]
    fn panicking_observer_does_not_fail_the_operation() {
        struct PanickingObserver;
        impl CacheObserver<String> for PanickingObserver {
            fn on_event(&self, _event: CacheEvent<String>) {
                panic!("observer bug");
            }
        }

        let cache: Cache<String, u32, ApiError> =
            Cache::with_observer(config(10, EvictionPolicy::Lru), Arc::new(PanickingObserver));
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[tokio::test]
    async fn get_or_fetch_caches_successes() {
        let cache = cache(10, EvictionPolicy::Lru);
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let value = cache
                .get_or_fetch("a".to_string(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_fetch_does_not_cache_errors() {
        let cache = cache(10, EvictionPolicy::Lru);

        let err = cache
            .get_or_fetch("a".to_string(), || async {
                Err::<u32, _>(ApiError::RequestFailed("boom".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RequestFailed(_)));
        assert!(!cache.contains(&"a".to_string()));

        // A later fetch runs again and can succeed.
        let value = cache
            .get_or_fetch("a".to_string(), || async { Ok(1u32) })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache: Arc<Cache<String, u32, ApiError>> =
            Arc::new(Cache::new(config(10, EvictionPolicy::Lru)));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("hot".to_string(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(9u32)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 9);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.fetch_in_flight(&"hot".to_string()));
    }
}
