//! Cache event observation.

/// An event emitted by the cache, carrying the affected key by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<K> {
    Hit(K),
    Miss(K),
    Set(K),
    Removed(K),
    Evicted(K),
    Expired(K),
}

impl<K> CacheEvent<K> {
    /// The key this event refers to.
    pub fn key(&self) -> &K {
        match self {
            Self::Hit(k)
            | Self::Miss(k)
            | Self::Set(k)
            | Self::Removed(k)
            | Self::Evicted(k)
            | Self::Expired(k) => k,
        }
    }
}

/// A synchronous sink for cache events.
///
/// Invoked outside the cache's critical section; a panicking observer is
/// contained and the triggering cache operation still succeeds.
pub trait CacheObserver<K>: Send + Sync {
    fn on_event(&self, event: CacheEvent<K>);
}
