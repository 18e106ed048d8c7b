//! Request coalescing (single-flight).
//!
//! `Coalescer` deduplicates concurrent identical operations: the first caller
//! for a key runs the fetch, every concurrent caller for the same key joins
//! the in-flight operation and receives the same outcome. Token refreshes and
//! cache misses are the two users inside this crate.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

/// Error types that can represent a flight abandoned by its initiating caller.
///
/// When the caller that started a coalesced fetch is cancelled, the fetch dies
/// with it; joiners observe `cancelled()` instead of hanging forever.
pub trait CoalesceError: Clone {
    fn cancelled() -> Self;
}

impl CoalesceError for crate::error::ApiError {
    fn cancelled() -> Self {
        Self::Cancelled
    }
}

impl CoalesceError for crate::error::AuthError {
    fn cancelled() -> Self {
        Self::NetworkError("token refresh abandoned by the initiating caller".to_string())
    }
}

impl CoalesceError for crate::error::Error {
    fn cancelled() -> Self {
        Self::Api(crate::error::ApiError::Cancelled)
    }
}

type FlightMap<K, V, E> = Mutex<HashMap<K, broadcast::Sender<Result<V, E>>>>;

/// Deduplicates concurrent identical operations keyed by `K`.
///
/// The map contains a key exactly as long as a fetch for that key is in
/// flight; entries are removed on completion, success or failure.
pub struct Coalescer<K, V, E> {
    flights: Arc<FlightMap<K, V, E>>,
}

impl<K, V, E> Default for Coalescer<K, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> Coalescer<K, V, E> {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V, E> Coalescer<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: CoalesceError,
{
    /// Run `fetch` if no operation is in flight for `key`, otherwise join the
    /// existing one. All current joiners receive the single fetch's outcome.
    ///
    /// The fetch runs on the initiating caller's future: cancelling a joiner
    /// leaves the flight untouched, cancelling the initiator aborts the flight
    /// and joiners observe `E::cancelled()`.
    pub async fn coalesce<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        enum Role<V, E> {
            Lead(broadcast::Sender<Result<V, E>>),
            Join(broadcast::Receiver<Result<V, E>>),
        }

        let role = {
            let mut flights = self.flights.lock().expect("coalescer mutex poisoned");
            match flights.entry(key.clone()) {
                Entry::Occupied(entry) => Role::Join(entry.get().subscribe()),
                Entry::Vacant(slot) => {
                    // Capacity 1 is enough: a flight publishes exactly once,
                    // and every joiner subscribes before the entry is removed.
                    let (tx, _) = broadcast::channel(1);
                    slot.insert(tx.clone());
                    Role::Lead(tx)
                }
            }
        };

        match role {
            Role::Lead(tx) => {
                let mut guard = FlightGuard {
                    flights: Arc::clone(&self.flights),
                    key: Some(key),
                };
                let result = fetch().await;
                // Remove the entry before publishing so late arrivals start a
                // fresh flight instead of subscribing to a spent channel.
                guard.complete();
                let _ = tx.send(result.clone());
                result
            }
            Role::Join(mut rx) => match rx.recv().await {
                Ok(result) => result,
                // Channel closed without a message: the initiator was dropped.
                Err(_) => Err(E::cancelled()),
            },
        }
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn has_in_flight(&self, key: &K) -> bool {
        self.flights
            .lock()
            .expect("coalescer mutex poisoned")
            .contains_key(key)
    }

    /// Number of distinct keys currently in flight.
    pub fn in_flight_len(&self) -> usize {
        self.flights.lock().expect("coalescer mutex poisoned").len()
    }
}

/// Removes the flight entry when the lead future completes or is dropped.
struct FlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    flights: Arc<FlightMap<K, V, E>>,
    key: Option<K>,
}

impl<K, V, E> FlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    fn complete(&mut self) {
        if let Some(key) = self.key.take()
            && let Ok(mut flights) = self.flights.lock()
        {
            flights.remove(&key);
        }
    }
}

impl<K, V, E> Drop for FlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.complete();
    }
}
