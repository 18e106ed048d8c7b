//! Process-wide registry of per-service circuit breakers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Owns one [`CircuitBreaker`] per service name, created lazily with the
/// registry's default configuration.
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl BreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_config,
        }
    }

    /// Get or create the breaker for `name`. The same instance is returned
    /// for the lifetime of the registry.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.lock();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(name, self.default_config.clone()))
        }))
    }

    /// Names of all circuits currently open.
    pub fn open_circuits(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, breaker)| breaker.state() == CircuitState::Open)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// A service is healthy when its breaker is not open. Services without a
    /// breaker yet are healthy by definition.
    pub fn is_healthy(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_none_or(|breaker| breaker.state() != CircuitState::Open)
    }

    /// Force every known breaker closed, keeping the entries. Idempotent.
    pub fn reset_all(&self) {
        for breaker in self.lock().values() {
            breaker.reset();
        }
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.lock().expect("breaker registry mutex poisoned")
    }
}
