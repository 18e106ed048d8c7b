//! Per-service circuit breaking.
//!
//! A breaker tracks failures inside a sliding window and cuts traffic to a
//! service once the threshold is reached. After a cooldown it admits a
//! bounded number of probe requests; enough successes close the circuit,
//! any failure reopens it.

pub mod registry;

pub use registry::BreakerRegistry;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CircuitBreakerError;

/// Breaker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Traffic flows; failures accumulate in the window.
    Closed,
    /// Traffic is rejected until the cooldown elapses.
    Open,
    /// A bounded number of probes decide whether the service recovered.
    HalfOpen,
}

/// Breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that trip the circuit.
    pub failure_threshold: usize,
    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: usize,
    /// Cooldown before an open circuit admits a probe.
    pub open_duration: Duration,
    /// Concurrent probes admitted while half-open.
    pub half_open_max_requests: usize,
    /// Sliding window over which failures count.
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_duration: Duration::from_secs(30),
            half_open_max_requests: 1,
            failure_window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Trips fast, recovers fast. For latency-sensitive callers.
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_duration: Duration::from_secs(15),
            ..Self::default()
        }
    }

    /// Tolerates more failures before tripping. For batch workloads.
    pub fn conservative() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 5,
            open_duration: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    pub fn with_half_open_max_requests(mut self, max: usize) -> Self {
        self.half_open_max_requests = max;
        self
    }

    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerStatistics {
    pub name: String,
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub rejected: u64,
    pub current_failure_count: usize,
    pub success_rate: f64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Ring of failure timestamps, pruned to the window and capped at the
    /// failure threshold.
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    half_open_successes: usize,
    half_open_in_flight: usize,
    total_requests: u64,
    successful: u64,
    failed: u64,
    rejected: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            half_open_successes: 0,
            half_open_in_flight: 0,
            total_requests: 0,
            successful: 0,
            failed: 0,
            rejected: 0,
        }
    }

    fn prune_failures(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A single service's circuit breaker. All state transitions are serialized
/// by the internal mutex, so outcomes are observed in a total order.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

/// An admitted request slot. Call [`succeed`](BreakerPermit::succeed) or
/// [`fail`](BreakerPermit::fail) with the outcome; dropping the permit
/// without either releases the slot and records nothing, which is what a
/// cancelled request wants.
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    half_open: bool,
    resolved: bool,
}

impl BreakerPermit<'_> {
    pub fn succeed(mut self) {
        self.resolved = true;
        self.breaker.record_success(self.half_open);
    }

    pub fn fail(mut self) {
        self.resolved = true;
        self.breaker.record_failure(self.half_open);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.release(self.half_open);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request admission. Open circuits reject until the cooldown elapses,
    /// then flip to half-open and admit probes up to the configured limit.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, CircuitBreakerError> {
        let mut s = self.lock();
        let now = Instant::now();
        s.total_requests += 1;

        match s.state {
            CircuitState::Closed => Ok(self.permit(false)),
            CircuitState::Open => {
                let opened_at = s.opened_at.unwrap_or(now);
                let elapsed = now.duration_since(opened_at);
                if elapsed >= self.config.open_duration {
                    s.state = CircuitState::HalfOpen;
                    s.half_open_successes = 0;
                    s.half_open_in_flight = 1;
                    tracing::info!(service = %self.name, "circuit half-open; admitting probe");
                    Ok(self.permit(true))
                } else {
                    s.rejected += 1;
                    Err(CircuitBreakerError::CircuitOpen {
                        service: self.name.clone(),
                        remaining: self.config.open_duration - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if s.half_open_in_flight < self.config.half_open_max_requests {
                    s.half_open_in_flight += 1;
                    Ok(self.permit(true))
                } else {
                    s.rejected += 1;
                    Err(CircuitBreakerError::CircuitOpen {
                        service: self.name.clone(),
                        remaining: Duration::ZERO,
                    })
                }
            }
        }
    }

    /// Run `operation` under the breaker, recording its outcome.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitBreakerError>,
    {
        let permit = self.try_acquire().map_err(E::from)?;
        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(error) => {
                permit.fail();
                Err(error)
            }
        }
    }

    /// Force the circuit open, as if the threshold had been crossed now.
    pub fn trip(&self) {
        let mut s = self.lock();
        s.state = CircuitState::Open;
        s.opened_at = Some(Instant::now());
        s.half_open_successes = 0;
        s.half_open_in_flight = 0;
        tracing::warn!(service = %self.name, "circuit tripped manually");
    }

    /// Force the circuit closed and clear all counters. Idempotent.
    pub fn reset(&self) {
        let mut s = self.lock();
        *s = BreakerState::new();
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failures currently inside the sliding window.
    pub fn current_failure_count(&self) -> usize {
        let mut s = self.lock();
        let now = Instant::now();
        s.prune_failures(now, self.config.failure_window);
        s.failures.len()
    }

    pub fn statistics(&self) -> BreakerStatistics {
        let mut s = self.lock();
        let now = Instant::now();
        s.prune_failures(now, self.config.failure_window);
        let attempts = s.successful + s.failed;
        BreakerStatistics {
            name: self.name.clone(),
            state: s.state,
            total_requests: s.total_requests,
            successful: s.successful,
            failed: s.failed,
            rejected: s.rejected,
            current_failure_count: s.failures.len(),
            success_rate: if attempts == 0 {
                0.0
            } else {
                s.successful as f64 / attempts as f64
            },
        }
    }

    fn permit(&self, half_open: bool) -> BreakerPermit<'_> {
        BreakerPermit {
            breaker: self,
            half_open,
            resolved: false,
        }
    }

    fn record_success(&self, half_open: bool) {
        let mut s = self.lock();
        s.successful += 1;
        if half_open && s.state == CircuitState::HalfOpen {
            s.half_open_in_flight = s.half_open_in_flight.saturating_sub(1);
            s.half_open_successes += 1;
            if s.half_open_successes >= self.config.success_threshold {
                s.state = CircuitState::Closed;
                s.failures.clear();
                s.opened_at = None;
                s.half_open_successes = 0;
                s.half_open_in_flight = 0;
                tracing::info!(service = %self.name, "circuit closed after successful probes");
            }
        }
    }

    fn record_failure(&self, half_open: bool) {
        let mut s = self.lock();
        let now = Instant::now();
        s.failed += 1;
        s.prune_failures(now, self.config.failure_window);
        s.failures.push_back(now);
        while s.failures.len() > self.config.failure_threshold {
            s.failures.pop_front();
        }

        match s.state {
            CircuitState::Closed => {
                if s.failures.len() >= self.config.failure_threshold {
                    s.state = CircuitState::Open;
                    s.opened_at = Some(now);
                    tracing::warn!(
                        service = %self.name,
                        failures = s.failures.len(),
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                if half_open {
                    s.half_open_in_flight = s.half_open_in_flight.saturating_sub(1);
                }
                s.state = CircuitState::Open;
                s.opened_at = Some(now);
                s.half_open_successes = 0;
                tracing::warn!(service = %self.name, "probe failed; circuit reopened");
            }
            CircuitState::Open => {}
        }
    }

    fn release(&self, half_open: bool) {
        if half_open {
            let mut s = self.lock();
            if s.state == CircuitState::HalfOpen {
                s.half_open_in_flight = s.half_open_in_flight.saturating_sub(1);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
