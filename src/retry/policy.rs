//! Exponential backoff with bounded jitter.

use std::time::Duration;

use rand::Rng;

/// HTTP statuses worth retrying: request timeout, rate limiting and the
/// transient 5xx family. Client errors (4xx) are not retryable.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (`0` = execute once, never retry).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Jitter spread in `[0, 1]`; each delay is multiplied by a uniform
    /// sample from `[1 - j/2, 1 + j/2]`.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute once, never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Whether an HTTP status is worth retrying.
    pub fn is_retryable(&self, status: u16) -> bool {
        RETRYABLE_STATUS_CODES.contains(&status)
    }

    /// Delay before retrying after `attempt` (0-based):
    /// `min(base * 2^attempt, max)`, jittered when `jitter_factor > 0`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(63) as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());

        let factor = if self.jitter_factor > 0.0 {
            let spread = self.jitter_factor / 2.0;
            rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread))
        } else {
            1.0
        };

        Duration::from_secs_f64(capped * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60))
            .with_jitter_factor(0.0);

        let expected = [1, 2, 4, 8, 16, 32, 60, 60, 60];
        for (attempt, secs) in expected.iter().enumerate() {
            assert_eq!(
                policy.delay(attempt as u32),
                Duration::from_secs(*secs),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn jittered_delay_stays_inside_the_band() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60))
            .with_jitter_factor(0.2);

        for _ in 0..100 {
            let delay = policy.delay(1).as_secs_f64();
            // 2s +/- 10%
            assert!((1.8..=2.2).contains(&delay), "{delay}");
        }
    }

    #[test]
    fn retryable_statuses_match_the_documented_set() {
        let policy = RetryPolicy::default();
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(policy.is_retryable(status), "{status}");
        }
        for status in [200, 201, 204, 301, 400, 401, 403, 404, 409, 501] {
            assert!(!policy.is_retryable(status), "{status}");
        }
    }

    #[test]
    fn none_preset_disables_retries() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn jitter_factor_is_clamped() {
        assert_eq!(RetryPolicy::default().with_jitter_factor(2.5).jitter_factor, 1.0);
        assert_eq!(RetryPolicy::default().with_jitter_factor(-1.0).jitter_factor, 0.0);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_max_delay() {
        let policy = RetryPolicy::default()
            .with_max_delay(Duration::from_secs(30))
            .with_jitter_factor(0.0);
        assert_eq!(policy.delay(1000), Duration::from_secs(30));
    }
}
