//! Retry policy with exponential backoff
//!
//! A failed push is retried up to `max_retries` times. The wait before retry
//! `n` (1-based) is `base * 2^(n-1)`, capped at `max_delay`, optionally
//! spread by a jitter fraction.

use rand::Rng;
use std::time::Duration;

/// Configuration for delivery retries
///
/// # Example
///
/// ```
/// use loki_logger_system::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(4, Duration::from_millis(100), Duration::from_millis(250));
/// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
/// assert_eq!(policy.delay_for_retry(3), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Fraction in `[0.0, 1.0]` by which each delay is randomly spread
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter: 0.0,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Total number of send attempts for one batch
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (1-based); zero for `retry == 0`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if self.jitter == 0.0 {
            return self.delay_with_sample(retry, 0.5);
        }
        self.delay_with_sample(retry, rand::thread_rng().gen::<f64>())
    }

    /// Delay with an explicit jitter sample in `[0.0, 1.0)`
    pub fn delay_with_sample(&self, retry: u32, sample: f64) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = (retry - 1).min(31);
        let base = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter == 0.0 {
            return base;
        }

        // sample in [0, 1) maps onto [-jitter, +jitter]
        let factor = 1.0 + (sample * 2.0 - 1.0) * self.jitter;
        base.mul_f64(factor.max(0.0)).min(self.max_delay)
    }
}
