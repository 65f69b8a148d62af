//! Exponential backoff with jitter for task retries.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::ResilienceError;

/// Retry decision for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// Not retriable, or out of attempts
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per task, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Cap on the exponential part of the delay
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0 for the first retry):
    /// `min(max_delay, base * 2^retry)` plus uniform jitter.
    pub fn delay_with<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let exp = 2_u64.saturating_pow(retry);
        let delay_ms = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        let jitter_ms = if self.max_jitter_ms > 0 {
            rng.random_range(0..=self.max_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(delay_ms.saturating_add(jitter_ms))
    }

    pub fn delay(&self, retry: u32) -> Duration {
        self.delay_with(retry, &mut rand::rng())
    }

    /// Decide what to do after `attempts` attempts have failed, the last
    /// with `error`.
    pub fn decide(&self, error: &ResilienceError, attempts: u32) -> RetryDecision {
        if !error.is_retriable() || attempts >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay(attempts.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_jitter_ms: 0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let policy = no_jitter();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(6), Duration::from_millis(30_000));
    }

    #[test]
    fn test_exponent_saturates() {
        let policy = no_jitter();
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for retry in 0..8 {
            let base = no_jitter().delay(retry);
            let delay = policy.delay_with(retry, &mut rng);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(250));
        }
    }

    #[test]
    fn test_decide() {
        let policy = no_jitter();
        let transient = ResilienceError::transient("permits", "503");
        assert_eq!(
            policy.decide(&transient, 1),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(policy.decide(&transient, 5), RetryDecision::GiveUp);

        let permanent = ResilienceError::permanent("permits", "400");
        assert_eq!(policy.decide(&permanent, 1), RetryDecision::GiveUp);
    }
}
