//! Rate-limit backoff policy.
//!
//! Only throttling is retried. The delay before the next attempt grows as
//! `base * 2^attempt` plus up to `jitter` of uniform noise.

use std::time::Duration;

use rand::Rng;

/// Backoff settings for rate-limited calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay unit doubled on every failed attempt.
    pub base_delay: Duration,
    /// Upper bound of the uniform noise added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after failed attempt `attempt` (0-based).
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay after failed attempt `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rng.gen_range(0.0..1.0))
        };
        self.base_delay_for(attempt) + jitter
    }

    /// Delay after failed attempt `attempt`, honoring a provider hint when it is longer.
    pub fn delay_with_hint(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        rng: &mut impl Rng,
    ) -> Duration {
        let computed = self.delay_for(attempt, rng);
        match retry_after {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.jitter, Duration::from_secs(1));
    }

    #[test]
    fn base_delay_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.base_delay_for(a).as_secs()).collect();
        assert_eq!(delays, [2, 4, 8, 16, 32]);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..5 {
            for _ in 0..100 {
                let delay = policy.delay_for(attempt, &mut rng);
                let base = policy.base_delay_for(attempt);
                assert!(delay >= base);
                assert!(delay < base + policy.jitter);
            }
        }
    }

    #[test]
    fn delays_strictly_increase_despite_jitter() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        let delays: Vec<Duration> = (0..4).map(|a| policy.delay_for(a, &mut rng)).collect();
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.delay_for(2, &mut rng), Duration::from_secs(8));
    }

    #[test]
    fn longer_hint_wins() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_secs(30)), &mut rng),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_millis(10)), &mut rng),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn allows_retry_until_cap() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }
}
