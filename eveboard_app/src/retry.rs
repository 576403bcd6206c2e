use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::SyncConfig;

/// Backoff for retryable sync failures. Each worker owns one so the jitter
/// source needs no locking.
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial: Duration,
    max: Duration,
    jitter_factor: f32,
    rng: SmallRng,
}

impl RetryPolicy {
    pub fn new(config: &SyncConfig, seed: u64) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial: config.backoff_initial,
            max: config.backoff_max,
            jitter_factor: config.jitter_factor,
            rng: SmallRng::seed_from_u64(0xD1CE_F00D_u64 ^ seed),
        }
    }

    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Delay before the next attempt after `attempts` failures. An upstream
    /// retry-after hint acts as a floor.
    pub fn delay_for(&mut self, attempts: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.jittered_duration(exponential_backoff(attempts, self.initial, self.max));
        retry_after.map_or(backoff, |hint| backoff.max(hint))
    }

    fn jittered_duration(&mut self, base: Duration) -> Duration {
        let jitter_factor = self.jitter_factor.clamp(0.0, 1.0) as f64;
        if jitter_factor <= 0.0 {
            return base;
        }

        let multiplier = self
            .rng
            .gen_range((1.0 - jitter_factor)..=(1.0 + jitter_factor));
        base.mul_f64(multiplier)
    }
}

fn exponential_backoff(attempts: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    let factor = 1_u128 << exponent;
    let initial_ms = initial.as_millis();
    let max_ms = max.as_millis();
    let backoff_ms = initial_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(u64::try_from(backoff_ms).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{RetryPolicy, exponential_backoff};
    use crate::SyncConfig;

    #[test]
    fn backoff_doubles_until_capped() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        let delays = (1..=8)
            .map(|attempts| exponential_backoff(attempts, initial, max).as_secs())
            .collect::<Vec<_>>();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn jitter_stays_within_factor() {
        let config = SyncConfig {
            jitter_factor: 0.2,
            ..SyncConfig::default()
        };
        let mut policy = RetryPolicy::new(&config, 7);
        for _ in 0..100 {
            let delay = policy.delay_for(3, None);
            assert!(delay >= Duration::from_millis(3_200));
            assert!(delay <= Duration::from_millis(4_800));
        }
    }

    #[test]
    fn retry_after_hint_raises_the_floor() {
        let config = SyncConfig {
            jitter_factor: 0.0,
            ..SyncConfig::default()
        };
        let mut policy = RetryPolicy::new(&config, 1);
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(20))),
            Duration::from_secs(20)
        );
        assert_eq!(
            policy.delay_for(4, Some(Duration::from_secs(2))),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn attempts_bound_is_inclusive() {
        let config = SyncConfig {
            max_attempts: 3,
            ..SyncConfig::default()
        };
        let policy = RetryPolicy::new(&config, 1);
        assert!(!policy.attempts_exhausted(2));
        assert!(policy.attempts_exhausted(3));
    }
}
