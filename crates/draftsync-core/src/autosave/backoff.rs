//! Delay schedule for retrying rate-limited saves.

use std::time::Duration;

use draftsync_types::config::AutoSaveConfig;

/// Exponential backoff for consecutive `rate_limited` failures.
///
/// The delay doubles per consecutive failure up to `max`, and is never
/// shorter than the server's `Retry-After` hint. A successful save resets it.
#[derive(Debug, Clone)]
pub struct RateLimitBackoff {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl RateLimitBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempts: 0,
        }
    }

    pub fn from_config(config: &AutoSaveConfig) -> Self {
        Self::new(config.rate_limit_backoff(), config.rate_limit_backoff_max())
    }

    /// Delay before the next retry; advances the attempt counter.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(self.attempts.min(16));
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        match retry_after {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for RateLimitBackoff {
    fn default() -> Self {
        Self::from_config(&AutoSaveConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = RateLimitBackoff::new(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(10));
    }

    #[test]
    fn retry_after_hint_is_a_floor() {
        let mut backoff = RateLimitBackoff::default();
        assert_eq!(
            backoff.next_delay(Some(Duration::from_secs(45))),
            Duration::from_secs(45)
        );
        assert_eq!(
            backoff.next_delay(Some(Duration::from_millis(10))),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = RateLimitBackoff::default();
        backoff.next_delay(None);
        backoff.next_delay(None);
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(None), Duration::from_secs(2));
    }

    #[test]
    fn many_attempts_do_not_overflow() {
        let mut backoff = RateLimitBackoff::default();
        for _ in 0..100 {
            assert!(backoff.next_delay(None) <= Duration::from_secs(60));
        }
    }
}
