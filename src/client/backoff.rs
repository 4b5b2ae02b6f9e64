use std::time::Duration;

use rand::Rng;

use crate::client::consts::{DEFAULT_RETRY_DELAY, DEFAULT_RETRY_MAX_DELAY};

/// Delay policy between reconnect attempts.
///
/// `attempt` is the number of retries already made for the current failure
/// run, so the first retry asks for `delay(0)`.
#[cfg_attr(test, mockall::automock)]
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Doubles from `base` up to `max`. With jitter enabled the delay is drawn
/// uniformly from the upper half of that value, so clients that dropped
/// together do not reconnect together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY, DEFAULT_RETRY_MAX_DELAY).with_jitter()
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter {
            return ceiling;
        }
        let ceiling_ms = ceiling.as_millis() as u64;
        let half = ceiling_ms / 2;
        Duration::from_millis(rand::rng().random_range(half..=ceiling_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ignores_attempt() {
        let backoff = FixedBackoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(2));
        assert_eq!(backoff.delay(7), Duration::from_secs(2));
    }

    #[test]
    fn test_exponential_doubles_until_max() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(5));
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay(4), Duration::from_secs(5));
        assert_eq!(backoff.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_upper_half() {
        let backoff =
            ExponentialBackoff::new(Duration::from_millis(400), Duration::from_secs(10)).with_jitter();
        for _ in 0..100 {
            let delay = backoff.delay(2);
            assert!(delay >= Duration::from_millis(800), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1600), "{:?}", delay);
        }
    }
}
