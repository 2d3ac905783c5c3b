//! Reconnect policy.

use std::time::Duration;

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed before giving up; `None` never gives up.
    max_attempts: Option<u32>,

    initial_delay: Duration,

    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. The delay doubles per attempt up to `max_delay`.
    #[must_use]
    pub fn new(max_attempts: Option<u32>, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Reconnects right away, forever.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Returns the delay before the given attempt (1-based), or `None` once
    /// the attempts are used up.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }

        let doublings = attempt.saturating_sub(1).min(31);
        let delay = self
            .initial_delay
            .checked_mul(1 << doublings)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }

    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(6), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_for(1000), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_attempt_limit() {
        let policy = RetryPolicy::new(Some(2), Duration::from_millis(10), Duration::from_secs(1));
        assert!(policy.delay_for(2).is_some());
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.delay_for(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(u32::MAX), Some(Duration::ZERO));
        assert_eq!(policy.max_attempts(), None);
    }

    #[test]
    fn test_max_delay_never_below_initial() {
        let policy = RetryPolicy::new(None, Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(5)));
    }
}
