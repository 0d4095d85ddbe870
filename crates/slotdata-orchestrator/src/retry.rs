use std::time::Duration;

/// Retry budget for one store task. Attempt numbers are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_secs: u64) -> Self {
        Self {
            max_retries,
            backoff_base: Duration::from_secs(backoff_base_secs),
        }
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after failed attempt `attempt`: `base × 2^attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(2, 60);
        assert_eq!(policy.delay(0), Duration::from_secs(60));
        assert_eq!(policy.delay(1), Duration::from_secs(120));
        assert_eq!(policy.delay(2), Duration::from_secs(240));
        assert_eq!(policy.total_attempts(), 3);
    }

    #[test]
    fn backoff_saturates() {
        let policy = RetryPolicy::new(u32::MAX, u64::MAX);
        assert_eq!(policy.delay(40), Duration::MAX);
        assert_eq!(policy.total_attempts(), u32::MAX);
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(RetryPolicy::new(2, 0).delay(5), Duration::ZERO);
    }
}
