//! Bounded retry with exponential backoff

use std::time::Duration;

/// Retry schedule: `attempts` tries, sleeping `initial_delay` after the first
/// failure and doubling up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Call `ready` until it returns `true` or the attempts run out.
    ///
    /// Returns whether `ready` succeeded.
    pub fn wait_until(&self, mut ready: impl FnMut() -> bool) -> bool {
        for attempt in 0..self.attempts {
            if ready() {
                return true;
            }
            if attempt + 1 < self.attempts {
                std::thread::sleep(self.delay_for(attempt));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 10,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(2));
        assert_eq!(policy.delay_for(1), Duration::from_millis(4));
        assert_eq!(policy.delay_for(2), Duration::from_millis(8));
        assert_eq!(policy.delay_for(3), Duration::from_millis(10));
        assert_eq!(policy.delay_for(40), Duration::from_millis(10));
    }

    #[test]
    fn test_wait_until_succeeds_after_retries() {
        let policy = RetryPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };

        let mut calls = 0;
        assert!(policy.wait_until(|| {
            calls += 1;
            calls == 3
        }));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_wait_until_gives_up() {
        let policy = RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };

        let mut calls = 0;
        assert!(!policy.wait_until(|| {
            calls += 1;
            false
        }));
        assert_eq!(calls, 3);
    }
}
