//! Bounded exponential backoff

use std::time::Duration;

/// Reconnect schedule: attempt `k` waits `base * 2^(k-1)`, up to `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self { base_delay, max_attempts }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the 1-based `attempt`, or `None` once the cap is exceeded.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt - 1)?;
        self.base_delay.checked_mul(factor)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000), 5)
    }
}

/// Attempt counter over a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Schedule the next attempt. Returns `None` when the policy is exhausted,
    /// leaving the counter at the last scheduled attempt.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let next = self.attempts + 1;
        let delay = self.policy.delay_for(next)?;
        self.attempts = next;
        Some(delay)
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts scheduled since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
