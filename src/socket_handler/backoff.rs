//! Exponential backoff schedule used by the connection supervisor.

use std::time::Duration;

use super::config::BackoffPolicy;

/// Shortest delay between reconnection attempts, whatever the policy says.
pub const MIN_BACKOFF_DELAY: Duration = Duration::from_millis(1);

/// Produces non-decreasing reconnection delays capped at the policy maximum.
///
/// The first failure waits `initial`; every further failure multiplies the
/// delay by `multiplier` until it reaches `max`. A successful connection
/// resets the schedule.
#[derive(Clone, Debug)]
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    attempts: u32,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    ///
    /// Zero delays are raised to [`MIN_BACKOFF_DELAY`] so an unreachable
    /// endpoint never turns the reconnect loop into a busy spin.
    pub fn new(policy: BackoffPolicy) -> Self {
        let max = policy.max.max(MIN_BACKOFF_DELAY);
        let policy = BackoffPolicy {
            initial: policy.initial.clamp(MIN_BACKOFF_DELAY, max),
            max,
            multiplier: policy.multiplier,
        };
        Self {
            current: policy.initial,
            attempts: 0,
            policy,
        }
    }

    /// Number of consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Return the delay to wait after a failure and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempts = self.attempts.saturating_add(1);
        self.current = self.grow(delay);
        delay
    }

    /// Record a successful connection.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
        self.attempts = 0;
    }

    fn grow(&self, delay: Duration) -> Duration {
        // `mul_f64` panics on overflow, so saturate through seconds first.
        let secs = delay.as_secs_f64() * self.policy.multiplier.max(1.0);
        let max_secs = self.policy.max.as_secs_f64();
        if !secs.is_finite() || secs >= max_secs {
            return self.policy.max;
        }
        Duration::from_secs_f64(secs).max(delay)
    }
}
