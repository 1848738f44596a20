//! Reconnect policy: capped exponential backoff with jitter.
//!
//! The delay before reconnect attempt `n` (1-based) is
//! `initial_delay * multiplier^(n-1)`, capped at `max_delay`, then reduced by
//! a random fraction in `[0, jitter]` so that many clients dropped at once do
//! not reconnect in lockstep. Jitter only ever shortens the delay, so the cap
//! holds after jitter too.
//!
//! `max_attempts` bounds the number of consecutive failed reconnects. The
//! counter resets whenever a connection opens. `None` retries forever.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Tunables for [`Backoff`]. Deserialised from the `[reconnect]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Fraction of each delay that may be randomly shaved off, in `[0, 1]`.
    pub jitter: f64,
    /// Give up after this many consecutive failed attempts. `None` never gives up.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    /// - initial_delay: 1 s
    /// - max_delay: 10 s
    /// - multiplier: 2.0
    /// - jitter: 0.25
    /// - max_attempts: unlimited
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: 0.25,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Check that the values describe a usable policy.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.initial_delay_ms == 0 {
            return Err(ChatError::InvalidConfig {
                field: "reconnect.initial_delay_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ChatError::InvalidConfig {
                field: "reconnect.max_delay_ms",
                reason: format!(
                    "must be at least initial_delay_ms ({})",
                    self.initial_delay_ms
                ),
            });
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ChatError::InvalidConfig {
                field: "reconnect.multiplier",
                reason: "must be a finite number >= 1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ChatError::InvalidConfig {
                field: "reconnect.jitter",
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if self.max_attempts == Some(0) {
            return Err(ChatError::InvalidConfig {
                field: "reconnect.max_attempts",
                reason: "must be at least 1 (omit it to retry forever)".to_string(),
            });
        }
        Ok(())
    }

    /// Un-jittered delay before 1-based attempt `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.initial_delay_ms as f64 * self.multiplier.powi(exp);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Attempt counter driven by a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    /// Register another attempt and return how long to wait before it, or
    /// `None` once `max_attempts` is used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        let base = self.policy.base_delay(self.attempts);
        Some(apply_jitter(base, self.policy.jitter))
    }

    /// Forget previous failures. Called when a connection opens.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let shave = rand::thread_rng().gen_range(0.0..=jitter);
    delay.mul_f64(1.0 - shave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn no_jitter() -> ReconnectPolicy {
        ReconnectPolicy {
            jitter: 0.0,
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(ReconnectPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_default_policy_never_gives_up() {
        let mut backoff = Backoff::new(no_jitter());
        for _ in 0..1_000 {
            assert!(backoff.next_delay().is_some());
        }
    }

    #[rstest]
    #[case(1, 1_000)]
    #[case(2, 2_000)]
    #[case(3, 4_000)]
    #[case(4, 8_000)]
    #[case(5, 10_000)]
    #[case(50, 10_000)]
    fn test_base_delay_doubles_then_caps(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = no_jitter();
        assert_eq!(policy.base_delay(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_base_delay_huge_attempt_does_not_overflow() {
        let policy = no_jitter();
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delays_non_decreasing_without_jitter() {
        let mut backoff = Backoff::new(no_jitter());
        let mut prev = Duration::ZERO;
        for _ in 0..20 {
            let d = backoff.next_delay().unwrap();
            assert!(d >= prev);
            prev = d;
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = ReconnectPolicy {
            jitter: 0.5,
            ..ReconnectPolicy::default()
        };
        let mut backoff = Backoff::new(policy.clone());
        for attempt in 1..=30 {
            let d = backoff.next_delay().unwrap();
            let base = policy.base_delay(attempt);
            assert!(d <= base, "jittered delay {d:?} exceeds base {base:?}");
            assert!(d >= base.mul_f64(0.5), "jittered delay {d:?} below floor");
        }
    }

    #[test]
    fn test_max_attempts_exhausts() {
        let mut backoff = Backoff::new(ReconnectPolicy {
            max_attempts: Some(3),
            ..no_jitter()
        });
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_unlimited_attempts_never_exhaust() {
        let mut backoff = Backoff::new(no_jitter());
        for _ in 0..100 {
            assert!(backoff.next_delay().is_some());
        }
        assert!(!backoff.is_exhausted());
        assert_eq!(backoff.attempts(), 100);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = Backoff::new(ReconnectPolicy {
            max_attempts: Some(2),
            ..no_jitter()
        });
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.is_exhausted());
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1_000)));
    }

    #[rstest]
    #[case(ReconnectPolicy { initial_delay_ms: 0, ..ReconnectPolicy::default() }, "initial_delay_ms")]
    #[case(ReconnectPolicy { max_delay_ms: 10, ..ReconnectPolicy::default() }, "max_delay_ms")]
    #[case(ReconnectPolicy { multiplier: 0.5, ..ReconnectPolicy::default() }, "multiplier")]
    #[case(ReconnectPolicy { multiplier: f64::NAN, ..ReconnectPolicy::default() }, "multiplier")]
    #[case(ReconnectPolicy { jitter: 1.5, ..ReconnectPolicy::default() }, "jitter")]
    #[case(ReconnectPolicy { jitter: -0.1, ..ReconnectPolicy::default() }, "jitter")]
    #[case(ReconnectPolicy { max_attempts: Some(0), ..ReconnectPolicy::default() }, "max_attempts")]
    fn test_validate_rejects(#[case] policy: ReconnectPolicy, #[case] field: &str) {
        match policy.validate() {
            Err(ChatError::InvalidConfig { field: f, .. }) => assert!(f.ends_with(field)),
            other => panic!("expected InvalidConfig for {field}, got {other:?}"),
        }
    }
}
