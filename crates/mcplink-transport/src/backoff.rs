//! Exponential backoff with jitter.
//!
//! One policy is shared by the WebSocket reconnection loop and the recovery
//! engine so that both compute identical delays for the same attempt.

use std::time::Duration;

use mcplink_core::error::ErrorType;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Delay used for error types that merit an almost immediate retry.
pub const FAST_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Random extra delay as a fraction of the base delay (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Create a backoff with the given bounds and default multiplier/jitter.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Set the multiplier. Values below 1.0 are raised to 1.0.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Set the jitter fraction.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Disable jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Deterministic part of the delay for a 1-based `attempt`:
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let base = self.initial_delay.as_secs_f64() * self.growth().powi(exponent);
        self.capped(base)
    }

    /// Full delay for a 1-based `attempt`, jitter included.
    ///
    /// Jitter is bounded by `multiplier - 1` so that the result never drops
    /// below the previous attempt's upper bound, and the total never exceeds
    /// `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::thread_rng().r#gen::<f64>())
    }

    /// Delay for `attempt`, shortened for transient error types.
    #[must_use]
    pub fn delay_for_error(&self, attempt: u32, error_type: Option<ErrorType>) -> Duration {
        match error_type {
            Some(ty) if ty.is_fast_retry() => FAST_RETRY_DELAY.min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }

    fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = if self.jitter.is_nan() { 0.0 } else { self.jitter };
        let fraction = jitter.min(self.growth() - 1.0).clamp(0.0, 1.0);
        let jittered = base * (1.0 + fraction * sample.clamp(0.0, 1.0));
        self.capped(jittered)
    }

    // Fields are public and deserializable, so they may hold any f64.
    fn growth(&self) -> f64 {
        if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        }
    }

    fn capped(&self, secs: f64) -> Duration {
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_progression() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(backoff.base_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(2), Duration::from_secs(2));
        assert_eq!(backoff.base_delay(3), Duration::from_secs(4));
        assert_eq!(backoff.base_delay(6), Duration::from_secs(30));
        assert_eq!(backoff.base_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_monotonic_and_capped_for_any_jitter_sample() {
        let backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(10))
            .with_multiplier(1.5)
            .with_jitter(0.4);

        for attempt in 1..60 {
            let hi_prev = backoff.delay_with_sample(attempt, 1.0);
            let lo_next = backoff.delay_with_sample(attempt + 1, 0.0);
            assert!(lo_next >= hi_prev, "attempt {attempt}: {lo_next:?} < {hi_prev:?}");
            assert!(backoff.delay_with_sample(attempt, 1.0) <= backoff.max_delay);
        }
    }

    #[test]
    fn test_unusable_loaded_values_do_not_panic() {
        for (multiplier, jitter) in [
            (f64::NAN, 0.1),
            (f64::INFINITY, 0.5),
            (-2.0, 0.1),
            (2.0, f64::NAN),
            (2.0, -3.0),
            (2.0, f64::INFINITY),
        ] {
            let backoff = Backoff {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(5),
                multiplier,
                jitter,
            };
            for attempt in [0, 1, 2, 10, u32::MAX] {
                let base = backoff.base_delay(attempt);
                assert!(base >= Duration::from_millis(100));
                assert!(base <= backoff.max_delay);
                for sample in [0.0, 0.5, 1.0] {
                    let delay = backoff.delay_with_sample(attempt, sample);
                    assert!(delay <= backoff.max_delay, "{multiplier}/{jitter}: {delay:?}");
                }
            }
        }

        let flat = Backoff {
            multiplier: f64::NAN,
            ..Backoff::new(Duration::from_millis(100), Duration::from_secs(5))
        };
        assert_eq!(flat.base_delay(7), Duration::from_millis(100));
    }

    #[test]
    fn test_random_delays_stay_in_bounds() {
        let backoff = Backoff::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..20 {
            let delay = backoff.delay_for_attempt(attempt);
            assert!(delay >= backoff.base_delay(attempt));
            assert!(delay <= backoff.max_delay);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_fast_retry_for_reset() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.delay_for_error(5, Some(ErrorType::ConnectionReset)),
            FAST_RETRY_DELAY
        );
        assert!(backoff.delay_for_error(5, Some(ErrorType::ConnectionRefused)) > FAST_RETRY_DELAY);
    }
}
