//! Per-component circuit breaker.
//!
//! Only failures whose severity trips the breaker (High and Critical) are
//! counted. Lower-severity failures neither open nor reset it.

use std::time::{Duration, Instant};

use mcplink_core::error::Severity;
use serde::{Deserialize, Serialize};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive successes that close an open or half-open circuit.
    pub success_threshold: u32,
    /// Time an open circuit waits before letting a probe through.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold (at least 1).
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the success threshold (at least 1).
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Set the open-state cool-down.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    #[default]
    Closed,
    /// Failing fast.
    Open,
    /// Letting probes through to test recovery.
    HalfOpen,
}

/// Snapshot of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive counted failures.
    pub failure_count: u32,
    /// Consecutive successes while open or half-open.
    pub success_count: u32,
}

/// A single circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            opened_at: None,
        }
    }

    /// Current state, moving Open to HalfOpen once the cool-down has passed.
    pub fn check(&mut self) -> CircuitState {
        self.check_at(Instant::now())
    }

    /// State without side effects.
    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    /// Remaining cool-down when open.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match (self.state, self.opened_at) {
            (CircuitState::Open, Some(opened)) => {
                Some(self.config.cooldown.saturating_sub(opened.elapsed()))
            }
            _ => None,
        }
    }

    /// Record a failure of the given severity.
    pub fn record_failure(&mut self, severity: Severity) {
        self.record_failure_at(severity, Instant::now());
    }

    /// Record a success.
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.close();
                }
            }
        }
    }

    /// When the last counted failure happened.
    #[must_use]
    pub const fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Snapshot for reporting.
    #[must_use]
    pub const fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
        }
    }

    fn check_at(&mut self, now: Instant) -> CircuitState {
        if self.state == CircuitState::Open
            && self
                .opened_at
                .is_some_and(|opened| now.duration_since(opened) >= self.config.cooldown)
        {
            tracing::debug!("circuit breaker cool-down elapsed, half-open");
            self.state = CircuitState::HalfOpen;
            self.success_count = 0;
        }
        self.state
    }

    fn record_failure_at(&mut self, severity: Severity, now: Instant) {
        if !severity.trips_breaker() {
            return;
        }
        self.last_failure = Some(now);
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.open(now);
                }
            }
            CircuitState::HalfOpen => self.open(now),
            CircuitState::Open => {
                self.failure_count += 1;
                self.success_count = 0;
            }
        }
    }

    fn open(&mut self, now: Instant) {
        tracing::warn!(
            failures = self.failure_count,
            cooldown = ?self.config.cooldown,
            "circuit breaker opened"
        );
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.success_count = 0;
    }

    fn close(&mut self) {
        tracing::info!("circuit breaker closed");
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
    }
}
