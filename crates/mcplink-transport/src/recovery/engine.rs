//! The recovery engine: classification bookkeeping, circuit breakers and
//! reconnection state, keyed by component.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mcplink_core::error::{ClassifiedError, ErrorCategory, ErrorContext, ErrorType, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use super::classify::{self, Classify};
use super::strategy::{RecoveryAction, RecoveryOutcome, RecoveryStrategy};
use crate::backoff::Backoff;
use crate::error::TransportError;

/// Recovery engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Breaker thresholds, applied to every component key.
    pub breaker: CircuitBreakerConfig,
    /// Delay policy for retries and reconnections.
    pub backoff: Backoff,
}

impl RecoveryConfig {
    /// Set the breaker configuration.
    #[must_use]
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Connection attempt bookkeeping for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconnectionState {
    /// Attempts since the last success.
    pub attempts: u32,
    /// Successful attempts overall.
    pub successes: u64,
    /// Failed attempts overall.
    pub failures: u64,
    /// When the last attempt was recorded.
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Occurrences of one error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorTypeStats {
    /// How many times it was seen.
    pub count: u64,
    /// First occurrence.
    pub first_seen: DateTime<Utc>,
    /// Latest occurrence.
    pub last_seen: DateTime<Utc>,
}

/// Snapshot of everything the engine tracks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryStats {
    /// Errors classified since creation or the last reset.
    pub total_errors: u64,
    /// Per-type counts.
    pub by_type: HashMap<ErrorType, ErrorTypeStats>,
    /// Per-component breakers.
    pub breakers: HashMap<String, CircuitBreakerStats>,
    /// Per-component reconnection state.
    pub reconnections: HashMap<String, ReconnectionState>,
}

#[derive(Debug, Default)]
struct EngineState {
    breakers: HashMap<String, CircuitBreaker>,
    reconnections: HashMap<String, ReconnectionState>,
    by_type: HashMap<ErrorType, ErrorTypeStats>,
    total_errors: u64,
}

/// Classifies failures and decides how to recover from them.
///
/// All mutable state sits behind one lock so that [`reset`](Self::reset)
/// is atomic with respect to every other operation.
#[derive(Debug, Default)]
pub struct RecoveryEngine {
    config: RecoveryConfig,
    state: Mutex<EngineState>,
}

impl RecoveryEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify `error`, record it and feed the breaker for `context.component`.
    pub fn classify<E: Classify + ?Sized>(
        &self,
        error: &E,
        context: ErrorContext,
    ) -> ClassifiedError {
        let classified = classify::classify(error, context);
        self.record(&classified);
        classified
    }

    /// Record an already classified error.
    pub fn record(&self, classified: &ClassifiedError) {
        let now = Utc::now();
        let component = classified.context().component.clone();
        {
            let mut state = self.lock();
            state.total_errors += 1;
            state
                .by_type
                .entry(classified.error_type())
                .and_modify(|s| {
                    s.count += 1;
                    s.last_seen = now;
                })
                .or_insert(ErrorTypeStats {
                    count: 1,
                    first_seen: now,
                    last_seen: now,
                });
            if classified.severity().trips_breaker() {
                let config = self.config.breaker;
                state
                    .breakers
                    .entry(component.clone())
                    .or_insert_with(|| CircuitBreaker::new(config))
                    .record_failure(classified.severity());
            }
        }

        let error_type = classified.error_type();
        match classified.severity() {
            Severity::Critical => error!(
                %component, ?error_type, category = %classified.category(),
                "{}", classified.message()
            ),
            Severity::High => warn!(
                %component, ?error_type, category = %classified.category(),
                "{}", classified.message()
            ),
            Severity::Medium => info!(
                %component, ?error_type, category = %classified.category(),
                "{}", classified.message()
            ),
            Severity::Low => debug!(
                %component, ?error_type, category = %classified.category(),
                "{}", classified.message()
            ),
        }
    }

    /// Record a successful operation on `component`.
    pub fn record_success(&self, component: &str) {
        if let Some(breaker) = self.lock().breakers.get_mut(component) {
            breaker.record_success();
        }
    }

    /// Breaker state for `component`; moves Open to HalfOpen after the cool-down.
    pub fn circuit_state(&self, component: &str) -> CircuitState {
        self.lock()
            .breakers
            .get_mut(component)
            .map_or(CircuitState::Closed, CircuitBreaker::check)
    }

    /// Fail with [`TransportError::CircuitOpen`] while the breaker is open.
    pub fn allows(&self, component: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let Some(breaker) = state.breakers.get_mut(component) else {
            return Ok(());
        };
        if breaker.check() == CircuitState::Open {
            return Err(TransportError::CircuitOpen {
                component: component.to_string(),
                retry_after: breaker.retry_after().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Delay before reconnection `attempt` (1-based).
    #[must_use]
    pub fn calculate_reconnection_delay(
        &self,
        attempt: u32,
        error_type: Option<ErrorType>,
    ) -> Duration {
        self.config.backoff.delay_for_error(attempt, error_type)
    }

    /// Decide what to do about `error`, given the breaker state of its
    /// component and the 1-based attempt that failed.
    #[must_use]
    pub fn decide_recovery_strategy(
        &self,
        error: &ClassifiedError,
        circuit_state: CircuitState,
        attempt: u32,
    ) -> RecoveryStrategy {
        let (action, reason) = if error.category() == ErrorCategory::Security {
            (RecoveryAction::Manual, "security failure")
        } else if circuit_state == CircuitState::Open {
            (RecoveryAction::Escalate, "circuit open")
        } else if !error.is_recoverable() {
            (RecoveryAction::Escalate, "not recoverable")
        } else if error.severity() == Severity::Low {
            (RecoveryAction::Skip, "low severity")
        } else if error.is_retryable() {
            (RecoveryAction::Retry, "retryable")
        } else {
            (RecoveryAction::Escalate, "not retryable")
        };

        let mut strategy = if action == RecoveryAction::Retry {
            let delay = self.calculate_reconnection_delay(attempt, Some(error.error_type()));
            RecoveryStrategy::retry(delay)
        } else {
            RecoveryStrategy::new(action)
        };
        strategy = strategy
            .with_metadata("error_id", error.id().to_string())
            .with_metadata("error_type", format!("{:?}", error.error_type()))
            .with_metadata("category", error.category().to_string())
            .with_metadata("severity", error.severity().to_string())
            .with_metadata("attempt", attempt)
            .with_metadata("reason", reason);
        if let Some(guidance) = error.guidance() {
            strategy = strategy.with_metadata("guidance", guidance);
        }
        strategy
    }

    /// Carry out `strategy`: wait for a retry, log the rest.
    pub async fn execute_recovery_strategy(&self, strategy: &RecoveryStrategy) -> RecoveryOutcome {
        match strategy.action {
            RecoveryAction::Retry => {
                debug!(delay = ?strategy.delay, "retrying after delay");
                tokio::time::sleep(strategy.delay).await;
                RecoveryOutcome::Retry {
                    waited: strategy.delay,
                }
            }
            RecoveryAction::Skip => {
                debug!(metadata = ?strategy.metadata, "skipping failed operation");
                RecoveryOutcome::Skipped
            }
            RecoveryAction::Escalate => {
                warn!(metadata = ?strategy.metadata, "escalating error");
                RecoveryOutcome::Escalated
            }
            RecoveryAction::Manual => {
                error!(metadata = ?strategy.metadata, "manual intervention required");
                RecoveryOutcome::ManualIntervention
            }
        }
    }

    /// Record the outcome of a connection attempt for `component`.
    pub fn record_connection_attempt(&self, component: &str, success: bool) -> ReconnectionState {
        let mut state = self.lock();
        let entry = state.reconnections.entry(component.to_string()).or_default();
        entry.last_attempt = Some(Utc::now());
        if success {
            entry.attempts = 0;
            entry.successes += 1;
        } else {
            entry.attempts += 1;
            entry.failures += 1;
        }
        let snapshot = entry.clone();
        if success {
            if let Some(breaker) = state.breakers.get_mut(component) {
                breaker.record_success();
            }
        }
        snapshot
    }

    /// Reconnection state for `component`, if any attempt was recorded.
    #[must_use]
    pub fn reconnection_state(&self, component: &str) -> Option<ReconnectionState> {
        self.lock().reconnections.get(component).cloned()
    }

    /// Snapshot of all tracked state.
    #[must_use]
    pub fn stats(&self) -> RecoveryStats {
        let state = self.lock();
        RecoveryStats {
            total_errors: state.total_errors,
            by_type: state.by_type.clone(),
            breakers: state
                .breakers
                .iter()
                .map(|(k, b)| (k.clone(), b.stats()))
                .collect(),
            reconnections: state.reconnections.clone(),
        }
    }

    /// Clear breakers, reconnection state and statistics.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = EngineState::default();
        info!("recovery engine reset");
    }
}
