//! Error classification and recovery.
//!
//! The [`RecoveryEngine`] turns raw failures into [`ClassifiedError`]s,
//! tracks per-component circuit breakers and reconnection state, and decides
//! whether a failure is retried, skipped or surfaced.
//!
//! [`ClassifiedError`]: mcplink_core::error::ClassifiedError
//!
//! ```rust
//! use mcplink_core::error::ErrorContext;
//! use mcplink_transport::recovery::{CircuitState, RecoveryAction, RecoveryEngine};
//! use mcplink_transport::TransportError;
//!
//! let engine = RecoveryEngine::default();
//! let err = TransportError::Http { status: 503, message: "busy".into() };
//! let classified = engine.classify(&err, ErrorContext::new("http", "send"));
//! let strategy = engine.decide_recovery_strategy(&classified, CircuitState::Closed, 1);
//! assert_eq!(strategy.action, RecoveryAction::Retry);
//! ```

mod breaker;
mod classify;
mod engine;
mod strategy;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use classify::{Classify, ErrorSignals, classify, classify_signals, error_type_for};
pub use engine::{
    ErrorTypeStats, ReconnectionState, RecoveryConfig, RecoveryEngine, RecoveryStats,
};
pub use strategy::{RecoveryAction, RecoveryOutcome, RecoveryStrategy};
