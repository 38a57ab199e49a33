//! Recovery decisions.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What to do about a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Repeat the operation after a delay.
    Retry,
    /// Drop the affected unit of work and carry on.
    Skip,
    /// Give up and surface the error to the caller.
    Escalate,
    /// Surface the error; an operator has to fix something first.
    Manual,
}

impl RecoveryAction {
    /// Whether the caller gets to see the error.
    #[must_use]
    pub const fn surfaces(self) -> bool {
        matches!(self, Self::Escalate | Self::Manual)
    }
}

/// A recovery decision plus the data it was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// The action to take.
    pub action: RecoveryAction,
    /// Delay before acting (only meaningful for `Retry`).
    pub delay: Duration,
    /// Free-form details for logs and diagnostics.
    pub metadata: BTreeMap<String, Value>,
}

impl RecoveryStrategy {
    /// Create a strategy with no delay.
    #[must_use]
    pub fn new(action: RecoveryAction) -> Self {
        Self {
            action,
            delay: Duration::ZERO,
            metadata: BTreeMap::new(),
        }
    }

    /// Retry after `delay`.
    #[must_use]
    pub fn retry(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(RecoveryAction::Retry)
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// What executing a strategy amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The retry delay elapsed; the caller should try again.
    Retry {
        /// How long was waited.
        waited: Duration,
    },
    /// The failure was logged and dropped.
    Skipped,
    /// The failure must be surfaced.
    Escalated,
    /// The failure must be surfaced and needs operator action.
    ManualIntervention,
}

impl RecoveryOutcome {
    /// Whether the caller should attempt the operation again.
    #[must_use]
    pub const fn should_retry(self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}
