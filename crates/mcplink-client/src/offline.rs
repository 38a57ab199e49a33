//! Deferred submissions while the server is unreachable.
//!
//! The client never persists anything itself. When a submission cannot be
//! sent it is handed to an [`OfflineStore`], which may keep it in memory, on
//! disk or anywhere else. [`MemoryOfflineStore`] is the in-process variant.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mcplink_core::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A request that was deferred instead of sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineSubmission {
    /// JSON-RPC method.
    pub method: String,
    /// Request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// When it was deferred.
    pub deferred_at: DateTime<Utc>,
}

impl OfflineSubmission {
    /// Create a submission stamped with the current time.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            deferred_at: Utc::now(),
        }
    }
}

/// Errors raised by an offline store.
#[derive(Debug, Error)]
pub enum OfflineStoreError {
    /// The store refuses more submissions.
    #[error("offline store is full ({capacity} submissions)")]
    Full {
        /// Store capacity.
        capacity: usize,
    },
    /// The backing storage failed.
    #[error("offline store failed: {0}")]
    Storage(String),
}

impl From<OfflineStoreError> for McpError {
    fn from(err: OfflineStoreError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Where submissions go while the client is offline.
pub trait OfflineStore: Send + Sync {
    /// Keep `submission` for later delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot accept it.
    fn register(&self, submission: OfflineSubmission) -> Result<(), OfflineStoreError>;

    /// Number of submissions waiting.
    fn pending_count(&self) -> usize;

    /// Drop every waiting submission.
    fn clear(&self);
}

/// Bounded in-memory [`OfflineStore`].
#[derive(Debug)]
pub struct MemoryOfflineStore {
    capacity: usize,
    submissions: Mutex<Vec<OfflineSubmission>>,
}

impl Default for MemoryOfflineStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemoryOfflineStore {
    /// Create a store holding at most `capacity` submissions.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OfflineSubmission>> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Take every waiting submission, oldest first.
    pub fn drain(&self) -> Vec<OfflineSubmission> {
        std::mem::take(&mut *self.lock())
    }
}

impl OfflineStore for MemoryOfflineStore {
    fn register(&self, submission: OfflineSubmission) -> Result<(), OfflineStoreError> {
        let mut submissions = self.lock();
        if submissions.len() >= self.capacity {
            return Err(OfflineStoreError::Full {
                capacity: self.capacity,
            });
        }
        submissions.push(submission);
        Ok(())
    }

    fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
