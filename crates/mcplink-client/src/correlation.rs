//! Request/response correlation.
//!
//! Every request sent by the client is registered in [`PendingRequests`]
//! under its id before it goes out. The matching response, the request's
//! timeout, an explicit cancellation or a disconnect settles the entry
//! exactly once and removes it from the table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use mcplink_core::error::McpError;
use mcplink_core::protocol::{RequestId, Response};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type Settle = oneshot::Sender<Result<Response, McpError>>;
type Table = Mutex<HashMap<RequestId, PendingRequest>>;

fn lock(table: &Table) -> MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-flight request.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    settle: Settle,
    timer: JoinHandle<()>,
    created_at: Instant,
}

impl PendingRequest {
    fn settle(self, outcome: Result<Response, McpError>) {
        self.timer.abort();
        // The caller may have stopped waiting.
        let _ = self.settle.send(outcome);
    }
}

/// Table of requests awaiting a response.
#[derive(Debug, Default, Clone)]
pub struct PendingRequests {
    table: Arc<Table>,
}

impl PendingRequests {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and arm its timeout.
    ///
    /// # Errors
    ///
    /// Fails with [`McpError::InvalidRequest`] if `id` is still in flight.
    pub fn register(
        &self,
        id: RequestId,
        method: impl Into<String>,
        timeout: Duration,
    ) -> Result<PendingResponse, McpError> {
        let method = method.into();
        let mut table = lock(&self.table);
        if table.contains_key(&id) {
            return Err(McpError::invalid_request(format!(
                "request id {id} is already in flight"
            )));
        }

        let (settle, receiver) = oneshot::channel();
        let timer = tokio::spawn(expire(
            Arc::downgrade(&self.table),
            id.clone(),
            timeout,
        ));
        trace!(%id, %method, ?timeout, "registered pending request");
        table.insert(
            id.clone(),
            PendingRequest {
                method,
                settle,
                timer,
                created_at: Instant::now(),
            },
        );

        Ok(PendingResponse {
            id,
            receiver,
            table: Arc::downgrade(&self.table),
        })
    }

    /// Settle the entry matching `response.id` with the response.
    ///
    /// Returns `false` if no request with that id is pending.
    pub fn resolve(&self, response: Response) -> bool {
        let Some(entry) = lock(&self.table).remove(&response.id) else {
            return false;
        };
        trace!(id = %response.id, method = %entry.method, elapsed = ?entry.created_at.elapsed(), "resolved");
        entry.settle(Ok(response));
        true
    }

    /// Fail the entry for `id` with `error`.
    ///
    /// Returns `false` if no request with that id is pending.
    pub fn reject(&self, id: &RequestId, error: McpError) -> bool {
        let Some(entry) = lock(&self.table).remove(id) else {
            return false;
        };
        debug!(%id, method = %entry.method, %error, "rejected pending request");
        entry.settle(Err(error));
        true
    }

    /// Fail the entry for `id` with [`McpError::Cancelled`].
    pub fn cancel(&self, id: &RequestId, reason: impl Into<String>) -> bool {
        let Some(entry) = lock(&self.table).remove(id) else {
            return false;
        };
        let error = McpError::cancelled_with_reason(entry.method.clone(), reason);
        entry.settle(Err(error));
        true
    }

    /// Cancel every pending request. Returns how many were pending.
    pub fn clear_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = lock(&self.table).drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            let error = McpError::cancelled_with_reason(entry.method.clone(), reason);
            entry.settle(Err(error));
        }
        if count > 0 {
            debug!(count, reason, "cleared pending requests");
        }
        count
    }

    /// Whether `id` is in flight.
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        lock(&self.table).contains_key(id)
    }

    /// Number of requests in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.table).len()
    }

    /// Whether no request is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.table).is_empty()
    }

    /// Age of the longest waiting request.
    #[must_use]
    pub fn oldest(&self) -> Option<Duration> {
        lock(&self.table)
            .values()
            .map(|entry| entry.created_at.elapsed())
            .max()
    }
}

async fn expire(table: Weak<Table>, id: RequestId, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    let Some(table) = table.upgrade() else {
        return;
    };
    let Some(entry) = lock(&table).remove(&id) else {
        return;
    };
    debug!(%id, method = %entry.method, ?timeout, "request timed out");
    let error = McpError::timeout(entry.method.clone(), timeout);
    // Dropping the handle of the running task does not abort it.
    let _ = entry.settle.send(Err(error));
}

/// Resolves with the response to one registered request.
///
/// Dropping it before it resolves withdraws the request from the table.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    receiver: oneshot::Receiver<Result<Response, McpError>>,
    table: Weak<Table>,
}

impl PendingResponse {
    /// The id this response is awaited under.
    #[must_use]
    pub const fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Response, McpError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(
                McpError::cancelled_with_reason(self.id.to_string(), "request table dropped"),
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            if let Some(entry) = lock(&table).remove(&self.id) {
                entry.timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::error::JsonRpcError;
    use serde_json::json;

    const LONG: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_resolve_settles_only_matching_id() {
        let pending = PendingRequests::new();
        let first = pending.register(RequestId::Number(1), "a", LONG).unwrap();
        let second = pending.register(RequestId::Number(2), "b", LONG).unwrap();

        assert!(pending.resolve(Response::success(2u64, json!({"n": 2}))));
        let response = second.await.unwrap();
        assert_eq!(response.result, Some(json!({"n": 2})));

        assert_eq!(pending.len(), 1);
        assert!(pending.contains(&RequestId::Number(1)));

        assert!(pending.resolve(Response::error(
            1u64,
            JsonRpcError::method_not_found("nope")
        )));
        assert!(first.await.unwrap().is_error());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let pending = PendingRequests::new();
        let _first = pending.register(RequestId::Number(7), "a", LONG).unwrap();
        let err = pending
            .register(RequestId::Number(7), "a", LONG)
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest { .. }));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_ignored() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve(Response::success(99u64, json!({}))));
        assert!(!pending.reject(&RequestId::Number(99), McpError::internal("x")));
        assert!(!pending.cancel(&RequestId::Number(99), "x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rejects_and_removes() {
        let pending = PendingRequests::new();
        let response = pending
            .register(RequestId::Number(1), "tools/call", Duration::from_millis(500))
            .unwrap();

        let err = response.await.unwrap_err();
        assert!(err.is_timeout());
        assert!(pending.is_empty());
        // A late response finds nothing to settle.
        assert!(!pending.resolve(Response::success(1u64, json!({}))));
    }

    #[tokio::test]
    async fn test_cancel_is_distinct_from_timeout() {
        let pending = PendingRequests::new();
        let response = pending.register(RequestId::Number(1), "ping", LONG).unwrap();
        assert!(pending.cancel(&RequestId::Number(1), "user abort"));

        let err = response.await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_clear_all_rejects_everything() {
        let pending = PendingRequests::new();
        let responses: Vec<_> = (0..3)
            .map(|i| pending.register(RequestId::Number(i), "x", LONG).unwrap())
            .collect();

        assert_eq!(pending.clear_all("disconnected"), 3);
        for response in responses {
            let err = response.await.unwrap_err();
            assert!(err.to_string().contains("cancelled"));
        }
        assert!(pending.is_empty());
        assert_eq!(pending.clear_all("again"), 0);
    }

    #[tokio::test]
    async fn test_dropping_response_withdraws_request() {
        let pending = PendingRequests::new();
        let response = pending.register(RequestId::Number(1), "x", LONG).unwrap();
        assert_eq!(response.id(), &RequestId::Number(1));
        drop(response);
        assert!(pending.is_empty());
    }
}
