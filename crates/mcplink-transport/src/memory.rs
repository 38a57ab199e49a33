//! In-memory transport for testing.
//!
//! Two [`MemoryTransport`]s created by [`MemoryTransport::pair`] are wired
//! back to back through channels, which makes it possible to drive a client
//! against a scripted server without network I/O.
//!
//! # Example
//!
//! ```rust
//! use mcplink_transport::{MemoryTransport, Transport};
//!
//! let (client_transport, server_transport) = MemoryTransport::pair();
//!
//! assert!(client_transport.is_connected());
//! assert!(server_transport.is_connected());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_lock::Mutex;
use chrono::Utc;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use mcplink_core::codec::DEFAULT_MAX_MESSAGE_SIZE;
use mcplink_core::protocol::Message;

use crate::error::TransportError;
use crate::events::{ConnectionState, EventBus, StateCell, TransportEvent};
use crate::recovery::RecoveryEngine;
use crate::traits::{Transport, TransportMetadata};

static NEXT_PAIR: AtomicU64 = AtomicU64::new(0);

/// An in-memory transport using channels.
pub struct MemoryTransport {
    sender: Mutex<Option<mpsc::Sender<Message>>>,
    receiver: Mutex<mpsc::Receiver<Message>>,
    state: StateCell,
    events: EventBus,
    recovery: Arc<RecoveryEngine>,
    component: String,
    max_message_size: usize,
    connected_at: std::sync::Mutex<Option<Instant>>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("component", &self.component)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    /// Create a connected pair of memory transports.
    ///
    /// Messages sent on the first transport are received on the second,
    /// and vice versa.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        Self::pair_with_capacity(32)
    }

    /// Create a connected pair with a specific buffer capacity.
    #[must_use]
    pub fn pair_with_capacity(capacity: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(capacity);
        let (tx2, rx2) = mpsc::channel(capacity);
        let id = NEXT_PAIR.fetch_add(1, Ordering::Relaxed);

        (
            Self::new(tx2, rx1, format!("memory:{id}:a")),
            Self::new(tx1, rx2, format!("memory:{id}:b")),
        )
    }

    fn new(
        sender: mpsc::Sender<Message>,
        receiver: mpsc::Receiver<Message>,
        component: String,
    ) -> Self {
        let events = EventBus::default();
        let state = StateCell::new(events.clone());
        state.set(ConnectionState::Connected);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            state,
            events,
            recovery: Arc::new(RecoveryEngine::default()),
            component,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connected_at: std::sync::Mutex::new(Some(Instant::now())),
        }
    }

    /// Limit the serialized size of outgoing messages.
    #[must_use]
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    fn set_connected_at(&self, at: Option<Instant>) {
        if let Ok(mut slot) = self.connected_at.lock() {
            *slot = at;
        }
    }
}

impl Transport for MemoryTransport {
    type Error = TransportError;

    async fn connect(&self) -> Result<(), Self::Error> {
        match self.state.get() {
            ConnectionState::Closed => return Err(TransportError::AlreadyClosed),
            ConnectionState::Connected => return Ok(()),
            _ => {}
        }
        if self.sender.lock().await.is_none() {
            return Err(TransportError::ConnectionClosed);
        }
        self.state.set(ConnectionState::Connected);
        self.set_connected_at(Some(Instant::now()));
        Ok(())
    }

    async fn send(&self, msg: Message) -> Result<(), Self::Error> {
        let size = serde_json::to_vec(&msg)?.len();
        if size > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        match self.state.get() {
            ConnectionState::Closed => return Err(TransportError::AlreadyClosed),
            ConnectionState::Connected => {}
            _ => return Err(TransportError::NotConnected),
        }

        let mut sender = self.sender.lock().await;
        let Some(sender) = sender.as_mut() else {
            return Err(TransportError::ConnectionClosed);
        };
        sender
            .send(msg)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn recv(&self) -> Result<Option<Message>, Self::Error> {
        if self.state.get().is_finished() {
            return Ok(None);
        }

        let mut receiver = self.receiver.lock().await;
        if let Some(msg) = receiver.next().await {
            self.events.emit(TransportEvent::MessageReceived {
                message: Box::new(msg.clone()),
                received_at: Utc::now(),
            });
            Ok(Some(msg))
        } else {
            tracing::debug!(component = %self.component, "peer closed memory transport");
            self.state.set(ConnectionState::Disconnected);
            Ok(None)
        }
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        if self.state.get() != ConnectionState::Closed {
            self.state.set(ConnectionState::Disconnected);
            self.set_connected_at(None);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sender.lock().await.take();
        self.state.set(ConnectionState::Closed);
        self.set_connected_at(None);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn recovery(&self) -> Arc<RecoveryEngine> {
        Arc::clone(&self.recovery)
    }

    fn component(&self) -> &str {
        &self.component
    }

    fn metadata(&self) -> TransportMetadata {
        let connected_at = self.connected_at.lock().ok().and_then(|slot| *slot);
        TransportMetadata::new("memory")
            .remote_addr(self.component.clone())
            .connected_at(connected_at)
    }
}
