//! Transport traits.
//!
//! - [`Transport`]: connection lifecycle plus message passing
//! - [`TransportExt`]: helpers built on top of it
//!
//! # Example
//!
//! ```ignore
//! use mcplink_transport::Transport;
//!
//! async fn ping<T: Transport>(transport: &T) -> Result<(), T::Error> {
//!     transport.connect().await?;
//!     transport.send(Message::Notification(Notification::new("ping"))).await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mcplink_core::error::McpError;
use mcplink_core::protocol::Message;

use crate::events::{ConnectionState, EventBus, EventKind, EventSubscription};
use crate::recovery::RecoveryEngine;

/// Metadata about a transport connection.
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    /// Transport type identifier ("websocket", "http", "memory").
    pub transport_type: String,
    /// Remote address, if applicable.
    pub remote_addr: Option<String>,
    /// Session identifier assigned by the server, if any.
    pub session_id: Option<String>,
    /// When the current connection was established.
    pub connected_at: Option<Instant>,
    /// Whether the server can push messages without a preceding request.
    pub bidirectional: bool,
}

impl TransportMetadata {
    /// Create new metadata for a transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            remote_addr: None,
            session_id: None,
            connected_at: None,
            bidirectional: true,
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn session_id(mut self, id: Option<String>) -> Self {
        self.session_id = id;
        self
    }

    /// Set the connection time.
    #[must_use]
    pub const fn connected_at(mut self, at: Option<Instant>) -> Self {
        self.connected_at = at;
        self
    }

    /// Set bidirectional flag.
    #[must_use]
    pub const fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }
}

/// A connection to an MCP server.
///
/// Implementations are `Send + Sync`; `send` and `recv` may be called
/// concurrently from different tasks. `recv` returns `Ok(None)` once the
/// transport is finished (disconnected, failed permanently or closed).
///
/// Every transport owns a [`RecoveryEngine`] whose breaker for
/// [`component`](Self::component) is consulted before connecting.
pub trait Transport: Send + Sync {
    /// The error type for transport operations.
    type Error: std::error::Error + Into<McpError> + Send + Sync + 'static;

    /// Establish the connection.
    ///
    /// # Errors
    ///
    /// Fails if the transport was closed, a connect is already running, the
    /// target is rejected, the attempt is rate limited or the breaker is open,
    /// or the handshake fails or times out.
    fn connect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large or could not be sent or
    /// queued.
    fn send(&self, msg: Message) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receive the next message, or `None` when the transport is finished.
    ///
    /// # Errors
    ///
    /// Returns an error if receiving failed.
    fn recv(&self) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send;

    /// Drop the connection. The transport can be connected again. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown could not be performed.
    fn disconnect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Destroy the transport. Every later call fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown could not be performed.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Whether the transport is connected.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The transport's event bus.
    fn events(&self) -> &EventBus;

    /// The recovery engine shared by this transport and its users.
    fn recovery(&self) -> Arc<RecoveryEngine>;

    /// Key under which the recovery engine tracks this transport.
    fn component(&self) -> &str;

    /// Last measured round-trip time, if the transport measures one.
    fn latency(&self) -> Option<Duration> {
        None
    }

    /// Get metadata about the transport.
    fn metadata(&self) -> TransportMetadata;
}

/// Helpers available on every [`Transport`].
pub trait TransportExt: Transport {
    /// Send several messages in order.
    fn send_batch(
        &self,
        msgs: Vec<Message>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            for msg in msgs {
                self.send(msg).await?;
            }
            Ok(())
        }
    }

    /// Subscribe to all events.
    fn subscribe(&self) -> EventSubscription {
        self.events().subscribe()
    }

    /// Subscribe to events of one kind.
    fn subscribe_to(&self, kind: EventKind) -> EventSubscription {
        self.events().subscribe_to(kind)
    }
}

impl<T: Transport> TransportExt for T {}
