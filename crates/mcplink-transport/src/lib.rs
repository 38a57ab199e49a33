//! Transport layer for the mcplink MCP client.
//!
//! Transports carry JSON-RPC messages between the client and an MCP server
//! and keep the connection alive: they validate targets, rate limit and
//! circuit-break connection attempts, reconnect with backoff, and publish
//! every lifecycle change on an event bus.
//!
//! # Available Transports
//!
//! | Transport | Use Case | Feature Flag |
//! |-----------|----------|--------------|
//! | [`websocket::WebSocketTransport`] | Full-duplex client with reconnection | `websocket` |
//! | [`http::HttpTransport`] | Streamable HTTP (POST + SSE) client | `http` |
//! | [`memory::MemoryTransport`] | Testing and in-process communication | Always available |
//!
//! # Recovery
//!
//! Every transport owns a [`RecoveryEngine`](recovery::RecoveryEngine) that
//! classifies failures, tracks a circuit breaker per transport, and computes
//! reconnection delays. See the [`recovery`] module.
//!
//! # Example
//!
//! ```no_run
//! use mcplink_transport::{Transport, TransportExt, WebSocketConfig, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcplink_transport::TransportError> {
//!     let transport = WebSocketTransport::new(WebSocketConfig::new("wss://example.com/mcp"));
//!     let mut events = transport.subscribe();
//!     transport.connect().await?;
//!
//!     while let Some(msg) = transport.recv().await? {
//!         // Handle the message
//!         let _ = msg;
//!     }
//!
//!     while let Some(event) = events.try_recv() {
//!         println!("{:?}", event.kind());
//!     }
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

pub mod backoff;
pub mod error;
pub mod events;
pub mod memory;
pub mod rate_limit;
pub mod recovery;
pub mod target;
pub mod traits;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use backoff::Backoff;
pub use error::TransportError;
pub use events::{ConnectionState, EventBus, EventKind, EventSubscription, TransportEvent};
pub use memory::MemoryTransport;
pub use rate_limit::{ConnectionRateLimiter, RateLimitConfig};
pub use recovery::{
    CircuitBreakerConfig, CircuitState, RecoveryAction, RecoveryConfig, RecoveryEngine,
    RecoveryStrategy,
};
pub use target::validate_target;
pub use traits::{Transport, TransportExt, TransportMetadata};

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportConfig};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
