//! # mcplink - reliable MCP client engine
//!
//! mcplink keeps a recoverable connection to a Model Context Protocol
//! server and correlates JSON-RPC traffic over it.
//!
//! ## Features
//!
//! - **Two transports** behind one trait: a persistent WebSocket channel
//!   with heartbeat and reconnection, and HTTP POST with event-stream replies
//! - **Error classification** into categories and severities, feeding a
//!   per-component circuit breaker and a shared backoff policy
//! - **Request correlation** with per-request timeouts and cancellation
//! - **Client facade** for tools, resources and prompts, with catalog
//!   validation, result caching and offline deferral
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcplink::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), McpError> {
//!     mcplink::logging::init_tracing(&LoggingConfig::from_env()).ok();
//!
//!     let transport = WebSocketTransport::new(WebSocketConfig::new("wss://example.com/mcp"));
//!     let client = ClientBuilder::new()
//!         .name("my-app")
//!         .version("1.0.0")
//!         .connect(transport)
//!         .await?;
//!
//!     for tool in client.list_tools().await? {
//!         println!("{}", tool.name);
//!     }
//!     client.close().await
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`mcplink_core`] - Messages, codec, payload types and the error taxonomy
//! - [`mcplink_transport`] - Transports, recovery engine and event bus
//! - [`mcplink_client`] - The client facade
//! - [`logging`] - Tracing subscriber bootstrap

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

// Re-export all public items from core
pub use mcplink_core::*;

// Re-export client types
pub use mcplink_client::{Client, ClientBuilder, ClientConfig, ClientHandler};

// Re-export transport types
pub use mcplink_transport::{
    ConnectionState, MemoryTransport, RecoveryEngine, Transport, TransportError, TransportExt,
};
#[cfg(feature = "http")]
pub use mcplink_transport::{HttpTransport, HttpTransportConfig};
#[cfg(feature = "websocket")]
pub use mcplink_transport::{WebSocketConfig, WebSocketTransport};

pub mod logging;
pub mod prelude;

/// Transport module re-exports
pub mod transport {
    //! Transport layer types.
    pub use mcplink_transport::*;
}

/// Client module re-exports
pub mod client {
    //! Client implementation types.
    pub use mcplink_client::*;
}
