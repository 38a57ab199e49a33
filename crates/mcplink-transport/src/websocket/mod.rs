//! Persistent WebSocket channel to an MCP server.
//!
//! One socket carries both directions. A heartbeat task pings the server on
//! an interval and treats a missed pong as a lost connection. Losing the
//! socket triggers the reconnection loop, which waits out the shared backoff
//! policy and stops early when the breaker for this endpoint opens. Frames
//! sent while the socket is down are queued and flushed in order once it is
//! back.
//!
//! ```rust
//! use std::time::Duration;
//! use mcplink_transport::websocket::WebSocketConfig;
//!
//! let config = WebSocketConfig::new("wss://tools.example.com/mcp")
//!     .with_ping_interval(Duration::from_secs(15))
//!     .with_max_reconnect_attempts(3);
//! assert!(config.auto_reconnect);
//! ```

mod client;
mod config;

pub use client::{WebSocketStats, WebSocketTransport};
pub use config::WebSocketConfig;
