//! Streamable HTTP: each outbound frame is its own POST.
//!
//! The server answers a POST with `202 Accepted` (notifications), a JSON
//! body holding one message or a batch, or an event stream whose `data:`
//! lines carry messages until the reply arrives. Everything decoded from a
//! reply is delivered through [`Transport::recv`](crate::Transport::recv)
//! in arrival order.
//!
//! The `Mcp-Session-Id` header handed out with the `initialize` reply is
//! echoed on every later POST.
//!
//! ```rust
//! use mcplink_transport::http::HttpTransportConfig;
//!
//! let config = HttpTransportConfig::new("https://tools.example.com/mcp")
//!     .with_bearer_token("token");
//! assert_eq!(config.url, "https://tools.example.com/mcp");
//! ```

mod client;
mod config;
mod sse;

pub use client::HttpTransport;
pub use config::{
    EVENT_STREAM_CONTENT_TYPE, HttpTransportConfig,
    MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER,
};
pub use sse::{SseDecoder, SseEvent};
