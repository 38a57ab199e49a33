//! Client implementation for mcplink.
//!
//! This crate drives one MCP server connection over any
//! [`Transport`](mcplink_transport::Transport): the `initialize` handshake,
//! request correlation, retries guided by the transport's recovery engine,
//! and the tool, resource and prompt operations.
//!
//! # Overview
//!
//! - [`Client`] is the facade; [`ClientBuilder`] constructs it
//! - [`ClientConfig`] holds timeouts, retry budget, caching and size limits
//! - [`ClientHandler`] receives server-initiated requests and notifications
//! - [`OfflineStore`] receives submissions made while the server is away
//!
//! # Example
//!
//! ```no_run
//! use mcplink_client::ClientBuilder;
//! use mcplink_transport::{WebSocketConfig, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcplink_core::McpError> {
//!     let transport = WebSocketTransport::new(WebSocketConfig::new("wss://example.com/mcp"));
//!     let client = ClientBuilder::new()
//!         .name("my-client")
//!         .version("1.0.0")
//!         .connect(transport)
//!         .await?;
//!
//!     for tool in client.list_tools().await? {
//!         println!("Tool: {}", tool.name);
//!     }
//!
//!     let result = client
//!         .call_tool("add", serde_json::json!({ "a": 1, "b": 2 }))
//!         .await?;
//!     println!("{}", result.text_content());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod correlation;
pub mod handler;
pub mod offline;

pub use builder::ClientBuilder;
pub use cache::{CacheStats, ResultCache};
pub use client::{Client, ClientStats, ClientStatus, Diagnostics, Submission};
pub use config::ClientConfig;
pub use correlation::{PendingRequests, PendingResponse};
pub use handler::{ClientHandler, NoOpHandler, Root, StaticRoots};
pub use offline::{MemoryOfflineStore, OfflineStore, OfflineStoreError, OfflineSubmission};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::{Client, Submission};
    pub use crate::config::ClientConfig;
    pub use crate::handler::{ClientHandler, Root};
    pub use crate::offline::{MemoryOfflineStore, OfflineStore};
}
