//! Prelude module for convenient imports.
//!
//! ```rust
//! use mcplink::prelude::*;
//!
//! let config = ClientConfig::default();
//! let info = ClientInfo::new("my-app", "1.0.0");
//! assert_eq!(info.name, "my-app");
//! # let _ = config;
//! ```
//!
//! ## Included Types
//!
//! - Protocol and payload types from `mcplink-core`
//! - The error taxonomy (`McpError`, `ClassifiedError`, categories)
//! - The client facade, builder, configuration and handler trait
//! - The transport trait, connection state and the recovery engine
//! - Logging bootstrap configuration

// Core types
pub use mcplink_core::prelude::*;

// Client types
pub use mcplink_client::prelude::*;
pub use mcplink_client::{ClientStats, ClientStatus, Diagnostics, NoOpHandler};

// Transport types
pub use mcplink_transport::{
    Backoff, CircuitState, ConnectionState, EventKind, MemoryTransport, RecoveryAction,
    RecoveryEngine, Transport, TransportError, TransportEvent, TransportExt,
};
#[cfg(feature = "http")]
pub use mcplink_transport::{HttpTransport, HttpTransportConfig};
#[cfg(feature = "websocket")]
pub use mcplink_transport::{WebSocketConfig, WebSocketTransport};

// Logging
pub use crate::logging::{LogFormat, LoggingConfig};
