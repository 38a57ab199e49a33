//! Error handling for mcplink.
//!
//! All fallible operations return [`McpError`]. Transport crates convert
//! their own error types into it, and the recovery engine wraps failures it
//! decides to surface in [`McpError::Classified`], which carries a
//! [`ClassifiedError`] with category, severity and retry flags.
//!
//! Large variants are boxed to keep `Result<T, McpError>` small.
//!
//! ```rust
//! use mcplink_core::error::{McpError, McpResultExt};
//!
//! fn fetch() -> Result<String, McpError> {
//!     let result: Result<(), McpError> = Err(McpError::resource_not_found("file:///a"));
//!     result.context("Failed to read resource")?;
//!     Ok("data".to_string())
//! }
//! assert!(fetch().is_err());
//! ```

mod classified;
pub mod codes;
mod context;
mod details;
mod jsonrpc;
mod transport;
mod types;

pub use classified::{
    ClassifiedError, ErrorCategory, ErrorContext, ErrorProfile, ErrorType, Severity,
};
pub use codes::*;
pub use context::McpResultExt;
pub use details::{
    BoxError, HandshakeDetails, InvalidParamsDetails, ResourceSizeDetails, TransportDetails,
};
pub use jsonrpc::JsonRpcError;
pub use transport::{TransportContext, TransportErrorKind};
pub use types::McpError;
