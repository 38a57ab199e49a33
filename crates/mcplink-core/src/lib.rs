//! # mcplink-core
//!
//! Runtime-independent building blocks for the mcplink MCP client:
//!
//! - **Protocol types**: JSON-RPC 2.0 request/response/notification types
//! - **Codec**: id assignment, validation and size limits for wire text
//! - **Errors**: [`McpError`] plus the [`ClassifiedError`] taxonomy used by
//!   the recovery engine
//! - **Payload types**: capabilities, tools, resources, prompts
//!
//! # Example
//!
//! ```rust
//! use mcplink_core::{Message, MessageCodec};
//!
//! let codec = MessageCodec::default();
//! let request = codec.create_request("tools/list", None, None);
//! let text = codec.serialize(&Message::Request(request)).unwrap();
//! let parsed = codec.deserialize(&text).unwrap();
//! assert_eq!(parsed.method(), Some("tools/list"));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod types;

pub use capability::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResult, PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, is_version_supported,
};
pub use codec::MessageCodec;
pub use error::{
    ClassifiedError, ErrorCategory, ErrorContext, ErrorType, JsonRpcError, McpError,
    McpResultExt, Severity,
};
pub use protocol::{ListChanged, Message, Notification, Request, RequestId, Response, methods};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::capability::{
        ClientCapabilities, ClientInfo, InitializeResult, PROTOCOL_VERSION, ServerCapabilities,
        ServerInfo,
    };
    pub use crate::codec::MessageCodec;
    pub use crate::error::{
        ClassifiedError, ErrorCategory, ErrorContext, ErrorType, McpError, McpResultExt,
        Severity,
    };
    pub use crate::protocol::{Message, Notification, Request, RequestId, Response};
    pub use crate::types::{
        CallToolResult, Content, GetPromptResult, Prompt, PromptMessage, ReadResourceResult,
        Resource, ResourceContents, Role, Tool,
    };
}
