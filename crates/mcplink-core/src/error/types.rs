//! The unified [`McpError`] type.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use super::classified::ClassifiedError;
use super::codes;
use super::details::{
    BoxError, HandshakeDetails, InvalidParamsDetails, ResourceSizeDetails, TransportDetails,
};
use super::jsonrpc::JsonRpcError;
use super::transport::{TransportContext, TransportErrorKind};

/// The primary error type for mcplink.
///
/// Large variants are boxed to keep `Result<T, McpError>` small.
#[derive(Error, Diagnostic, Debug)]
pub enum McpError {
    // JSON-RPC errors
    /// Text could not be parsed as a JSON-RPC message.
    #[error("Parse error: {message}")]
    #[diagnostic(
        code(mcplink::protocol::parse_error),
        help("Ensure the message is valid JSON-RPC 2.0 format")
    )]
    Parse {
        /// Human-readable error message.
        message: String,
        /// The underlying parse error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// The message was JSON but not a valid JSON-RPC object.
    #[error("Invalid request: {message}")]
    #[diagnostic(code(mcplink::protocol::invalid_request))]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
    },

    /// The method does not exist or is not available.
    #[error("Method not found: {method}")]
    #[diagnostic(code(mcplink::protocol::method_not_found))]
    MethodNotFound {
        /// The method that was requested.
        method: String,
    },

    /// Invalid method parameter(s).
    #[error("Invalid params for '{}': {}", .0.method, .0.message)]
    #[diagnostic(code(mcplink::protocol::invalid_params))]
    InvalidParams(#[source] Box<InvalidParamsDetails>),

    /// Internal error.
    #[error("Internal error: {message}")]
    #[diagnostic(code(mcplink::protocol::internal_error), severity(error))]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// Any other error object returned by the server.
    #[error("Server error {}: {}", .0.code, .0.message)]
    #[diagnostic(code(mcplink::protocol::server_error))]
    Rpc(Box<JsonRpcError>),

    // Transport
    /// Transport-level error.
    #[error("Transport error ({}): {}", .0.kind, .0.message)]
    #[diagnostic(code(mcplink::transport::error))]
    Transport(#[source] Box<TransportDetails>),

    /// A serialized message exceeded the configured limit.
    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    #[diagnostic(
        code(mcplink::transport::message_too_large),
        help("Raise max_message_size or send smaller payloads")
    )]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Configured limit in bytes.
        max: usize,
    },

    // Resources
    /// A requested resource was not found.
    #[error("Resource not found: {uri}")]
    #[diagnostic(
        code(mcplink::resource::not_found),
        help("Verify the URI is correct and the resource exists")
    )]
    ResourceNotFound {
        /// The URI of the resource that was not found.
        uri: String,
    },

    /// A resource was larger than the client accepts.
    #[error("{0}")]
    #[diagnostic(
        code(mcplink::resource::too_large),
        help("Raise max_resource_size in the client configuration")
    )]
    ResourceTooLarge(Box<ResourceSizeDetails>),

    // Connection and session
    /// Connection establishment failed.
    #[error("Connection failed: {message}")]
    #[diagnostic(code(mcplink::connection::failed))]
    ConnectionFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// An operation was attempted before connect + initialize succeeded.
    #[error("Not connected: cannot {operation}")]
    #[diagnostic(
        code(mcplink::connection::not_connected),
        help("Call connect() and initialize() first")
    )]
    NotConnected {
        /// The operation that was refused.
        operation: String,
    },

    /// Protocol handshake failed.
    #[error("Handshake failed: {}", .0.message)]
    #[diagnostic(code(mcplink::handshake::failed))]
    HandshakeFailed(#[source] Box<HandshakeDetails>),

    /// The server did not advertise a capability the call needs.
    #[error("Capability not supported: {capability}")]
    #[diagnostic(code(mcplink::capability::not_supported))]
    CapabilityNotSupported {
        /// The capability that was requested.
        capability: String,
    },

    // Timeouts and cancellation
    /// An operation timed out.
    #[error("Timeout after {duration:?}: {operation}")]
    #[diagnostic(
        code(mcplink::timeout),
        help("Consider increasing the timeout or checking connectivity")
    )]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long we waited before timing out.
        duration: Duration,
    },

    /// An operation was cancelled.
    #[error("Operation cancelled: {operation}")]
    #[diagnostic(code(mcplink::cancelled))]
    Cancelled {
        /// The operation that was cancelled.
        operation: String,
        /// Reason for cancellation, if provided.
        reason: Option<String>,
    },

    // Recovery engine output
    /// A failure the recovery engine classified and decided to surface.
    #[error("{0}")]
    #[diagnostic(code(mcplink::classified))]
    Classified(Box<ClassifiedError>),

    // Wrappers
    /// An error with additional context.
    #[error("{context}: {source}")]
    #[diagnostic(code(mcplink::context))]
    WithContext {
        /// The context message.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<McpError>,
    },

}


impl McpError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with a source.
    pub fn parse_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a method not found error.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Create an invalid params error.
    pub fn invalid_params(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams(Box::new(InvalidParamsDetails {
            method: method.into(),
            message: message.into(),
            source: None,
        }))
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::transport_with_context(kind, message, TransportContext::default())
    }

    /// Create a transport error with context.
    pub fn transport_with_context(
        kind: TransportErrorKind,
        message: impl Into<String>,
        context: TransportContext,
    ) -> Self {
        Self::Transport(Box::new(TransportDetails {
            kind,
            message: message.into(),
            context,
            source: None,
        }))
    }

    /// Create a message-too-large error.
    #[must_use]
    pub const fn message_too_large(size: usize, max: usize) -> Self {
        Self::MessageTooLarge { size, max }
    }

    /// Create a resource not found error.
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        Self::ResourceNotFound { uri: uri.into() }
    }

    /// Create a resource-too-large error.
    pub fn resource_too_large(uri: impl Into<String>, size: u64, max: u64) -> Self {
        Self::ResourceTooLarge(Box::new(ResourceSizeDetails {
            uri: uri.into(),
            size,
            max,
        }))
    }

    /// Create a not-connected error for `operation`.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        Self::NotConnected {
            operation: operation.into(),
        }
    }

    /// Create a handshake failed error.
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::handshake_failed_with_versions(message, None, None)
    }

    /// Create a handshake failed error with version info.
    pub fn handshake_failed_with_versions(
        message: impl Into<String>,
        client_version: Option<String>,
        server_version: Option<String>,
    ) -> Self {
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: message.into(),
            client_version,
            server_version,
        }))
    }

    /// Create a capability not supported error.
    pub fn capability_not_supported(capability: impl Into<String>) -> Self {
        Self::CapabilityNotSupported {
            capability: capability.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            reason: None,
        }
    }

    /// Create a cancelled error with reason.
    pub fn cancelled_with_reason(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            reason: Some(reason.into()),
        }
    }

    /// Wrap a classified error.
    #[must_use]
    pub fn classified(error: ClassifiedError) -> Self {
        Self::Classified(Box::new(error))
    }

    /// Map an error object received from the server onto the matching variant.
    ///
    /// Everything except parse and invalid-request errors keeps the original
    /// code and data in [`McpError::Rpc`].
    #[must_use]
    pub fn from_rpc(error: JsonRpcError) -> Self {
        match error.code {
            codes::PARSE_ERROR => Self::parse(error.message),
            codes::INVALID_REQUEST => Self::invalid_request(error.message),
            _ => Self::Rpc(Box::new(error)),
        }
    }

    /// Add a context message.
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip context wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// The classification attached to this error, if any.
    #[must_use]
    pub fn as_classified(&self) -> Option<&ClassifiedError> {
        match self.root() {
            Self::Classified(c) => Some(c),
            _ => None,
        }
    }

    /// Get the JSON-RPC error code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse { .. } => codes::PARSE_ERROR,
            Self::InvalidRequest { .. } => codes::INVALID_REQUEST,
            Self::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Internal { .. } => codes::INTERNAL_ERROR,
            Self::Rpc(e) => e.code,
            Self::Transport(_) => codes::SERVER_ERROR_START,
            Self::MessageTooLarge { .. } => codes::INVALID_REQUEST,
            Self::ResourceNotFound { .. } => codes::RESOURCE_NOT_FOUND,
            Self::ResourceTooLarge(_) => codes::SERVER_ERROR_START - 2,
            Self::ConnectionFailed { .. } => codes::SERVER_ERROR_START - 3,
            Self::NotConnected { .. } => codes::SERVER_ERROR_START - 3,
            Self::HandshakeFailed(_) => codes::SERVER_ERROR_START - 5,
            Self::CapabilityNotSupported { .. } => codes::SERVER_ERROR_START - 6,
            Self::Timeout { .. } => codes::SERVER_ERROR_START - 7,
            Self::Cancelled { .. } => codes::REQUEST_CANCELLED,
            Self::Classified(c) => c.code().unwrap_or(codes::SERVER_ERROR_START - 9),
            Self::WithContext { source, .. } => source.code(),
        }
    }

    /// Check if a later attempt at the same operation may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(details) => details.kind.is_transient(),
            Self::ResourceNotFound { .. } => true,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::Classified(c) => c.is_recoverable(),
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Whether this is a timeout, possibly behind context wrappers.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self.root() {
            Self::Timeout { .. } => true,
            Self::Classified(c) => c.category() == super::ErrorCategory::Timeout,
            _ => false,
        }
    }

    /// Whether this is an explicit cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled { .. })
    }
}


impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_with_source("JSON serialization/deserialization error", err)
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        Self::from_rpc(err)
    }
}

impl From<ClassifiedError> for McpError {
    fn from(err: ClassifiedError) -> Self {
        Self::classified(err)
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                TransportErrorKind::ConnectionFailed
            }
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                TransportErrorKind::ConnectionClosed
            }
            std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            std::io::ErrorKind::WriteZero => TransportErrorKind::WriteFailed,
            _ => TransportErrorKind::ReadFailed,
        };
        let message = err.to_string();
        Self::Transport(Box::new(TransportDetails {
            kind,
            message,
            context: TransportContext::default(),
            source: Some(Box::new(err)),
        }))
    }
}
