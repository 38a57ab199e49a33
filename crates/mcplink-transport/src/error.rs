//! Transport error types.

use std::time::Duration;

use mcplink_core::error::{McpError, TransportContext, TransportDetails, TransportErrorKind};
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection could not be established or was lost.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// TLS handshake or certificate validation failed.
    #[error("TLS error: {message}")]
    Tls {
        /// Error message.
        message: String,
    },

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport is not connected and the message could not be queued.
    #[error("Not connected")]
    NotConnected,

    /// A connect attempt is already running.
    #[error("Connection attempt already in progress")]
    ConnectInProgress,

    /// The outbound queue is at capacity.
    #[error("Outbound queue full ({capacity} messages)")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// Message was too large.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid message format.
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem.
        message: String,
    },

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The target address failed validation.
    #[error("Invalid target '{url}': {reason}")]
    InvalidTarget {
        /// The rejected address.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The circuit breaker for this transport is open.
    #[error("Circuit open for '{component}', retry after {retry_after:?}")]
    CircuitOpen {
        /// Component key.
        component: String,
        /// Remaining cool-down.
        retry_after: Duration,
    },

    /// Timeout occurred.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation waited.
        duration: Duration,
    },

    /// Transport was destroyed.
    #[error("Transport already closed")]
    AlreadyClosed,

    /// Rate limit exceeded.
    #[error("Rate limit exceeded{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited {
        /// Suggested retry delay.
        retry_after: Option<Duration>,
    },
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an invalid target error.
    pub fn invalid_target(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the transport error kind.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected => TransportErrorKind::ConnectionFailed,
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                    TransportErrorKind::ConnectionClosed
                }
                std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
                std::io::ErrorKind::WriteZero => TransportErrorKind::WriteFailed,
                _ => TransportErrorKind::ReadFailed,
            },
            Self::Json(_) => TransportErrorKind::InvalidMessage,
            Self::Connection { .. } | Self::NotConnected | Self::ConnectInProgress => {
                TransportErrorKind::ConnectionFailed
            }
            Self::Tls { .. } => TransportErrorKind::TlsError,
            Self::ConnectionClosed | Self::AlreadyClosed => TransportErrorKind::ConnectionClosed,
            Self::QueueFull { .. } | Self::MessageTooLarge { .. } => {
                TransportErrorKind::ResourceExhausted
            }
            Self::InvalidMessage { .. } => TransportErrorKind::InvalidMessage,
            Self::Protocol { .. } => TransportErrorKind::ProtocolViolation,
            Self::InvalidTarget { .. } => TransportErrorKind::InvalidTarget,
            Self::Http { .. } => TransportErrorKind::HttpStatus,
            Self::CircuitOpen { .. } => TransportErrorKind::ResourceExhausted,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::RateLimited { .. } => TransportErrorKind::RateLimited,
        }
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        if let TransportError::MessageTooLarge { size, max } = err {
            return Self::message_too_large(size, max);
        }
        let mut context = TransportContext::default();
        context.status = err.status();
        Self::Transport(Box::new(TransportDetails {
            kind: err.kind(),
            message: err.to_string(),
            context,
            source: Some(Box::new(err)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TransportError::ConnectionClosed.kind(),
            TransportErrorKind::ConnectionClosed
        );
        assert_eq!(
            TransportError::Timeout {
                operation: "connect".to_string(),
                duration: Duration::from_secs(1),
            }
            .kind(),
            TransportErrorKind::Timeout
        );
        assert_eq!(
            TransportError::invalid_target("ws://127.0.0.1", "loopback").kind(),
            TransportErrorKind::InvalidTarget
        );
        assert_eq!(
            TransportError::QueueFull { capacity: 4 }.kind(),
            TransportErrorKind::ResourceExhausted
        );
    }

    #[test]
    fn test_mcp_error_conversion_keeps_status() {
        let err = TransportError::Http {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        let mcp_err: McpError = err.into();

        match mcp_err {
            McpError::Transport(details) => {
                assert_eq!(details.kind, TransportErrorKind::HttpStatus);
                assert_eq!(details.context.status, Some(401));
            }
            _ => panic!("Expected Transport error"),
        }
    }

    #[test]
    fn test_message_too_large_maps_to_core_variant() {
        let mcp_err: McpError = TransportError::MessageTooLarge { size: 10, max: 5 }.into();
        assert!(matches!(
            mcp_err,
            McpError::MessageTooLarge { size: 10, max: 5 }
        ));
    }
}
