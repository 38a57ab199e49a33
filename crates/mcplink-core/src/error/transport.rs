//! Transport failure kinds and debugging context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection could not be established.
    ConnectionFailed,
    /// Connection was closed unexpectedly.
    ConnectionClosed,
    /// Read operation failed.
    ReadFailed,
    /// Write operation failed.
    WriteFailed,
    /// TLS/SSL error occurred.
    TlsError,
    /// DNS resolution failed.
    DnsResolutionFailed,
    /// Operation timed out.
    Timeout,
    /// Message format was invalid.
    InvalidMessage,
    /// Protocol violation detected.
    ProtocolViolation,
    /// Resources exhausted (queue full, message too large).
    ResourceExhausted,
    /// Rate limit exceeded.
    RateLimited,
    /// The target address was rejected before connecting.
    InvalidTarget,
    /// The peer answered with a non-success HTTP status.
    HttpStatus,
}

impl TransportErrorKind {
    /// Kinds that usually clear up by themselves on a fresh attempt.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed
                | Self::ConnectionClosed
                | Self::ReadFailed
                | Self::WriteFailed
                | Self::Timeout
                | Self::RateLimited
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionFailed => "connection failed",
            Self::ConnectionClosed => "connection closed",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::TlsError => "TLS error",
            Self::DnsResolutionFailed => "DNS resolution failed",
            Self::Timeout => "timeout",
            Self::InvalidMessage => "invalid message",
            Self::ProtocolViolation => "protocol violation",
            Self::ResourceExhausted => "resource exhausted",
            Self::RateLimited => "rate limited",
            Self::InvalidTarget => "invalid target",
            Self::HttpStatus => "http status",
        };
        f.write_str(s)
    }
}

/// Additional context for transport errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportContext {
    /// Transport type (websocket, http, memory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    /// Remote endpoint address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// HTTP status code, when the failure came from an HTTP exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Reconnection attempt number the failure happened on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl TransportContext {
    /// Create a new transport context for a specific transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: Some(transport_type.into()),
            ..Default::default()
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}
