//! Classified errors: failures enriched with recovery metadata.
//!
//! A [`ClassifiedError`] is what the recovery engine hands out after looking
//! at a raw failure. Its [`ErrorType`] determines the category, severity and
//! the recoverable/retryable flags; these are fixed at construction time and
//! the value is immutable afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad grouping of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network reachability, refused or dropped connections.
    Connection,
    /// TLS and certificate problems, rejected targets.
    Security,
    /// Missing or rejected credentials.
    Authentication,
    /// The peer asked us to slow down.
    RateLimiting,
    /// An operation ran out of time.
    Timeout,
    /// The request itself was wrong (bad params, unknown method).
    Validation,
    /// A named resource or tool could not be accessed.
    ResourceAccess,
    /// Failures inside the peer or the local runtime.
    System,
    /// Malformed frames or negotiation failures.
    Protocol,
    /// Nothing more specific matched.
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connection => "connection",
            Self::Security => "security",
            Self::Authentication => "authentication",
            Self::RateLimiting => "rate_limiting",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::ResourceAccess => "resource_access",
            Self::System => "system",
            Self::Protocol => "protocol",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How serious a failure is. Ordered from `Low` to `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Ignorable; the affected unit of work is dropped.
    Low,
    /// Recoverable; retried or surfaced per policy.
    Medium,
    /// Recoverable but serious; counts against the circuit breaker.
    High,
    /// Not recoverable without intervention; never retried.
    Critical,
}

impl Severity {
    /// Whether failures of this severity count against a circuit breaker.
    #[must_use]
    pub const fn trips_breaker(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Specific failure type recognized by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The peer actively refused the connection.
    ConnectionRefused,
    /// An established connection was reset.
    ConnectionReset,
    /// The connection dropped or could not be kept alive.
    ConnectionLost,
    /// The host name did not resolve.
    DnsFailure,
    /// TLS handshake or certificate validation failed.
    Certificate,
    /// Credentials missing or rejected.
    Unauthorized,
    /// Credentials valid but not permitted.
    Forbidden,
    /// The target address was refused before connecting.
    InvalidTarget,
    /// Too many requests or connection attempts.
    RateLimited,
    /// An operation timed out.
    Timeout,
    /// The request carried invalid parameters.
    InvalidParams,
    /// The requested method or tool does not exist.
    MethodNotFound,
    /// The requested resource does not exist.
    NotFound,
    /// Payload exceeded a configured size limit.
    PayloadTooLarge,
    /// The peer reported an internal failure.
    InternalError,
    /// The peer is temporarily unavailable (5xx).
    ServiceUnavailable,
    /// A single frame could not be parsed.
    ParseError,
    /// Content negotiation or protocol version mismatch.
    ProtocolMismatch,
    /// The operation was cancelled locally.
    Cancelled,
    /// A tool ran and reported failure through `isError`.
    ToolFailed,
    /// No pattern matched.
    Unknown,
}

/// Fixed recovery profile for an [`ErrorType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorProfile {
    /// Category the type belongs to.
    pub category: ErrorCategory,
    /// Severity of the type.
    pub severity: Severity,
    /// Whether the system can get past this failure at all.
    pub recoverable: bool,
    /// Whether repeating the same operation may succeed.
    pub retryable: bool,
}

impl ErrorType {
    /// The category/severity/flags table for this type.
    #[must_use]
    pub const fn profile(self) -> ErrorProfile {
        use ErrorCategory as C;
        use Severity as S;

        let (category, severity, recoverable, retryable) = match self {
            Self::ConnectionRefused
            | Self::ConnectionReset
            | Self::ConnectionLost
            | Self::DnsFailure
            | Self::ServiceUnavailable => (C::Connection, S::High, true, true),
            Self::Certificate => (C::Security, S::Critical, false, false),
            Self::InvalidTarget => (C::Security, S::Critical, false, false),
            Self::Unauthorized | Self::Forbidden => (C::Authentication, S::Critical, false, false),
            Self::RateLimited => (C::RateLimiting, S::Medium, true, true),
            Self::Timeout => (C::Timeout, S::Medium, true, true),
            Self::InvalidParams | Self::MethodNotFound | Self::PayloadTooLarge => {
                (C::Validation, S::Medium, true, false)
            }
            Self::NotFound => (C::ResourceAccess, S::Medium, true, false),
            Self::InternalError => (C::System, S::High, true, true),
            Self::ToolFailed => (C::System, S::Medium, true, false),
            Self::Cancelled => (C::System, S::Low, true, false),
            Self::ParseError => (C::Protocol, S::Low, true, false),
            Self::ProtocolMismatch => (C::Protocol, S::High, false, false),
            Self::Unknown => (C::Unknown, S::Medium, true, false),
        };

        ErrorProfile {
            category,
            severity,
            recoverable,
            retryable,
        }
    }

    /// Transient network failures that deserve an almost immediate retry.
    #[must_use]
    pub const fn is_fast_retry(self) -> bool {
        matches!(self, Self::ConnectionReset)
    }
}

/// Where and while doing what an error happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Component key, e.g. `websocket` or `client`.
    pub component: String,
    /// Operation name, e.g. `connect` or `tools/call`.
    pub operation: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
    /// Tool involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Resource involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
}

impl ErrorContext {
    /// Create a context stamped with the current time.
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            timestamp: Utc::now(),
            tool_name: None,
            resource_uri: None,
        }
    }

    /// Attach the tool name.
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Attach the resource URI.
    #[must_use]
    pub fn with_resource(mut self, uri: impl Into<String>) -> Self {
        self.resource_uri = Some(uri.into());
        self
    }
}

/// An error enriched with classification metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    id: Uuid,
    error_type: ErrorType,
    category: ErrorCategory,
    severity: Severity,
    recoverable: bool,
    retryable: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
    context: ErrorContext,
}

impl ClassifiedError {
    /// Classify `message` as `error_type`, deriving the rest from the type's profile.
    pub fn new(error_type: ErrorType, message: impl Into<String>, context: ErrorContext) -> Self {
        let profile = error_type.profile();
        Self {
            id: Uuid::new_v4(),
            error_type,
            category: profile.category,
            severity: profile.severity,
            recoverable: profile.recoverable,
            retryable: profile.retryable,
            message: message.into(),
            code: None,
            status: None,
            cause: None,
            context,
        }
    }

    /// Record the JSON-RPC code the failure carried.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Record the HTTP status the failure carried.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Record the underlying cause, rendered as text.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Unique id of this occurrence.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Specific type.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether the failure can be recovered from at all.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Whether repeating the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// JSON-RPC code, if one was observed.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        self.code
    }

    /// HTTP status, if one was observed.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Underlying cause text.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Where the failure happened.
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Operator guidance for failures that need a human.
    #[must_use]
    pub const fn guidance(&self) -> Option<&'static str> {
        match self.error_type {
            ErrorType::Certificate => Some(
                "Verify the server certificate chain and system clock; automatic retries are disabled",
            ),
            ErrorType::InvalidTarget => Some(
                "Use a public ws/wss or http/https address, or enable local targets for development",
            ),
            ErrorType::Unauthorized => {
                Some("Provide a valid bearer token; the request will not be retried")
            }
            ErrorType::Forbidden => {
                Some("The credential is not permitted for this operation; check its scopes")
            }
            ErrorType::ProtocolMismatch => {
                Some("Check the negotiated protocol version and Accept headers")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error ({}, {:?}) in {}/{}: {}",
            self.category,
            self.severity,
            self.error_type,
            self.context.component,
            self.context.operation,
            self.message
        )
    }
}

impl std::error::Error for ClassifiedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_drives_flags() {
        let err = ClassifiedError::new(
            ErrorType::Unauthorized,
            "401",
            ErrorContext::new("http", "send"),
        );
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.severity(), Severity::Critical);
        assert!(!err.is_recoverable());
        assert!(!err.is_retryable());
        assert!(err.guidance().is_some());
    }

    #[test]
    fn test_breaker_relevance() {
        assert!(!Severity::Low.trips_breaker());
        assert!(!Severity::Medium.trips_breaker());
        assert!(Severity::High.trips_breaker());
        assert!(Severity::Critical.trips_breaker());
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_context_and_display() {
        let ctx = ErrorContext::new("client", "tools/call").with_tool("search");
        let err = ClassifiedError::new(ErrorType::MethodNotFound, "no such tool", ctx)
            .with_code(-32601);
        assert_eq!(err.context().tool_name.as_deref(), Some("search"));
        assert_eq!(err.code(), Some(-32601));
        let text = err.to_string();
        assert!(text.contains("validation"));
        assert!(text.contains("client/tools/call"));
    }

    #[test]
    fn test_serializes_with_snake_case_enums() {
        let err = ClassifiedError::new(
            ErrorType::RateLimited,
            "slow down",
            ErrorContext::new("http", "send"),
        )
        .with_status(429);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["category"], "rate_limiting");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["status"], 429);
        assert!(value.get("code").is_none());
    }

    #[test]
    fn test_every_critical_type_is_not_retryable() {
        let all = [
            ErrorType::ConnectionRefused,
            ErrorType::ConnectionReset,
            ErrorType::ConnectionLost,
            ErrorType::DnsFailure,
            ErrorType::Certificate,
            ErrorType::Unauthorized,
            ErrorType::Forbidden,
            ErrorType::InvalidTarget,
            ErrorType::RateLimited,
            ErrorType::Timeout,
            ErrorType::InvalidParams,
            ErrorType::MethodNotFound,
            ErrorType::NotFound,
            ErrorType::PayloadTooLarge,
            ErrorType::InternalError,
            ErrorType::ServiceUnavailable,
            ErrorType::ParseError,
            ErrorType::ProtocolMismatch,
            ErrorType::Cancelled,
            ErrorType::ToolFailed,
            ErrorType::Unknown,
        ];
        for ty in all {
            let p = ty.profile();
            if p.severity == Severity::Critical {
                assert!(!p.retryable, "{ty:?} must not be retryable");
            }
            if p.retryable {
                assert!(p.recoverable, "{ty:?} retryable implies recoverable");
            }
        }
    }
}
