//! Mapping raw failures onto [`ErrorType`]s.
//!
//! Errors from every layer are first reduced to [`ErrorSignals`]: the
//! rendered message plus whatever structured hints the error carries (HTTP
//! status, JSON-RPC code, transport kind, I/O kind). Structured hints win over
//! message text; message patterns are the fallback for errors that only carry
//! text, such as those coming out of TLS or DNS libraries.

use std::io;

use mcplink_core::error::{
    ClassifiedError, ErrorContext, ErrorType, JsonRpcError, McpError, TransportErrorKind, codes,
};

use crate::error::TransportError;

/// Structured hints extracted from an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorSignals {
    /// The error rendered for humans.
    pub message: String,
    /// Type already known from the error's own variant.
    pub known: Option<ErrorType>,
    /// HTTP status.
    pub status: Option<u16>,
    /// JSON-RPC error code.
    pub code: Option<i32>,
    /// Transport failure kind.
    pub transport_kind: Option<TransportErrorKind>,
    /// Underlying I/O failure kind.
    pub io_kind: Option<io::ErrorKind>,
    /// The first source in the error chain, rendered.
    pub cause: Option<String>,
}

impl ErrorSignals {
    /// Signals carrying only a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    fn known(mut self, ty: ErrorType) -> Self {
        self.known = Some(ty);
        self
    }
}

/// Errors the recovery engine knows how to classify.
pub trait Classify {
    /// Extract classification hints.
    fn signals(&self) -> ErrorSignals;
}

impl Classify for McpError {
    fn signals(&self) -> ErrorSignals {
        let root = self.root();
        let mut signals = ErrorSignals::from_message(self.to_string());
        signals.cause = std::error::Error::source(root).map(ToString::to_string);

        match root {
            McpError::Classified(c) => {
                signals.code = c.code();
                signals.status = c.status();
                signals.known(c.error_type())
            }
            McpError::Parse { .. } | McpError::InvalidRequest { .. } => {
                signals.code = Some(root.code());
                signals.known(ErrorType::ParseError)
            }
            McpError::MethodNotFound { .. } | McpError::CapabilityNotSupported { .. } => {
                signals.code = Some(codes::METHOD_NOT_FOUND);
                signals.known(ErrorType::MethodNotFound)
            }
            McpError::InvalidParams(_) => {
                signals.code = Some(codes::INVALID_PARAMS);
                signals.known(ErrorType::InvalidParams)
            }
            McpError::Internal { .. } => {
                signals.code = Some(codes::INTERNAL_ERROR);
                signals.known(ErrorType::InternalError)
            }
            McpError::Rpc(e) => {
                signals.code = Some(e.code);
                signals
            }
            McpError::Transport(details) => {
                signals.transport_kind = Some(details.kind);
                signals.status = details.context.status;
                if let Some(io_err) = details
                    .source
                    .as_ref()
                    .and_then(|s| s.downcast_ref::<io::Error>())
                {
                    signals.io_kind = Some(io_err.kind());
                }
                if let Some(TransportError::Io(io_err)) = details
                    .source
                    .as_ref()
                    .and_then(|s| s.downcast_ref::<TransportError>())
                {
                    signals.io_kind = Some(io_err.kind());
                }
                signals
            }
            McpError::MessageTooLarge { .. } | McpError::ResourceTooLarge(_) => {
                signals.known(ErrorType::PayloadTooLarge)
            }
            McpError::ResourceNotFound { .. } => {
                signals.code = Some(codes::RESOURCE_NOT_FOUND);
                signals.known(ErrorType::NotFound)
            }
            McpError::ConnectionFailed { .. } => signals,
            McpError::NotConnected { .. } => signals.known(ErrorType::ConnectionLost),
            McpError::HandshakeFailed(_) => signals.known(ErrorType::ProtocolMismatch),
            McpError::Timeout { .. } => signals.known(ErrorType::Timeout),
            McpError::Cancelled { .. } => {
                signals.code = Some(codes::REQUEST_CANCELLED);
                signals.known(ErrorType::Cancelled)
            }
            // root() never returns a wrapper
            McpError::WithContext { .. } => signals,
        }
    }
}

impl Classify for TransportError {
    fn signals(&self) -> ErrorSignals {
        let mut signals = ErrorSignals::from_message(self.to_string());
        signals.transport_kind = Some(self.kind());
        signals.status = self.status();
        match self {
            Self::Io(e) => signals.io_kind = Some(e.kind()),
            Self::Tls { .. } => return signals.known(ErrorType::Certificate),
            Self::InvalidTarget { .. } => return signals.known(ErrorType::InvalidTarget),
            Self::Timeout { .. } => return signals.known(ErrorType::Timeout),
            Self::RateLimited { .. } => return signals.known(ErrorType::RateLimited),
            Self::MessageTooLarge { .. } => return signals.known(ErrorType::PayloadTooLarge),
            Self::InvalidMessage { .. } | Self::Json(_) => {
                return signals.known(ErrorType::ParseError);
            }
            Self::CircuitOpen { .. } => return signals.known(ErrorType::ServiceUnavailable),
            _ => {}
        }
        signals
    }
}

impl Classify for JsonRpcError {
    fn signals(&self) -> ErrorSignals {
        let mut signals = ErrorSignals::from_message(self.message.clone());
        signals.code = Some(self.code);
        signals
    }
}

impl Classify for io::Error {
    fn signals(&self) -> ErrorSignals {
        let mut signals = ErrorSignals::from_message(self.to_string());
        signals.io_kind = Some(self.kind());
        signals
    }
}

/// Classify `error` as it happened in `context`.
pub fn classify<E: Classify + ?Sized>(error: &E, context: ErrorContext) -> ClassifiedError {
    classify_signals(error.signals(), context)
}

/// Classify pre-extracted signals.
pub fn classify_signals(signals: ErrorSignals, context: ErrorContext) -> ClassifiedError {
    let error_type = error_type_for(&signals);
    let mut classified = ClassifiedError::new(error_type, signals.message, context);
    if let Some(code) = signals.code {
        classified = classified.with_code(code);
    }
    if let Some(status) = signals.status {
        classified = classified.with_status(status);
    }
    if let Some(cause) = signals.cause {
        classified = classified.with_cause(cause);
    }
    classified
}

/// Decide the [`ErrorType`] for a set of signals.
#[must_use]
pub fn error_type_for(signals: &ErrorSignals) -> ErrorType {
    if let Some(ty) = signals.known {
        return ty;
    }
    if let Some(ty) = signals.status.and_then(type_for_status) {
        return ty;
    }
    if let Some(ty) = signals.code.and_then(type_for_code) {
        return ty;
    }
    if let Some(ty) = signals.transport_kind.and_then(type_for_specific_kind) {
        return ty;
    }
    if let Some(ty) = signals.io_kind.and_then(type_for_io_kind) {
        return ty;
    }
    if let Some(ty) = type_for_message(&signals.message) {
        return ty;
    }
    if let Some(ty) = signals.cause.as_deref().and_then(type_for_message) {
        return ty;
    }
    signals
        .transport_kind
        .map_or(ErrorType::Unknown, type_for_generic_kind)
}

fn type_for_status(status: u16) -> Option<ErrorType> {
    let ty = match status {
        400 | 406 | 415 => ErrorType::ProtocolMismatch,
        401 => ErrorType::Unauthorized,
        403 => ErrorType::Forbidden,
        404 => ErrorType::NotFound,
        408 => ErrorType::Timeout,
        413 => ErrorType::PayloadTooLarge,
        429 => ErrorType::RateLimited,
        // Any 5xx is the server side failing; the request may succeed later.
        500..=599 => ErrorType::ServiceUnavailable,
        _ => return None,
    };
    Some(ty)
}

fn type_for_code(code: i32) -> Option<ErrorType> {
    let ty = match code {
        codes::PARSE_ERROR | codes::INVALID_REQUEST => ErrorType::ParseError,
        codes::METHOD_NOT_FOUND => ErrorType::MethodNotFound,
        codes::INVALID_PARAMS => ErrorType::InvalidParams,
        codes::INTERNAL_ERROR => ErrorType::InternalError,
        codes::RESOURCE_NOT_FOUND => ErrorType::NotFound,
        codes::REQUEST_CANCELLED => ErrorType::Cancelled,
        _ => return None,
    };
    Some(ty)
}

fn type_for_specific_kind(kind: TransportErrorKind) -> Option<ErrorType> {
    let ty = match kind {
        TransportErrorKind::TlsError => ErrorType::Certificate,
        TransportErrorKind::DnsResolutionFailed => ErrorType::DnsFailure,
        TransportErrorKind::Timeout => ErrorType::Timeout,
        TransportErrorKind::RateLimited => ErrorType::RateLimited,
        TransportErrorKind::InvalidTarget => ErrorType::InvalidTarget,
        _ => return None,
    };
    Some(ty)
}

fn type_for_generic_kind(kind: TransportErrorKind) -> ErrorType {
    match kind {
        TransportErrorKind::ConnectionFailed => ErrorType::ConnectionRefused,
        TransportErrorKind::ConnectionClosed
        | TransportErrorKind::ReadFailed
        | TransportErrorKind::WriteFailed => ErrorType::ConnectionLost,
        TransportErrorKind::InvalidMessage => ErrorType::ParseError,
        TransportErrorKind::ProtocolViolation => ErrorType::ProtocolMismatch,
        TransportErrorKind::ResourceExhausted => ErrorType::PayloadTooLarge,
        other => type_for_specific_kind(other).unwrap_or(ErrorType::Unknown),
    }
}

fn type_for_io_kind(kind: io::ErrorKind) -> Option<ErrorType> {
    let ty = match kind {
        io::ErrorKind::ConnectionRefused => ErrorType::ConnectionRefused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => ErrorType::ConnectionReset,
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => ErrorType::ConnectionLost,
        io::ErrorKind::TimedOut => ErrorType::Timeout,
        io::ErrorKind::PermissionDenied => ErrorType::Forbidden,
        _ => return None,
    };
    Some(ty)
}

const MESSAGE_PATTERNS: &[(&[&str], ErrorType)] = &[
    (
        &["certificate", "x509", "ssl", "tls handshake", "self signed", "self-signed"],
        ErrorType::Certificate,
    ),
    (
        &["unauthorized", "unauthenticated", "invalid token", "expired token", "401"],
        ErrorType::Unauthorized,
    ),
    (&["forbidden", "access denied", "403"], ErrorType::Forbidden),
    (
        &["rate limit", "too many requests", "429", "throttl"],
        ErrorType::RateLimited,
    ),
    (&["timed out", "timeout", "deadline"], ErrorType::Timeout),
    (&["connection refused", "econnrefused"], ErrorType::ConnectionRefused),
    (
        &["connection reset", "econnreset", "broken pipe"],
        ErrorType::ConnectionReset,
    ),
    (
        &["dns", "name resolution", "failed to lookup", "enotfound", "no such host"],
        ErrorType::DnsFailure,
    ),
    (&["invalid param", "invalid argument"], ErrorType::InvalidParams),
    (&["method not found", "unknown method"], ErrorType::MethodNotFound),
    (&["not found", "404", "no such"], ErrorType::NotFound),
    (&["cancelled", "canceled", "aborted"], ErrorType::Cancelled),
    (&["parse", "malformed", "invalid json"], ErrorType::ParseError),
    (
        &[
            "service unavailable",
            "bad gateway",
            "internal server error",
            "503",
            "502",
            "500",
        ],
        ErrorType::ServiceUnavailable,
    ),
    (&["internal error"], ErrorType::InternalError),
    (
        &["connection closed", "connection lost", "disconnected", "eof"],
        ErrorType::ConnectionLost,
    ),
];

fn type_for_message(message: &str) -> Option<ErrorType> {
    let lower = message.to_ascii_lowercase();
    MESSAGE_PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| matches_needle(&lower, n)))
        .map(|(_, ty)| *ty)
}

/// Status-code needles only match as standalone numbers, never inside a
/// port, address or path.
fn matches_needle(haystack: &str, needle: &str) -> bool {
    if !needle.bytes().all(|b| b.is_ascii_digit()) {
        return haystack.contains(needle);
    }
    let bytes = haystack.as_bytes();
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = start.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(end).copied();
        let attached = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b':' | b'.' | b'/' | b'-');
        !before.is_some_and(attached) && !after.is_some_and(attached)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::error::{ErrorCategory, Severity};
    use std::time::Duration;

    fn ctx() -> ErrorContext {
        ErrorContext::new("test", "op")
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (401, ErrorType::Unauthorized, ErrorCategory::Authentication),
            (403, ErrorType::Forbidden, ErrorCategory::Authentication),
            (404, ErrorType::NotFound, ErrorCategory::ResourceAccess),
            (429, ErrorType::RateLimited, ErrorCategory::RateLimiting),
            (400, ErrorType::ProtocolMismatch, ErrorCategory::Protocol),
            (503, ErrorType::ServiceUnavailable, ErrorCategory::Connection),
            (500, ErrorType::ServiceUnavailable, ErrorCategory::Connection),
            (501, ErrorType::ServiceUnavailable, ErrorCategory::Connection),
            (599, ErrorType::ServiceUnavailable, ErrorCategory::Connection),
        ];
        for (status, ty, category) in cases {
            let err = TransportError::Http {
                status,
                message: "x".to_string(),
            };
            let classified = classify(&err, ctx());
            assert_eq!(classified.error_type(), ty, "status {status}");
            assert_eq!(classified.category(), category, "status {status}");
            assert_eq!(classified.status(), Some(status));
        }
    }

    #[test]
    fn test_server_errors_are_transient_but_rpc_internal_is_system() {
        let http_500 = classify(
            &TransportError::Http {
                status: 500,
                message: "boom".to_string(),
            },
            ctx(),
        );
        assert_eq!(http_500.category(), ErrorCategory::Connection);
        assert!(http_500.is_retryable());

        let rpc = classify(&JsonRpcError::internal_error("boom"), ctx());
        assert_eq!(rpc.error_type(), ErrorType::InternalError);
        assert_eq!(rpc.category(), ErrorCategory::System);
    }

    #[test]
    fn test_rpc_codes() {
        let not_found = classify(&JsonRpcError::method_not_found("tools/x"), ctx());
        assert_eq!(not_found.error_type(), ErrorType::MethodNotFound);
        assert_eq!(not_found.category(), ErrorCategory::Validation);
        assert_eq!(not_found.code(), Some(codes::METHOD_NOT_FOUND));

        let params = classify(&McpError::from_rpc(JsonRpcError::invalid_params("bad")), ctx());
        assert_eq!(params.error_type(), ErrorType::InvalidParams);

        let parse = classify(&McpError::parse("bad json"), ctx());
        assert_eq!(parse.error_type(), ErrorType::ParseError);
        assert_eq!(parse.severity(), Severity::Low);

        let resource = classify(&JsonRpcError::new(codes::RESOURCE_NOT_FOUND, "gone"), ctx());
        assert_eq!(resource.error_type(), ErrorType::NotFound);
    }

    #[test]
    fn test_io_kinds() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(classify(&refused, ctx()).error_type(), ErrorType::ConnectionRefused);

        let reset: McpError =
            TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        let classified = classify(&reset, ctx());
        assert_eq!(classified.error_type(), ErrorType::ConnectionReset);
        assert_eq!(classified.severity(), Severity::High);
    }

    #[test]
    fn test_message_patterns() {
        let tls = TransportError::connection("invalid peer certificate: UnknownIssuer");
        let classified = classify(&tls, ctx());
        assert_eq!(classified.error_type(), ErrorType::Certificate);
        assert_eq!(classified.category(), ErrorCategory::Security);
        assert!(!classified.is_retryable());

        let dns = TransportError::connection("failed to lookup address information");
        assert_eq!(classify(&dns, ctx()).error_type(), ErrorType::DnsFailure);

        let plain = TransportError::connection("something odd");
        assert_eq!(classify(&plain, ctx()).error_type(), ErrorType::ConnectionRefused);

        let status_text = TransportError::protocol("server answered 401 for the request");
        assert_eq!(classify(&status_text, ctx()).error_type(), ErrorType::Unauthorized);

        // A port that happens to contain a status code is not a status.
        let port = TransportError::connection("error sending request for url (http://127.0.0.1:54013/mcp)");
        assert_eq!(classify(&port, ctx()).error_type(), ErrorType::ConnectionRefused);

        let unknown = classify(&McpError::Rpc(Box::new(JsonRpcError::new(-31000, "odd"))), ctx());
        assert_eq!(unknown.error_type(), ErrorType::Unknown);
    }

    #[test]
    fn test_known_variants_and_wrappers() {
        let timeout = McpError::timeout("tools/call", Duration::from_secs(1)).wrap("calling");
        let classified = classify(&timeout, ctx());
        assert_eq!(classified.error_type(), ErrorType::Timeout);
        assert!(classified.is_retryable());

        let cancelled = classify(&McpError::cancelled("x"), ctx());
        assert_eq!(cancelled.error_type(), ErrorType::Cancelled);

        let target = classify(
            &McpError::from(TransportError::invalid_target("ws://10.0.0.1", "private")),
            ctx(),
        );
        assert_eq!(target.error_type(), ErrorType::InvalidTarget);
        assert_eq!(target.severity(), Severity::Critical);
    }

    #[test]
    fn test_context_is_kept() {
        let context = ErrorContext::new("client", "tools/call").with_tool("search");
        let classified = classify(&McpError::internal("boom"), context.clone());
        assert_eq!(classified.context(), &context);
    }
}
