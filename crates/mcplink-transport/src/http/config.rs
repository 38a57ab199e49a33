//! HTTP transport configuration types and constants.

use std::time::Duration;

use mcplink_core::capability::PROTOCOL_VERSION;
use mcplink_core::codec::DEFAULT_MAX_MESSAGE_SIZE;

use crate::rate_limit::RateLimitConfig;
use crate::recovery::RecoveryConfig;

/// Header name for MCP protocol version.
///
/// Note: HTTP/2 requires lowercase header names. HTTP/1.1 headers are
/// case-insensitive, so lowercase works universally.
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Header name for MCP session ID.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Content type of an SSE response.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// URL of the MCP endpoint.
    pub url: String,
    /// Optional session ID for resuming sessions.
    pub session_id: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, covering the whole POST round trip.
    pub request_timeout: Duration,
    /// Custom headers to include in requests.
    pub headers: Vec<(String, String)>,
    /// Protocol version sent in the version header.
    pub protocol_version: String,
    /// Maximum message size in bytes, in both directions.
    pub max_message_size: usize,
    /// Breaker thresholds and the shared backoff policy.
    pub recovery: RecoveryConfig,
    /// Connection attempt rate limit.
    pub rate_limit: RateLimitConfig,
    /// Accept loopback and private-network targets.
    pub allow_local_targets: bool,
}

impl HttpTransportConfig {
    /// Create a new HTTP transport configuration.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            headers: Vec::new(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            recovery: RecoveryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            allow_local_targets: false,
        }
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the session ID for resuming a session.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a custom header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticate every request with a bearer token.
    #[must_use]
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }

    /// Set the protocol version.
    #[must_use]
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Set the breaker and backoff configuration.
    #[must_use]
    pub const fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// Set the connection attempt rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Accept loopback and private-network targets.
    #[must_use]
    pub const fn allow_local_targets(mut self) -> Self {
        self.allow_local_targets = true;
        self
    }
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/mcp")
    }
}
