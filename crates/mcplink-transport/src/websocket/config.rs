//! WebSocket transport configuration types.

use std::time::Duration;

use mcplink_core::codec::DEFAULT_MAX_MESSAGE_SIZE;

use crate::backoff::Backoff;
use crate::rate_limit::RateLimitConfig;
use crate::recovery::{CircuitBreakerConfig, RecoveryConfig};

/// Configuration for WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Ping interval for health monitoring.
    pub ping_interval: Duration,
    /// Consecutive unanswered pings that force the connection closed.
    pub max_missed_pongs: u32,
    /// Maximum message size in bytes, in both directions.
    pub max_message_size: usize,
    /// Whether to reconnect after an unexpected closure.
    pub auto_reconnect: bool,
    /// Failed connection attempts after which the transport gives up.
    pub max_reconnect_attempts: u32,
    /// Whether `send()` queues messages while disconnected.
    pub queue_enabled: bool,
    /// Maximum number of queued messages.
    pub max_queue_size: usize,
    /// Breaker thresholds and the shared backoff policy.
    pub recovery: RecoveryConfig,
    /// Connection attempt rate limit.
    pub rate_limit: RateLimitConfig,
    /// Accept loopback and private-network targets.
    pub allow_local_targets: bool,
    /// WebSocket subprotocols to request.
    pub subprotocols: Vec<String>,
    /// Custom headers for the WebSocket handshake.
    pub headers: Vec<(String, String)>,
}

impl WebSocketConfig {
    /// Create a new WebSocket configuration.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(30),
            max_missed_pongs: 3,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            auto_reconnect: true,
            max_reconnect_attempts: 10,
            queue_enabled: true,
            max_queue_size: 100,
            recovery: RecoveryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            allow_local_targets: false,
            subprotocols: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the ping interval.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set how many unanswered pings are tolerated.
    #[must_use]
    pub const fn with_max_missed_pongs(mut self, missed: u32) -> Self {
        self.max_missed_pongs = missed;
        self
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Disable automatic reconnection.
    #[must_use]
    pub const fn without_auto_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    /// Set maximum connection attempts.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the reconnection backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.recovery.backoff = backoff;
        self
    }

    /// Set the circuit breaker thresholds.
    #[must_use]
    pub const fn with_circuit_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.recovery.breaker = breaker;
        self
    }

    /// Set the connection attempt rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Disable the outbound queue; `send()` fails fast while disconnected.
    #[must_use]
    pub const fn without_queue(mut self) -> Self {
        self.queue_enabled = false;
        self
    }

    /// Set the outbound queue capacity.
    #[must_use]
    pub const fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Accept loopback and private-network targets.
    #[must_use]
    pub const fn allow_local_targets(mut self) -> Self {
        self.allow_local_targets = true;
        self
    }

    /// Add a WebSocket subprotocol.
    #[must_use]
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Add a custom header for the WebSocket handshake.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticate the handshake with a bearer token.
    #[must_use]
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::new("ws://localhost:8080/mcp")
    }
}
