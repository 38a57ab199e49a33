//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default upper bound on the content returned by `resources/read` (10 MiB).
pub const DEFAULT_MAX_RESOURCE_SIZE: u64 = 10 * 1024 * 1024;

/// Behaviour of a [`Client`](crate::Client).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use mcplink_client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_request_timeout(Duration::from_secs(10))
///     .with_cache_ttl(Duration::from_secs(60))
///     .with_max_retries(2);
/// assert!(config.caching_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long a request waits for its response.
    pub request_timeout: Duration,
    /// Retries for failures the recovery engine marks as retryable.
    pub max_retries: u32,
    /// Whether `tools/call` is retried too. Off by default because tools may
    /// have side effects.
    pub retry_tool_calls: bool,
    /// How long tool results are cached. `None` disables caching.
    pub cache_ttl: Option<Duration>,
    /// Maximum number of cached results.
    pub max_cache_entries: usize,
    /// Largest resource content `read_resource` returns, in bytes.
    pub max_resource_size: u64,
    /// Check tool names and required arguments against the tool catalog
    /// before calling, when the catalog has been fetched.
    pub validate_tool_calls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: 3,
            retry_tool_calls: false,
            cache_ttl: None,
            max_cache_entries: 256,
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
            validate_tool_calls: true,
        }
    }
}

impl ClientConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Allow `tools/call` to be retried.
    #[must_use]
    pub const fn with_tool_call_retries(mut self, enabled: bool) -> Self {
        self.retry_tool_calls = enabled;
        self
    }

    /// Cache tool results for `ttl`.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Disable result caching.
    #[must_use]
    pub const fn without_cache(mut self) -> Self {
        self.cache_ttl = None;
        self
    }

    /// Set the cache capacity.
    #[must_use]
    pub const fn with_max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }

    /// Set the resource size limit.
    #[must_use]
    pub const fn with_max_resource_size(mut self, bytes: u64) -> Self {
        self.max_resource_size = bytes;
        self
    }

    /// Turn catalog validation of tool calls on or off.
    #[must_use]
    pub const fn with_tool_validation(mut self, enabled: bool) -> Self {
        self.validate_tool_calls = enabled;
        self
    }

    /// Whether tool results are cached.
    #[must_use]
    pub const fn caching_enabled(&self) -> bool {
        matches!(self.cache_ttl, Some(ttl) if !ttl.is_zero())
    }

    /// Whether a failed `method` may be retried under this configuration.
    #[must_use]
    pub fn may_retry(&self, method: &str, attempt: u32) -> bool {
        attempt <= self.max_retries && (self.retry_tool_calls || method != "tools/call")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.caching_enabled());
        assert!(config.validate_tool_calls);
        assert!(config.may_retry("tools/list", 1));
        assert!(!config.may_retry("tools/call", 1));
        assert!(!config.may_retry("tools/list", 4));
    }

    #[test]
    fn test_zero_ttl_is_not_caching() {
        let config = ClientConfig::default().with_cache_ttl(Duration::ZERO);
        assert!(!config.caching_enabled());
        assert!(ClientConfig::default()
            .with_cache_ttl(Duration::from_secs(1))
            .caching_enabled());
    }

    #[test]
    fn test_tool_call_retries_opt_in() {
        let config = ClientConfig::default()
            .with_tool_call_retries(true)
            .with_max_retries(1);
        assert!(config.may_retry("tools/call", 1));
        assert!(!config.may_retry("tools/call", 2));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = ClientConfig::default().with_cache_ttl(Duration::from_secs(5));
        let json = serde_json::to_string(&config).unwrap();
        let back: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
