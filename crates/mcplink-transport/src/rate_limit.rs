//! Connection-attempt rate limiting.
//!
//! Each transport instance owns one [`ConnectionRateLimiter`]. Every connect
//! attempt, including automatic reconnections, consumes a slot in a sliding
//! window; attempts beyond the limit fail with
//! [`TransportError::RateLimited`] without touching the network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_lock::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Configuration for connection-attempt rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum attempts allowed inside one window.
    pub max_attempts: u32,
    /// Length of the sliding window.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new configuration.
    #[must_use]
    pub const fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

/// Sliding-window limiter for connection attempts.
#[derive(Debug, Clone)]
pub struct ConnectionRateLimiter {
    config: RateLimitConfig,
    attempts: Arc<Mutex<VecDeque<Instant>>>,
    total: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl ConnectionRateLimiter {
    /// Create a limiter.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: Arc::new(Mutex::new(VecDeque::with_capacity(
                config.max_attempts as usize,
            ))),
            total: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record an attempt, or reject it if the window is full.
    pub async fn check(&self) -> Result<(), TransportError> {
        self.total.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;

        while let Some(&oldest) = attempts.front() {
            if now.duration_since(oldest) >= self.config.window {
                attempts.pop_front();
            } else {
                break;
            }
        }

        if attempts.len() < self.config.max_attempts as usize {
            attempts.push_back(now);
            return Ok(());
        }

        self.rejected.fetch_add(1, Ordering::Relaxed);
        let retry_after = attempts
            .front()
            .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)));
        tracing::warn!(
            max_attempts = self.config.max_attempts,
            window = ?self.config.window,
            "connection attempt rate limit exceeded"
        );
        Err(TransportError::RateLimited { retry_after })
    }

    /// Attempts checked and attempts rejected so far.
    #[must_use]
    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            total_attempts: self.total.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Forget all recorded attempts.
    pub async fn reset(&self) {
        self.attempts.lock().await.clear();
        self.total.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

/// Rate limiting statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    /// Attempts checked.
    pub total_attempts: u64,
    /// Attempts rejected.
    pub total_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = ConnectionRateLimiter::new(RateLimitConfig::new(3, Duration::from_secs(60)));
        for _ in 0..3 {
            assert!(limiter.check().await.is_ok());
        }
        let err = limiter.check().await.unwrap_err();
        match err {
            TransportError::RateLimited { retry_after } => {
                assert!(retry_after.is_some_and(|d| d <= Duration::from_secs(60)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            limiter.stats(),
            RateLimitStats {
                total_attempts: 4,
                total_rejected: 1
            }
        );
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter =
            ConnectionRateLimiter::new(RateLimitConfig::new(1, Duration::from_millis(30)));
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(limiter.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = ConnectionRateLimiter::new(RateLimitConfig::new(1, Duration::from_secs(60)));
        assert!(limiter.check().await.is_ok());
        limiter.reset().await;
        assert!(limiter.check().await.is_ok());
        assert_eq!(limiter.stats().total_attempts, 1);
    }
}
