//! Tracing bootstrap for applications embedding mcplink.
//!
//! Every mcplink crate logs through `tracing` with structured fields. This
//! module installs a `tracing-subscriber` registry that honours `RUST_LOG`
//! and falls back to [`DEFAULT_DIRECTIVE`].
//!
//! ```no_run
//! use mcplink::logging::{LogFormat, LoggingConfig, init_tracing};
//!
//! init_tracing(&LoggingConfig::default().with_format(LogFormat::Json))
//!     .expect("tracing already initialised");
//! ```

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "mcplink=info";

/// Environment variable selecting [`LogFormat`] in [`LoggingConfig::from_env`].
pub const FORMAT_ENV: &str = "MCPLINK_LOG_FORMAT";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directive used when `RUST_LOG` is absent.
    pub default_directive: String,
    /// Output format.
    pub format: LogFormat,
    /// Include span targets in output.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: DEFAULT_DIRECTIVE.to_string(),
            format: LogFormat::Pretty,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Read the format from `MCPLINK_LOG_FORMAT` (`json` or anything else).
    #[must_use]
    pub fn from_env() -> Self {
        let format = match std::env::var(FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self::default().with_format(format)
    }

    /// Set the fallback directive.
    #[must_use]
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Show or hide targets.
    #[must_use]
    pub const fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// The filter this configuration resolves to.
    ///
    /// # Errors
    ///
    /// Fails if `RUST_LOG` is unset and the fallback directive is invalid.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(&self.default_directive)?),
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The fallback directive does not parse.
    #[error("invalid log directive: {0}")]
    Directive(#[from] ParseError),
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the directive is invalid or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let json = config.format == LogFormat::Json;
    let json_layer = json.then(|| fmt::layer().json().with_target(config.with_target));
    let text_layer = (!json).then(|| fmt::layer().with_target(config.with_target));

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;
    tracing::debug!(format = ?config.format, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_directive, "mcplink=info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::default()
            .with_default_directive("mcplink_client=debug")
            .with_format(LogFormat::Json)
            .with_target(false);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.with_target);
        assert!(config.filter().is_ok());
    }

    #[test]
    fn test_second_install_fails() {
        let config = LoggingConfig::default();
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Another test binary may have installed one first; either way the
        // second call cannot succeed.
        let _ = first;
        assert!(matches!(second, Err(LoggingError::AlreadyInstalled(_))));
    }
}
