//! Context wrapping for `Result<T, McpError>`.

use super::types::McpError;

/// Adds a context message to the error side of a `Result`.
///
/// The original error stays reachable through [`McpError::root`], so
/// classification is unaffected by wrapping.
///
/// ```rust
/// use mcplink_core::error::{McpError, McpResultExt};
///
/// let result: Result<(), McpError> = Err(McpError::internal("oops"));
/// let err = result.context("decoding tools/list").unwrap_err();
/// assert!(err.to_string().starts_with("decoding tools/list"));
/// assert!(matches!(err.root(), McpError::Internal { .. }));
/// ```
pub trait McpResultExt<T> {
    /// Wrap the error with `context`.
    fn context(self, context: impl Into<String>) -> Result<T, McpError>;
}

impl<T> McpResultExt<T> for Result<T, McpError> {
    fn context(self, context: impl Into<String>) -> Self {
        self.map_err(|e| e.wrap(context))
    }
}
