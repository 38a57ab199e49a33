//! Client handler trait for server-initiated traffic.
//!
//! MCP servers can send requests and notifications to the client:
//!
//! - **Roots**: the server asks which file system roots the client exposes
//! - **Change notifications**: the tool, resource or prompt list changed
//! - **Progress and log messages** for long-running operations
//!
//! `ping` requests are answered by the client itself and never reach the
//! handler.

use std::future::Future;

use mcplink_core::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handler trait for server-initiated requests and notifications.
///
/// Every method has a default, so implementors only override what they
/// care about. Requests the handler does not support are answered with a
/// method-not-found error.
///
/// # Example
///
/// ```rust
/// use mcplink_client::ClientHandler;
///
/// struct Refresher;
///
/// impl ClientHandler for Refresher {
///     async fn on_tools_list_changed(&self) {
///         println!("tool list changed");
///     }
/// }
/// ```
pub trait ClientHandler: Send + Sync {
    /// List roots that the client exposes.
    ///
    /// # Errors
    ///
    /// Returns an error if roots are not supported.
    fn list_roots(&self) -> impl Future<Output = Result<Vec<Root>, McpError>> + Send {
        async { Err(McpError::capability_not_supported("roots")) }
    }

    /// Handle any other server request.
    ///
    /// # Errors
    ///
    /// The default rejects every method with [`McpError::MethodNotFound`].
    fn handle_request(
        &self,
        method: &str,
        _params: Option<Value>,
    ) -> impl Future<Output = Result<Value, McpError>> + Send {
        let err = McpError::method_not_found(method);
        async move { Err(err) }
    }

    /// Called after a successful `initialize`.
    fn on_connected(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when the connection ends, whichever side ended it.
    fn on_disconnected(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called for `notifications/progress`.
    fn on_progress(&self, _params: Value) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called for `notifications/message`.
    fn on_log_message(&self, _params: Value) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when a subscribed resource has been updated.
    fn on_resource_updated(&self, _uri: String) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when the list of available resources has changed.
    ///
    /// The client has already dropped its cached resource catalog.
    fn on_resources_list_changed(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when the list of available tools has changed.
    ///
    /// The client has already dropped its cached tool catalog and results.
    fn on_tools_list_changed(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when the list of available prompts has changed.
    fn on_prompts_list_changed(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// A root directory that the client exposes to servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// URI of the root (e.g., `file:///home/user/project`).
    pub uri: String,
    /// Human-readable name for the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    /// Create a new root.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    /// Set the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A handler that rejects all server requests and ignores notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHandler;

impl ClientHandler for NoOpHandler {}

/// A handler that answers `roots/list` from a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticRoots {
    roots: Vec<Root>,
}

impl StaticRoots {
    /// Expose `roots`.
    #[must_use]
    pub const fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}

impl ClientHandler for StaticRoots {
    async fn list_roots(&self) -> Result<Vec<Root>, McpError> {
        Ok(self.roots.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_builder() {
        let root = Root::new("file:///home/user/project").name("My Project");
        assert!(root.uri.contains("project"));
        assert_eq!(root.name, Some("My Project".to_string()));
        let json = serde_json::to_value(Root::new("file:///tmp")).unwrap();
        assert!(json.get("name").is_none());
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler;
        assert!(handler.list_roots().await.is_err());
        let err = handler
            .handle_request("sampling/createMessage", None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::MethodNotFound { .. }));
    }

    #[tokio::test]
    async fn test_static_roots() {
        let handler = StaticRoots::new(vec![Root::new("file:///work")]);
        let roots = handler.list_roots().await.unwrap();
        assert_eq!(roots.len(), 1);
    }
}
