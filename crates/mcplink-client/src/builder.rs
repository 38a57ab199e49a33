//! Client builder for fluent construction.
//!
//! The [`ClientBuilder`] collects identity, capabilities and configuration,
//! then either builds an unconnected [`Client`] or connects and initializes
//! one in a single step.

use std::sync::Arc;

use mcplink_core::capability::{ClientCapabilities, ClientInfo};
use mcplink_core::error::McpError;
use mcplink_transport::Transport;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::handler::{ClientHandler, NoOpHandler};
use crate::offline::OfflineStore;

/// Builder for constructing MCP clients.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use mcplink_client::{ClientBuilder, ClientConfig};
/// use mcplink_transport::{WebSocketConfig, WebSocketTransport};
///
/// # async fn example() -> Result<(), mcplink_core::McpError> {
/// let transport = WebSocketTransport::new(WebSocketConfig::new("wss://example.com/mcp"));
/// let client = ClientBuilder::new()
///     .name("my-client")
///     .version("1.0.0")
///     .config(ClientConfig::default().with_request_timeout(Duration::from_secs(10)))
///     .connect(transport)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    name: String,
    version: String,
    capabilities: ClientCapabilities,
    config: ClientConfig,
    offline: Option<Arc<dyn OfflineStore>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .field("offline", &self.offline.is_some())
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new client builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mcplink-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: ClientCapabilities::default(),
            config: ClientConfig::default(),
            offline: None,
        }
    }

    /// Set the client name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the client version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enable roots capability.
    ///
    /// When enabled, the client exposes file system roots to the server.
    /// Pair it with a handler that implements
    /// [`list_roots`](ClientHandler::list_roots).
    #[must_use]
    pub fn with_roots(mut self) -> Self {
        self.capabilities = self.capabilities.with_roots();
        self
    }

    /// Set custom capabilities.
    #[must_use]
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Defer submissions to `store` while the server is unreachable.
    #[must_use]
    pub fn offline_store(mut self, store: Arc<dyn OfflineStore>) -> Self {
        self.offline = Some(store);
        self
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo::new(&self.name, &self.version)
    }

    /// Build an unconnected client.
    ///
    /// Call [`Client::connect`] and [`Client::initialize`] before use.
    pub fn build<T: Transport + 'static>(self, transport: T) -> Client<T> {
        self.build_with_handler(transport, NoOpHandler)
    }

    /// Build an unconnected client with a custom handler.
    pub fn build_with_handler<T: Transport + 'static, H: ClientHandler + 'static>(
        self,
        transport: T,
        handler: H,
    ) -> Client<T, H> {
        Client::with_handler(transport, self.config, handler, self.offline)
    }

    /// Connect the transport and perform the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot connect or the handshake
    /// fails.
    pub async fn connect<T: Transport + 'static>(self, transport: T) -> Result<Client<T>, McpError> {
        self.connect_with_handler(transport, NoOpHandler).await
    }

    /// Connect and initialize a client with a custom handler.
    ///
    /// The handler receives server-initiated requests and notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot connect or the handshake
    /// fails.
    pub async fn connect_with_handler<T: Transport + 'static, H: ClientHandler + 'static>(
        self,
        transport: T,
        handler: H,
    ) -> Result<Client<T, H>, McpError> {
        let client_info = self.client_info();
        let capabilities = self.capabilities.clone();
        let client = self.build_with_handler(transport, handler);
        client.connect().await?;
        client.initialize(client_info, capabilities).await?;
        Ok(client)
    }
}
