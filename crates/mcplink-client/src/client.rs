//! MCP client implementation.
//!
//! The [`Client`] struct provides a high-level API for interacting with
//! MCP servers. It handles:
//!
//! - Protocol initialization and version negotiation
//! - Request/response correlation with per-request timeouts
//! - Tool, resource, and prompt operations with catalog caching
//! - Retries driven by the transport's recovery engine
//! - Server-initiated request handling via [`ClientHandler`]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_lock::RwLock;
use chrono::{DateTime, Utc};
use mcplink_core::capability::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResult, ServerCapabilities,
    ServerInfo, accept_server_version,
};
use mcplink_core::codec::MessageCodec;
use mcplink_core::error::{
    ClassifiedError, ErrorCategory, ErrorContext, ErrorType, JsonRpcError, McpError, McpResultExt,
    codes,
};
use mcplink_core::protocol::{ListChanged, Message, Notification, Request, Response, methods};
use mcplink_core::types::{
    CallToolRequest, CallToolResult, GetPromptRequest, GetPromptResult, ListPromptsResult,
    ListResourcesResult, ListToolsResult, Prompt, ReadResourceRequest, ReadResourceResult,
    Resource, Tool,
};
use mcplink_transport::events::{ConnectionState, EventKind, EventSubscription};
use mcplink_transport::recovery::{
    CircuitState, ReconnectionState, RecoveryAction, RecoveryEngine, RecoveryStats,
};
use mcplink_transport::{Transport, TransportExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheStats, ResultCache};
use crate::config::ClientConfig;
use crate::correlation::PendingRequests;
use crate::handler::{ClientHandler, NoOpHandler};
use crate::offline::{OfflineStore, OfflineSubmission};

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pages fetched before a listing is considered runaway.
const MAX_PAGES: usize = 1000;

/// Outcome of [`Client::submit_or_defer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Sent; carries the server's result.
    Sent(Value),
    /// Handed to the offline store.
    Deferred {
        /// Submissions waiting in the store afterwards.
        pending: usize,
    },
}

/// Counters and nested statistics, see [`Client::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    /// Requests written to the transport.
    pub requests_sent: u64,
    /// Responses received, matched or not.
    pub responses_received: u64,
    /// Notifications received from the server.
    pub notifications_received: u64,
    /// Requests the server sent to the client.
    pub server_requests: u64,
    /// Failures surfaced to callers.
    pub errors: u64,
    /// Retries performed.
    pub retries: u64,
    /// Requests that timed out.
    pub timeouts: u64,
    /// Submissions deferred to the offline store.
    pub deferred: u64,
    /// Requests awaiting a response.
    pub pending_requests: usize,
    /// Result cache counters.
    pub cache: CacheStats,
    /// Last latency measured by the transport.
    pub latency: Option<Duration>,
    /// The recovery engine's view.
    pub recovery: RecoveryStats,
}

/// Connection summary, see [`Client::get_status`].
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Transport state.
    pub state: ConnectionState,
    /// Whether `initialize` completed on the current connection.
    pub initialized: bool,
    /// Server identity, once initialized.
    pub server_info: Option<ServerInfo>,
    /// Negotiated protocol version, once initialized.
    pub protocol_version: Option<String>,
    /// When `initialize` completed.
    pub initialized_at: Option<DateTime<Utc>>,
    /// Breaker guarding connection attempts.
    pub transport_circuit: CircuitState,
    /// Breaker guarding requests.
    pub client_circuit: CircuitState,
    /// Requests awaiting a response.
    pub pending_requests: usize,
    /// Submissions waiting in the offline store.
    pub offline_pending: Option<usize>,
}

/// Result of [`Client::perform_diagnostics`].
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Transport state.
    pub state: ConnectionState,
    /// Round trip of a `ping` issued for the diagnosis.
    pub ping: Option<Duration>,
    /// Why the ping did not complete.
    pub ping_error: Option<String>,
    /// Last latency measured by the transport itself.
    pub latency: Option<Duration>,
    /// Breaker guarding connection attempts.
    pub transport_circuit: CircuitState,
    /// Breaker guarding requests.
    pub client_circuit: CircuitState,
    /// Connection attempt bookkeeping.
    pub reconnection: Option<ReconnectionState>,
    /// Requests awaiting a response.
    pub pending_requests: usize,
    /// Age of the longest waiting request.
    pub oldest_pending: Option<Duration>,
    /// Connected, answering pings, and neither breaker open.
    pub healthy: bool,
}

#[derive(Debug, Clone)]
struct Session {
    result: InitializeResult,
    client_info: ClientInfo,
    initialized_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Catalogs {
    tools: Option<Vec<Tool>>,
    resources: Option<Vec<Resource>>,
    prompts: Option<Vec<Prompt>>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    responses: AtomicU64,
    notifications: AtomicU64,
    server_requests: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    deferred: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn require(supported: bool, capability: &str) -> Result<(), McpError> {
    if supported {
        Ok(())
    } else {
        Err(McpError::capability_not_supported(capability))
    }
}

struct Inner<T, H> {
    transport: T,
    handler: H,
    recovery: Arc<RecoveryEngine>,
    component: String,
    codec: MessageCodec,
    pending: PendingRequests,
    config: RwLock<ClientConfig>,
    cache: RwLock<ResultCache>,
    session: RwLock<Option<Session>>,
    catalogs: RwLock<Catalogs>,
    offline: Option<Arc<dyn OfflineStore>>,
    counters: Counters,
    router: StdMutex<Option<JoinHandle<()>>>,
}

/// An MCP client talking to one server over one transport.
///
/// The client must be connected and initialized before tools, resources or
/// prompts can be used; until then those operations fail with
/// [`McpError::NotConnected`].
///
/// # Example
///
/// ```no_run
/// use mcplink_client::ClientBuilder;
/// use mcplink_transport::{WebSocketConfig, WebSocketTransport};
///
/// # async fn example() -> Result<(), mcplink_core::McpError> {
/// let transport = WebSocketTransport::new(WebSocketConfig::new("wss://example.com/mcp"));
/// let client = ClientBuilder::new()
///     .name("my-client")
///     .version("1.0.0")
///     .connect(transport)
///     .await?;
///
/// let tools = client.list_tools().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport, H: ClientHandler = NoOpHandler> {
    inner: Arc<Inner<T, H>>,
}

impl<T: Transport, H: ClientHandler> std::fmt::Debug for Client<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("component", &self.inner.component)
            .field("state", &self.inner.transport.state())
            .field("pending", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> Client<T, NoOpHandler> {
    /// Create a client without a handler. Call [`connect`](Self::connect)
    /// and [`initialize`](Self::initialize) before use.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_handler(transport, config, NoOpHandler, None)
    }
}

impl<T: Transport + 'static, H: ClientHandler + 'static> Client<T, H> {
    pub(crate) fn with_handler(
        transport: T,
        config: ClientConfig,
        handler: H,
        offline: Option<Arc<dyn OfflineStore>>,
    ) -> Self {
        let recovery = transport.recovery();
        let component = format!("client:{}", transport.component());
        let cache = ResultCache::new(
            config.cache_ttl.unwrap_or(Duration::ZERO),
            config.max_cache_entries,
        );
        Self {
            inner: Arc::new(Inner {
                transport,
                handler,
                recovery,
                component,
                codec: MessageCodec::default(),
                pending: PendingRequests::new(),
                config: RwLock::new(config),
                cache: RwLock::new(cache),
                session: RwLock::new(None),
                catalogs: RwLock::new(Catalogs::default()),
                offline,
                counters: Counters::default(),
                router: StdMutex::new(None),
            }),
        }
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Connect the transport and start routing incoming messages.
    ///
    /// # Errors
    ///
    /// Returns the transport's connect error, converted.
    pub async fn connect(&self) -> Result<(), McpError> {
        self.inner.transport.connect().await.map_err(Into::<McpError>::into)?;
        self.start_router();
        debug!(component = %self.inner.component, "client connected");
        Ok(())
    }

    fn start_router(&self) {
        let mut slot = lock(&self.inner.router);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(async move { inner.route().await }));
    }

    fn stop_router(&self) {
        if let Some(handle) = lock(&self.inner.router).take() {
            handle.abort();
        }
    }

    /// Perform the `initialize` handshake.
    ///
    /// Sends `initialize`, checks the protocol version the server selected
    /// and confirms with `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Fails with [`McpError::NotConnected`] if the transport is not
    /// connected, with [`McpError::HandshakeFailed`] if the server selected a
    /// version this client does not speak, or with the request's error.
    pub async fn initialize(
        &self,
        client_info: ClientInfo,
        capabilities: ClientCapabilities,
    ) -> Result<InitializeResult, McpError> {
        let inner = &self.inner;
        if !inner.transport.is_connected() {
            return Err(McpError::not_connected(methods::INITIALIZE));
        }
        self.start_router();

        let request = InitializeRequest::new(client_info.clone(), capabilities);
        let offered = request.protocol_version.clone();
        let context = inner.context(methods::INITIALIZE);
        let value = inner
            .call(methods::INITIALIZE, Some(serde_json::to_value(&request)?), context.clone())
            .await?;
        let result: InitializeResult = serde_json::from_value(value)
            .map_err(McpError::from)
            .context("decoding initialize result")?;

        if let Err(err) = accept_server_version(&offered, &result.protocol_version) {
            inner.recovery.classify(&err, context);
            bump(&inner.counters.errors);
            return Err(err);
        }

        inner
            .transport
            .send(Message::Notification(Notification::new(
                methods::INITIALIZED,
            )))
            .await
            .map_err(Into::<McpError>::into)?;

        *inner.session.write().await = Some(Session {
            result: result.clone(),
            client_info,
            initialized_at: Utc::now(),
        });
        info!(
            component = %inner.component,
            server = %result.server_info.name,
            server_version = %result.server_info.version,
            protocol_version = %result.protocol_version,
            tools_list_changed = result.capabilities.notifies(ListChanged::Tools),
            "initialized MCP session"
        );
        inner.handler.on_connected().await;
        Ok(result)
    }

    /// Drop the connection and fail every pending request.
    ///
    /// The client can be connected and initialized again afterwards.
    ///
    /// # Errors
    ///
    /// Returns the transport's disconnect error, converted.
    pub async fn disconnect(&self) -> Result<(), McpError> {
        self.stop_router();
        let inner = &self.inner;
        let cleared = inner.pending.clear_all("client disconnected");
        let was_initialized = inner.session.write().await.take().is_some();
        *inner.catalogs.write().await = Catalogs::default();
        inner.transport.disconnect().await.map_err(Into::<McpError>::into)?;
        if was_initialized {
            inner.handler.on_disconnected().await;
        }
        info!(component = %inner.component, cleared, "client disconnected");
        Ok(())
    }

    /// Disconnect and destroy the transport. The client cannot be used again.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, converted.
    pub async fn close(&self) -> Result<(), McpError> {
        self.disconnect().await?;
        self.inner.cache.read().await.clear();
        self.inner.transport.close().await.map_err(Into::into)
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// The handler receiving server-initiated traffic.
    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    /// The recovery engine shared with the transport.
    pub fn recovery(&self) -> Arc<RecoveryEngine> {
        Arc::clone(&self.inner.recovery)
    }

    /// Key under which the recovery engine tracks this client's requests.
    pub fn component(&self) -> &str {
        &self.inner.component
    }

    /// Whether `initialize` completed on the current connection.
    pub async fn is_initialized(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    /// The server information, once initialized.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.result.server_info.clone())
    }

    /// The server capabilities, once initialized.
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.result.capabilities.clone())
    }

    /// The client information sent with `initialize`.
    pub async fn client_info(&self) -> Option<ClientInfo> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.client_info.clone())
    }

    /// The negotiated protocol version, once initialized.
    pub async fn protocol_version(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.result.protocol_version.clone())
    }

    /// The server instructions, if provided.
    pub async fn instructions(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.result.instructions.clone())
    }

    /// The current configuration.
    pub async fn config(&self) -> ClientConfig {
        self.inner.config.read().await.clone()
    }

    /// Replace the configuration.
    ///
    /// The result cache is rebuilt with the new TTL and capacity, so cached
    /// results are dropped.
    pub async fn update_config(&self, config: ClientConfig) {
        let cache = ResultCache::new(
            config.cache_ttl.unwrap_or(Duration::ZERO),
            config.max_cache_entries,
        );
        *self.inner.cache.write().await = cache;
        debug!(component = %self.inner.component, ?config, "client configuration updated");
        *self.inner.config.write().await = config;
    }

    // ==========================================================================
    // Tool Operations
    // ==========================================================================

    /// List all available tools, following pagination cursors.
    ///
    /// The result replaces the cached tool catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not initialized, the server does
    /// not support tools, or a request fails.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let caps = self.inner.ready("tools/list").await?;
        require(caps.has_tools(), "tools")?;

        let tools = self
            .inner
            .paginate("tools/list", |page: ListToolsResult| {
                (page.tools, page.next_cursor)
            })
            .await?;
        self.inner.catalogs.write().await.tools = Some(tools.clone());
        Ok(tools)
    }

    /// Whether the cached tool catalog contains `name`.
    ///
    /// Returns `false` until [`list_tools`](Self::list_tools) has run.
    pub async fn has_tool(&self, name: &str) -> bool {
        self.inner
            .catalogs
            .read()
            .await
            .tools
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|t| t.name == name))
    }

    /// Call a tool by name.
    ///
    /// When the tool catalog has been fetched, the name and required
    /// arguments are checked against it first. With caching enabled, an
    /// identical call within the TTL is answered from the cache.
    ///
    /// # Errors
    ///
    /// Returns a [`McpError::Classified`] error with category
    /// [`Validation`](ErrorCategory::Validation) for unknown tools or missing
    /// arguments, and one of type [`ToolFailed`](ErrorType::ToolFailed) when
    /// the tool reports `isError`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let inner = &self.inner;
        let caps = inner.ready("tools/call").await?;
        require(caps.has_tools(), "tools")?;

        let config = inner.config.read().await.clone();
        let context = inner.context("tools/call").with_tool(name);
        if config.validate_tool_calls {
            inner.validate_tool(name, &arguments, &context).await?;
        }

        let params = serde_json::to_value(CallToolRequest {
            name: name.to_string(),
            arguments: (!arguments.is_null()).then_some(arguments),
        })?;
        let key = config
            .caching_enabled()
            .then(|| ResultCache::key("tools/call", &params));
        if let Some(key) = &key {
            if let Some(value) = inner.cache.read().await.get(key) {
                debug!(tool = name, "serving cached tool result");
                return Ok(serde_json::from_value(value)?);
            }
        }

        let value = inner.call("tools/call", Some(params), context.clone()).await?;
        let result: CallToolResult = serde_json::from_value(value.clone())?;
        if result.is_error() {
            let text = result.text_content();
            let message = if text.is_empty() {
                format!("tool '{name}' reported an error")
            } else {
                text
            };
            let classified = ClassifiedError::new(ErrorType::ToolFailed, message, context);
            inner.recovery.record(&classified);
            bump(&inner.counters.errors);
            return Err(McpError::classified(classified));
        }

        if let Some(key) = key {
            inner.cache.read().await.insert(key, value);
        }
        Ok(result)
    }

    // ==========================================================================
    // Resource Operations
    // ==========================================================================

    /// List all available resources, following pagination cursors.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not initialized, the server does
    /// not support resources, or a request fails.
    pub async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        let caps = self.inner.ready("resources/list").await?;
        require(caps.has_resources(), "resources")?;

        let resources = self
            .inner
            .paginate("resources/list", |page: ListResourcesResult| {
                (page.resources, page.next_cursor)
            })
            .await?;
        self.inner.catalogs.write().await.resources = Some(resources.clone());
        Ok(resources)
    }

    /// Whether the cached resource catalog contains `uri`.
    pub async fn has_resource(&self, uri: &str) -> bool {
        self.inner
            .catalogs
            .read()
            .await
            .resources
            .as_ref()
            .is_some_and(|resources| resources.iter().any(|r| r.uri == uri))
    }

    /// Read a resource by URI.
    ///
    /// A resource whose catalog entry declares a size above
    /// [`max_resource_size`](ClientConfig::max_resource_size) is refused
    /// without a request; otherwise the total content size is checked before
    /// anything is returned.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ResourceTooLarge`] when the limit is exceeded, or
    /// the request's error.
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let inner = &self.inner;
        let caps = inner.ready("resources/read").await?;
        require(caps.has_resources(), "resources")?;

        let max = inner.config.read().await.max_resource_size;
        let context = inner.context("resources/read").with_resource(uri);
        let declared = inner
            .catalogs
            .read()
            .await
            .resources
            .as_ref()
            .and_then(|resources| resources.iter().find(|r| r.uri == uri))
            .and_then(|r| r.size);
        if let Some(size) = declared.filter(|size| *size > max) {
            return Err(inner.too_large(uri, size, max, context));
        }

        let params = serde_json::to_value(ReadResourceRequest {
            uri: uri.to_string(),
        })?;
        let value = inner.call("resources/read", Some(params), context.clone()).await?;
        let result: ReadResourceResult = serde_json::from_value(value)?;

        let total = u64::try_from(result.byte_len()).unwrap_or(u64::MAX);
        if total > max {
            return Err(inner.too_large(uri, total, max, context));
        }
        Ok(result)
    }

    /// Subscribe to update notifications for `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support subscriptions or the
    /// request fails.
    pub async fn subscribe_resource(&self, uri: &str) -> Result<(), McpError> {
        self.resource_subscription(methods::RESOURCES_SUBSCRIBE, uri).await
    }

    /// Stop update notifications for `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support subscriptions or the
    /// request fails.
    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<(), McpError> {
        self.resource_subscription(methods::RESOURCES_UNSUBSCRIBE, uri).await
    }

    async fn resource_subscription(&self, method: &str, uri: &str) -> Result<(), McpError> {
        let inner = &self.inner;
        let caps = inner.ready(method).await?;
        require(caps.supports_subscriptions(), "resources.subscribe")?;

        let context = inner.context(method).with_resource(uri);
        inner
            .call(method, Some(json!({ "uri": uri })), context)
            .await?;
        Ok(())
    }

    // ==========================================================================
    // Prompt Operations
    // ==========================================================================

    /// List all available prompts, following pagination cursors.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not initialized, the server does
    /// not support prompts, or a request fails.
    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError> {
        let caps = self.inner.ready("prompts/list").await?;
        require(caps.has_prompts(), "prompts")?;

        let prompts = self
            .inner
            .paginate("prompts/list", |page: ListPromptsResult| {
                (page.prompts, page.next_cursor)
            })
            .await?;
        self.inner.catalogs.write().await.prompts = Some(prompts.clone());
        Ok(prompts)
    }

    /// Whether the cached prompt catalog contains `name`.
    pub async fn has_prompt(&self, name: &str) -> bool {
        self.inner
            .catalogs
            .read()
            .await
            .prompts
            .as_ref()
            .is_some_and(|prompts| prompts.iter().any(|p| p.name == name))
    }

    /// Render a prompt, optionally with arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if prompts are not supported or the request fails.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> Result<GetPromptResult, McpError> {
        let caps = self.inner.ready("prompts/get").await?;
        require(caps.has_prompts(), "prompts")?;

        let params = serde_json::to_value(GetPromptRequest {
            name: name.to_string(),
            arguments,
        })?;
        let value = self
            .inner
            .call("prompts/get", Some(params), self.inner.context("prompts/get"))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    // ==========================================================================
    // Generic Requests
    // ==========================================================================

    /// Send an arbitrary request and return its raw result.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not initialized or the request fails.
    /// Error responses from the server surface as classified errors.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.inner.ready(method).await?;
        self.inner
            .call(method, params, self.inner.context(method))
            .await
    }

    /// Send a notification to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is not connected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = self
            .inner
            .codec
            .create_notification(method.to_string(), params);
        self.inner
            .transport
            .send(Message::Notification(notification))
            .await
            .map_err(Into::into)
    }

    /// Send `method` if the session is up; otherwise hand it to the offline
    /// store.
    ///
    /// A submission that fails with a connection-category error is deferred
    /// as well.
    ///
    /// # Errors
    ///
    /// Fails with [`McpError::NotConnected`] when offline and no store is
    /// configured, with the store's error if it refuses the submission, or
    /// with any non-connection failure of the request.
    pub async fn submit_or_defer(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Submission, McpError> {
        let inner = &self.inner;
        if inner.ready(method).await.is_ok() {
            match inner
                .call(method, params.clone(), inner.context(method))
                .await
            {
                Ok(value) => return Ok(Submission::Sent(value)),
                Err(err) if is_connection_failure(&err) => {
                    warn!(component = %inner.component, method, %err, "deferring submission");
                }
                Err(err) => return Err(err),
            }
        }

        let Some(store) = inner.offline.as_ref() else {
            return Err(McpError::not_connected(method));
        };
        store.register(OfflineSubmission::new(method, params))?;
        bump(&inner.counters.deferred);
        let pending = store.pending_count();
        debug!(component = %inner.component, method, pending, "submission deferred");
        Ok(Submission::Deferred { pending })
    }

    // ==========================================================================
    // Health and Statistics
    // ==========================================================================

    /// Measure a `ping` round trip.
    ///
    /// # Errors
    ///
    /// Fails if the transport is not connected or the ping times out.
    pub async fn ping(&self) -> Result<Duration, McpError> {
        if !self.inner.transport.is_connected() {
            return Err(McpError::not_connected(methods::PING));
        }
        self.start_router();
        let started = Instant::now();
        self.inner.send_request(methods::PING, None).await?;
        Ok(started.elapsed())
    }

    /// Subscribe to all transport events.
    pub fn subscribe(&self) -> EventSubscription {
        self.inner.transport.subscribe()
    }

    /// Subscribe to transport events of one kind.
    pub fn subscribe_to(&self, kind: EventKind) -> EventSubscription {
        self.inner.transport.subscribe_to(kind)
    }

    /// Counters plus cache and recovery statistics.
    pub async fn get_stats(&self) -> ClientStats {
        let inner = &self.inner;
        let c = &inner.counters;
        ClientStats {
            requests_sent: c.requests.load(Ordering::Relaxed),
            responses_received: c.responses.load(Ordering::Relaxed),
            notifications_received: c.notifications.load(Ordering::Relaxed),
            server_requests: c.server_requests.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            deferred: c.deferred.load(Ordering::Relaxed),
            pending_requests: inner.pending.len(),
            cache: inner.cache.read().await.stats(),
            latency: inner.transport.latency(),
            recovery: inner.recovery.stats(),
        }
    }

    /// Connection and session summary.
    pub async fn get_status(&self) -> ClientStatus {
        let inner = &self.inner;
        let session = inner.session.read().await.clone();
        ClientStatus {
            state: inner.transport.state(),
            initialized: session.is_some(),
            server_info: session.as_ref().map(|s| s.result.server_info.clone()),
            protocol_version: session.as_ref().map(|s| s.result.protocol_version.clone()),
            initialized_at: session.as_ref().map(|s| s.initialized_at),
            transport_circuit: inner.recovery.circuit_state(inner.transport.component()),
            client_circuit: inner.recovery.circuit_state(&inner.component),
            pending_requests: inner.pending.len(),
            offline_pending: inner.offline.as_ref().map(|store| store.pending_count()),
        }
    }

    /// Ping the server and collect breaker and connection state.
    pub async fn perform_diagnostics(&self) -> Diagnostics {
        let inner = &self.inner;
        let (ping, ping_error) = match self.ping().await {
            Ok(rtt) => (Some(rtt), None),
            Err(err) => (None, Some(err.to_string())),
        };
        let state = inner.transport.state();
        let transport_circuit = inner.recovery.circuit_state(inner.transport.component());
        let client_circuit = inner.recovery.circuit_state(&inner.component);
        let healthy = state == ConnectionState::Connected
            && ping.is_some()
            && transport_circuit != CircuitState::Open
            && client_circuit != CircuitState::Open;

        let diagnostics = Diagnostics {
            state,
            ping,
            ping_error,
            latency: inner.transport.latency(),
            transport_circuit,
            client_circuit,
            reconnection: inner.recovery.reconnection_state(inner.transport.component()),
            pending_requests: inner.pending.len(),
            oldest_pending: inner.pending.oldest(),
            healthy,
        };
        info!(component = %inner.component, healthy, ?ping, %state, "diagnostics complete");
        diagnostics
    }
}

impl<T: Transport, H: ClientHandler> Drop for Client<T, H> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.inner.router).take() {
            handle.abort();
        }
    }
}

fn is_connection_failure(err: &McpError) -> bool {
    match err.root() {
        McpError::NotConnected { .. } | McpError::ConnectionFailed { .. } => true,
        McpError::Classified(c) => c.category() == ErrorCategory::Connection,
        _ => false,
    }
}

impl<T: Transport + 'static, H: ClientHandler + 'static> Inner<T, H> {
    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new(self.component.clone(), operation)
    }

    /// Server capabilities if the session is initialized and the transport
    /// has not finished.
    async fn ready(&self, operation: &str) -> Result<ServerCapabilities, McpError> {
        match self.session.read().await.as_ref() {
            Some(session) if !self.transport.state().is_finished() => {
                Ok(session.result.capabilities.clone())
            }
            _ => Err(McpError::not_connected(operation)),
        }
    }

    /// Send one request and wait for its response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let timeout = self.config.read().await.request_timeout;
        let request = self
            .codec
            .create_request(method.to_string(), params, None);
        let response = self.pending.register(request.id.clone(), method, timeout)?;

        trace!(id = %request.id, method, "sending request");
        bump(&self.counters.requests);
        self.transport
            .send(Message::Request(request))
            .await
            .map_err(Into::<McpError>::into)?;

        let response = response.await.inspect_err(|err| {
            if err.is_timeout() {
                bump(&self.counters.timeouts);
            }
        })?;
        response.into_result().map_err(McpError::from_rpc)
    }

    /// Send a request, retrying per the recovery engine's decision.
    ///
    /// Failures are classified; those the engine surfaces come back as
    /// [`McpError::Classified`]. Cancellations pass through unchanged.
    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        context: ErrorContext,
    ) -> Result<Value, McpError> {
        self.recovery.allows(&self.component)?;
        let config = self.config.read().await.clone();

        let mut attempt = 1;
        loop {
            let err = match self.send_request(method, params.clone()).await {
                Ok(value) => {
                    self.recovery.record_success(&self.component);
                    return Ok(value);
                }
                Err(err) => err,
            };
            if err.is_cancelled() {
                return Err(err);
            }

            let classified = self.recovery.classify(&err, context.clone());
            let circuit = self.recovery.circuit_state(&self.component);
            let strategy = self
                .recovery
                .decide_recovery_strategy(&classified, circuit, attempt);

            if strategy.action == RecoveryAction::Retry && config.may_retry(method, attempt) {
                self.recovery.execute_recovery_strategy(&strategy).await;
                bump(&self.counters.retries);
                attempt += 1;
                continue;
            }

            if !strategy.action.surfaces() {
                debug!(
                    component = %self.component,
                    method,
                    action = ?strategy.action,
                    attempt,
                    "request failed without a retry left"
                );
            }
            bump(&self.counters.errors);
            return Err(McpError::classified(classified));
        }
    }

    async fn paginate<P, I>(
        &self,
        method: &str,
        split: impl Fn(P) -> (Vec<I>, Option<String>),
    ) -> Result<Vec<I>, McpError>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        for _ in 0..MAX_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.call(method, params, self.context(method)).await?;
            let decoded: P = serde_json::from_value(value)
                .map_err(McpError::from)
                .context(format!("decoding {method} page"))?;
            let (mut page, next) = split(decoded);
            items.append(&mut page);

            match next {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(McpError::invalid_request(format!(
                            "{method}: server repeated cursor '{next}'"
                        )));
                    }
                    cursor = Some(next);
                }
                _ => return Ok(items),
            }
        }
        Err(McpError::invalid_request(format!(
            "{method}: more than {MAX_PAGES} pages"
        )))
    }

    async fn validate_tool(
        &self,
        name: &str,
        arguments: &Value,
        context: &ErrorContext,
    ) -> Result<(), McpError> {
        let classified = {
            let catalogs = self.catalogs.read().await;
            let Some(tools) = catalogs.tools.as_ref() else {
                return Ok(());
            };
            match tools.iter().find(|t| t.name == name) {
                None => ClassifiedError::new(
                    ErrorType::MethodNotFound,
                    format!("unknown tool '{name}'"),
                    context.clone(),
                )
                .with_code(codes::METHOD_NOT_FOUND),
                Some(tool) => {
                    let missing = tool.missing_required(Some(arguments));
                    if missing.is_empty() {
                        return Ok(());
                    }
                    ClassifiedError::new(
                        ErrorType::InvalidParams,
                        format!(
                            "tool '{name}' is missing required arguments: {}",
                            missing.join(", ")
                        ),
                        context.clone(),
                    )
                    .with_code(codes::INVALID_PARAMS)
                }
            }
        };
        self.recovery.record(&classified);
        bump(&self.counters.errors);
        Err(McpError::classified(classified))
    }

    fn too_large(&self, uri: &str, size: u64, max: u64, context: ErrorContext) -> McpError {
        let err = McpError::resource_too_large(uri, size, max);
        self.recovery.classify(&err, context);
        bump(&self.counters.errors);
        err
    }

    // ==========================================================================
    // Message Routing
    // ==========================================================================

    async fn route(&self) {
        debug!(component = %self.component, "client router started");
        let mut failures = 0;
        loop {
            match self.transport.recv().await {
                Ok(Some(message)) => {
                    failures = 0;
                    self.dispatch(message).await;
                }
                Ok(None) => break,
                Err(err) => {
                    let err: McpError = err.into();
                    failures += 1;
                    let classified = self.recovery.classify(&err, self.context("recv"));
                    let circuit = self.recovery.circuit_state(&self.component);
                    let strategy = self
                        .recovery
                        .decide_recovery_strategy(&classified, circuit, failures);
                    if strategy.action.surfaces() || self.transport.state().is_finished() {
                        warn!(component = %self.component, %err, "router stopping on receive error");
                        break;
                    }
                    self.recovery.execute_recovery_strategy(&strategy).await;
                }
            }
        }

        let cleared = self.pending.clear_all("connection closed");
        let was_initialized = self.session.write().await.take().is_some();
        *self.catalogs.write().await = Catalogs::default();
        info!(component = %self.component, cleared, "connection to server ended");
        if was_initialized {
            self.handler.on_disconnected().await;
        }
    }

    async fn dispatch(&self, message: Message) {
        match message {
            Message::Response(response) => {
                bump(&self.counters.responses);
                let id = response.id.clone();
                if !self.pending.resolve(response) {
                    warn!(component = %self.component, %id, "response for unknown or expired request");
                }
            }
            Message::Request(request) => self.answer(request).await,
            Message::Notification(notification) => self.notified(notification).await,
        }
    }

    async fn answer(&self, request: Request) {
        bump(&self.counters.server_requests);
        trace!(method = %request.method, id = %request.id, "handling server request");

        let outcome = match request.method() {
            methods::PING => Ok(json!({})),
            methods::ROOTS_LIST => match self.handler.list_roots().await {
                Ok(roots) => serde_json::to_value(roots)
                    .map(|roots| json!({ "roots": roots }))
                    .map_err(McpError::from),
                Err(err) => Err(err),
            },
            method => {
                self.handler
                    .handle_request(method, request.params.clone())
                    .await
            }
        };
        let response = match outcome {
            Ok(value) => Response::success(request.id, value),
            Err(err) => {
                debug!(method = %request.method, %err, "server request failed");
                Response::error(request.id, JsonRpcError::from(&err))
            }
        };

        if let Err(err) = self.transport.send(Message::Response(response)).await {
            warn!(component = %self.component, %err, "failed to answer server request");
        }
    }

    async fn notified(&self, notification: Notification) {
        bump(&self.counters.notifications);
        trace!(method = %notification.method, "received server notification");

        if let Some(list) = notification.list_changed() {
            let mut catalogs = self.catalogs.write().await;
            match list {
                ListChanged::Tools => {
                    catalogs.tools = None;
                    drop(catalogs);
                    self.cache.read().await.clear();
                    self.handler.on_tools_list_changed().await;
                }
                ListChanged::Resources => {
                    catalogs.resources = None;
                    drop(catalogs);
                    self.handler.on_resources_list_changed().await;
                }
                ListChanged::Prompts => {
                    catalogs.prompts = None;
                    drop(catalogs);
                    self.handler.on_prompts_list_changed().await;
                }
            }
            return;
        }

        match notification.method() {
            methods::RESOURCE_UPDATED => {
                if let Some(uri) = notification.param_str("uri") {
                    self.handler.on_resource_updated(uri.to_string()).await;
                }
            }
            methods::PROGRESS => {
                self.handler
                    .on_progress(notification.params.unwrap_or(Value::Null))
                    .await;
            }
            methods::LOG_MESSAGE => {
                self.handler
                    .on_log_message(notification.params.unwrap_or(Value::Null))
                    .await;
            }
            methods::CANCELLED => {
                debug!(params = ?notification.params, "server cancelled a request");
            }
            other => trace!(method = other, "unhandled notification"),
        }
    }
}
