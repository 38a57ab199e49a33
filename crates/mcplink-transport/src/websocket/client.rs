//! WebSocket transport client implementation.
//!
//! A live connection runs three tasks: a reader that decodes frames into the
//! inbound channel, a writer that drains the outbound channel into the socket,
//! and a health task that sends timestamped pings. When the connection drops
//! unexpectedly a supervisor task schedules reconnection attempts with the
//! recovery engine's backoff policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_lock::Mutex;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use mcplink_core::codec::MessageCodec;
use mcplink_core::error::{ErrorContext, ErrorType};
use mcplink_core::protocol::Message;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::events::{ConnectionState, EventBus, StateCell, TransportEvent};
use crate::rate_limit::ConnectionRateLimiter;
use crate::recovery::{self, RecoveryEngine};
use crate::target::{WEBSOCKET_SCHEMES, validate_target};
use crate::traits::{Transport, TransportMetadata};

use super::config::WebSocketConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const NO_LATENCY: u64 = u64::MAX;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Background tasks of one established connection.
struct LiveConnection {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    health: JoinHandle<()>,
}

impl LiveConnection {
    fn abort(self) {
        self.writer.abort();
        self.reader.abort();
        self.health.abort();
    }

    /// Stop reading and pinging; the writer finishes after the close frame.
    fn close_gracefully(self) {
        self.reader.abort();
        self.health.abort();
    }
}

/// Clears the in-progress flag when a connect attempt ends.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counters exposed by [`WebSocketTransport::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebSocketStats {
    /// Messages written to the socket.
    pub messages_sent: u64,
    /// Messages decoded from the socket.
    pub messages_received: u64,
    /// Messages waiting in the outbound queue.
    pub queued: usize,
    /// Successful reconnections.
    pub reconnections: u64,
}

struct Inner {
    config: WebSocketConfig,
    component: String,
    codec: MessageCodec,
    state: StateCell,
    events: EventBus,
    recovery: Arc<RecoveryEngine>,
    limiter: ConnectionRateLimiter,

    connecting: AtomicBool,
    user_disconnected: AtomicBool,
    // Bumped whenever a connection is installed or torn down; tasks of an
    // older connection compare against it and stand down.
    generation: AtomicU64,
    // Held while a connection is activated or torn down.
    live: StdMutex<Option<LiveConnection>>,

    outbound: StdMutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    queue: Mutex<VecDeque<String>>,
    inbound_tx: mpsc::UnboundedSender<Message>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Message>>,

    supervisor: StdMutex<Option<JoinHandle<()>>>,

    outstanding_pings: AtomicU32,
    latency_ms: AtomicU64,
    connected_at: StdMutex<Option<Instant>>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnections: AtomicU64,
}

/// WebSocket transport for MCP communication.
///
/// Provides full-duplex communication with ping/pong health monitoring,
/// automatic reconnection and an outbound queue that bridges short outages.
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.inner.config.url)
            .field("state", &self.inner.state.get())
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Create a new WebSocket transport (not yet connected).
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        let events = EventBus::default();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            component: format!("websocket:{}", config.url),
            codec: MessageCodec::new(config.max_message_size),
            state: StateCell::new(events.clone()),
            events,
            recovery: Arc::new(RecoveryEngine::new(config.recovery)),
            limiter: ConnectionRateLimiter::new(config.rate_limit),
            connecting: AtomicBool::new(false),
            user_disconnected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            outbound: StdMutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            live: StdMutex::new(None),
            supervisor: StdMutex::new(None),
            outstanding_pings: AtomicU32::new(0),
            latency_ms: AtomicU64::new(NO_LATENCY),
            connected_at: StdMutex::new(None),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            reconnections: AtomicU64::new(0),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create a transport and connect it.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection attempt fails.
    pub async fn connect_with(config: WebSocketConfig) -> Result<Self, TransportError> {
        let transport = Self::new(config);
        transport.connect().await?;
        Ok(transport)
    }

    /// Get the WebSocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// The transport configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.inner.config
    }

    /// Transport counters.
    pub async fn stats(&self) -> WebSocketStats {
        WebSocketStats {
            messages_sent: self.inner.messages_sent.load(Ordering::Relaxed),
            messages_received: self.inner.messages_received.load(Ordering::Relaxed),
            queued: self.inner.queue.lock().await.len(),
            reconnections: self.inner.reconnections.load(Ordering::Relaxed),
        }
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_for_state(&self, predicate: impl Fn(ConnectionState) -> bool) -> ConnectionState {
        let mut watch = self.inner.state.watch();
        loop {
            let current = *watch.borrow_and_update();
            if predicate(current) {
                return current;
            }
            if watch.changed().await.is_err() {
                return self.inner.state.get();
            }
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.inner.abort_supervisor();
        self.inner.abort_tasks();
    }
}

impl Inner {
    fn abort_supervisor(&self) {
        if let Some(handle) = lock(&self.supervisor).take() {
            handle.abort();
        }
    }

    fn abort_tasks(&self) {
        if let Some(live) = lock(&self.live).take() {
            live.abort();
        }
    }

    fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::Relaxed) {
            NO_LATENCY => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn build_request(
        &self,
        url: &url::Url,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, TransportError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::invalid_target(url.as_str(), e.to_string()))?;
        let headers = request.headers_mut();
        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::connection(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::connection(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }
        if !self.config.subprotocols.is_empty() {
            let value = HeaderValue::from_str(&self.config.subprotocols.join(", "))
                .map_err(|e| TransportError::connection(format!("invalid subprotocol: {e}")))?;
            headers.insert("Sec-WebSocket-Protocol", value);
        }
        Ok(request)
    }

    /// One connection attempt. The caller holds the in-progress flag.
    async fn attempt(self: &Arc<Self>) -> Result<(), TransportError> {
        self.state.set(ConnectionState::Connecting);

        let url = validate_target(
            &self.config.url,
            WEBSOCKET_SCHEMES,
            self.config.allow_local_targets,
        )?;
        self.limiter.check().await?;
        self.recovery.allows(&self.component)?;

        let request = self.build_request(&url)?;
        let (stream, _response) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(request))
                .await
                .map_err(|_| TransportError::Timeout {
                    operation: "WebSocket connect".to_string(),
                    duration: self.config.connect_timeout,
                })?
                .map_err(map_ws_error)?;

        self.install(stream).await;
        self.recovery.record_connection_attempt(&self.component, true);
        info!(url = %self.config.url, "WebSocket connected");
        Ok(())
    }

    /// Classify a failed attempt and decide whether automatic attempts go on.
    fn attempt_failed(&self, error: &TransportError, failed: u32) -> (ErrorType, bool) {
        self.recovery.record_connection_attempt(&self.component, false);
        let context = ErrorContext::new(self.component.clone(), "connect");
        // An open breaker is the engine's own verdict; feeding it back would
        // keep the breaker open forever.
        let classified = if matches!(error, TransportError::CircuitOpen { .. }) {
            recovery::classify(error, context)
        } else {
            self.recovery.classify(error, context)
        };
        let circuit = self.recovery.circuit_state(&self.component);
        let strategy = self
            .recovery
            .decide_recovery_strategy(&classified, circuit, failed);
        let error_type = classified.error_type();
        self.events
            .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
        warn!(
            url = %self.config.url,
            attempt = failed,
            action = ?strategy.action,
            error = %error,
            "WebSocket connection attempt failed"
        );
        (error_type, !strategy.action.surfaces())
    }

    async fn install(self: &Arc<Self>, stream: WsStream) {
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        self.outstanding_pings.store(0, Ordering::Relaxed);
        *lock(&self.connected_at) = Some(Instant::now());

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let closing = matches!(frame, WsMessage::Close(_));
                if let Err(e) = sink.send(frame).await {
                    debug!(error = %e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let inner = Arc::clone(self);
        let reader = tokio::spawn(async move {
            let error = loop {
                match source.next().await {
                    Some(Ok(WsMessage::Text(text))) => inner.handle_text(&text),
                    Some(Ok(WsMessage::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => inner.handle_text(text),
                        Err(e) => warn!(error = %e, "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(WsMessage::Pong(payload))) => inner.handle_pong(&payload),
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Frame(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "WebSocket close frame received");
                        break TransportError::ConnectionClosed;
                    }
                    Some(Err(e)) => break map_ws_error(e),
                    None => break TransportError::ConnectionClosed,
                }
            };
            inner.connection_lost(generation, error);
        });

        let inner = Arc::clone(self);
        let ping_tx = tx.clone();
        let health = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.ping_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outstanding = inner.outstanding_pings.load(Ordering::Acquire);
                if outstanding >= inner.config.max_missed_pongs {
                    warn!(missed = outstanding, "no pong received, forcing reconnect");
                    inner.connection_lost(
                        generation,
                        TransportError::Timeout {
                            operation: "WebSocket ping".to_string(),
                            duration: inner.config.ping_interval * outstanding,
                        },
                    );
                    return;
                }
                let payload = now_millis().to_be_bytes().to_vec();
                if ping_tx.send(WsMessage::Ping(payload)).is_err() {
                    return;
                }
                inner.outstanding_pings.fetch_add(1, Ordering::AcqRel);
                trace!("ping sent");
            }
        });

        // Flush under the queue lock so that nothing sent concurrently can
        // overtake the queued messages.
        let mut queue = self.queue.lock().await;
        self.activate(
            generation,
            tx,
            LiveConnection {
                writer,
                reader,
                health,
            },
            &mut queue,
        );
    }

    /// Publish a freshly installed connection unless it was already lost.
    fn activate(
        &self,
        generation: u64,
        tx: mpsc::UnboundedSender<WsMessage>,
        connection: LiveConnection,
        queue: &mut VecDeque<String>,
    ) {
        let mut live = lock(&self.live);
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("connection lost during setup");
            connection.abort();
            return;
        }

        let flushed = queue.len();
        for text in queue.drain(..) {
            if tx.send(WsMessage::Text(text)).is_ok() {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
        if flushed > 0 {
            debug!(flushed, "flushed queued messages");
        }
        *lock(&self.outbound) = Some(tx);
        if let Some(previous) = live.replace(connection) {
            previous.abort();
        }
        self.state.set(ConnectionState::Connected);
    }

    fn handle_text(&self, text: &str) {
        match self.codec.deserialize_batch(text) {
            Ok(messages) => {
                for message in messages {
                    self.messages_received.fetch_add(1, Ordering::Relaxed);
                    self.events.emit(TransportEvent::MessageReceived {
                        message: Box::new(message.clone()),
                        received_at: Utc::now(),
                    });
                    let _ = self.inbound_tx.send(message);
                }
            }
            Err(e) => {
                let classified = self
                    .recovery
                    .classify(&e, ErrorContext::new(self.component.clone(), "receive"));
                debug!(error = %e, "dropping undecodable message");
                self.events
                    .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
            }
        }
    }

    fn handle_pong(&self, payload: &[u8]) {
        self.outstanding_pings.store(0, Ordering::Release);
        let Ok(bytes) = <[u8; 8]>::try_from(payload) else {
            trace!("pong without timestamp");
            return;
        };
        let rtt = now_millis().saturating_sub(u64::from_be_bytes(bytes));
        self.latency_ms.store(rtt, Ordering::Relaxed);
        self.events
            .emit(TransportEvent::Latency(Duration::from_millis(rtt)));
    }

    /// Tear down the connection of `generation` after an unexpected loss.
    fn connection_lost(self: &Arc<Self>, generation: u64, error: TransportError) {
        {
            let mut live = lock(&self.live);
            if self
                .generation
                .compare_exchange(generation, generation + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            lock(&self.outbound).take();
            *lock(&self.connected_at) = None;
            // The caller is one of these tasks and returns right after.
            if let Some(connection) = live.take() {
                connection.abort();
            }
        }

        if self.user_disconnected.load(Ordering::Acquire)
            || self.state.get() == ConnectionState::Closed
        {
            return;
        }

        let classified = self
            .recovery
            .classify(&error, ErrorContext::new(self.component.clone(), "connection"));
        let error_type = classified.error_type();
        self.events
            .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
        warn!(url = %self.config.url, error = %error, "WebSocket connection lost");

        if self.config.auto_reconnect {
            self.state.set(ConnectionState::Reconnecting);
            self.spawn_supervisor(Some(error_type), 0);
        } else {
            self.state.set(ConnectionState::Disconnected);
        }
    }

    fn spawn_supervisor(self: &Arc<Self>, last_error: Option<ErrorType>, failed: u32) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.reconnect_loop(last_error, failed).await });
        if let Some(previous) = lock(&self.supervisor).replace(handle) {
            previous.abort();
        }
    }

    /// Keep attempting until connected, told to stop, or out of attempts.
    /// `failed` counts the attempts that already failed in this outage.
    async fn reconnect_loop(self: Arc<Self>, mut last_error: Option<ErrorType>, mut failed: u32) {
        loop {
            if self.state.get() == ConnectionState::Connected {
                return;
            }
            if failed >= self.config.max_reconnect_attempts {
                warn!(
                    url = %self.config.url,
                    attempts = failed,
                    "giving up on WebSocket reconnection"
                );
                self.state.set(ConnectionState::Error);
                return;
            }

            let attempt = failed + 1;
            let delay = self
                .recovery
                .calculate_reconnection_delay(attempt, last_error);
            self.state.set(ConnectionState::Reconnecting);
            self.events
                .emit(TransportEvent::Reconnecting { attempt, delay });
            info!(
                attempt,
                max_attempts = self.config.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "Attempting WebSocket reconnection"
            );
            tokio::time::sleep(delay).await;

            if self.user_disconnected.load(Ordering::Acquire)
                || self.state.get() == ConnectionState::Closed
            {
                return;
            }
            if self.connecting.swap(true, Ordering::AcqRel) {
                debug!("connect already in progress, waiting for it");
                tokio::time::sleep(delay).await;
                continue;
            }
            let result = {
                let _guard = ConnectingGuard(&self.connecting);
                self.attempt().await
            };
            match result {
                Ok(()) => {
                    self.reconnections.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) => {
                    failed += 1;
                    let (error_type, keep_going) = self.attempt_failed(&e, failed);
                    last_error = Some(error_type);
                    if !keep_going {
                        self.state.set(ConnectionState::Error);
                        return;
                    }
                }
            }
        }
    }

    /// Stop the current connection on request.
    fn shutdown_connection(&self) {
        let mut live = lock(&self.live);
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(tx) = lock(&self.outbound).take() {
            let _ = tx.send(WsMessage::Close(None));
        }
        *lock(&self.connected_at) = None;
        if let Some(connection) = live.take() {
            connection.close_gracefully();
        }
    }
}

impl Transport for WebSocketTransport {
    type Error = TransportError;

    async fn connect(&self) -> Result<(), Self::Error> {
        let inner = &self.inner;
        match inner.state.get() {
            ConnectionState::Closed => return Err(TransportError::AlreadyClosed),
            ConnectionState::Connected => return Ok(()),
            _ => {}
        }
        if inner.connecting.swap(true, Ordering::AcqRel) {
            return Err(TransportError::ConnectInProgress);
        }
        let result = {
            let _guard = ConnectingGuard(&inner.connecting);
            inner.user_disconnected.store(false, Ordering::Release);
            inner.abort_supervisor();
            inner.attempt().await
        };

        if let Err(e) = &result {
            let (error_type, keep_going) = inner.attempt_failed(e, 1);
            if inner.config.auto_reconnect && keep_going {
                inner.state.set(ConnectionState::Reconnecting);
                inner.spawn_supervisor(Some(error_type), 1);
            } else {
                inner.state.set(ConnectionState::Error);
            }
        }
        result
    }

    async fn send(&self, msg: Message) -> Result<(), Self::Error> {
        let inner = &self.inner;
        let text = serde_json::to_string(&msg)?;
        if text.len() > inner.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: text.len(),
                max: inner.config.max_message_size,
            });
        }
        if inner.state.get() == ConnectionState::Closed {
            return Err(TransportError::AlreadyClosed);
        }

        let mut queue = inner.queue.lock().await;
        if inner.state.get() == ConnectionState::Connected {
            let sender = lock(&inner.outbound).clone();
            if let Some(tx) = sender {
                match tx.send(WsMessage::Text(text)) {
                    Ok(()) => {
                        inner.messages_sent.fetch_add(1, Ordering::Relaxed);
                        return Ok(());
                    }
                    Err(mpsc::error::SendError(frame)) => {
                        return match frame {
                            WsMessage::Text(text) => queue_message(inner, &mut queue, text),
                            _ => Err(TransportError::NotConnected),
                        };
                    }
                }
            }
        }
        queue_message(inner, &mut queue, text)
    }

    async fn recv(&self) -> Result<Option<Message>, Self::Error> {
        let inner = &self.inner;
        let mut rx = inner.inbound_rx.lock().await;
        let mut state = inner.state.watch();
        loop {
            if let Ok(message) = rx.try_recv() {
                return Ok(Some(message));
            }
            if state.borrow_and_update().is_finished() {
                return Ok(None);
            }
            tokio::select! {
                message = rx.recv() => return Ok(message),
                changed = state.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        let inner = &self.inner;
        inner.user_disconnected.store(true, Ordering::Release);
        inner.abort_supervisor();
        inner.shutdown_connection();
        if inner.state.get() != ConnectionState::Closed
            && inner.state.set(ConnectionState::Disconnected).is_some()
        {
            info!(url = %inner.config.url, "WebSocket disconnected");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.disconnect().await?;
        self.inner.queue.lock().await.clear();
        if self.inner.state.set(ConnectionState::Closed).is_some() {
            info!(url = %self.inner.config.url, "WebSocket transport closed");
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    fn events(&self) -> &EventBus {
        &self.inner.events
    }

    fn recovery(&self) -> Arc<RecoveryEngine> {
        Arc::clone(&self.inner.recovery)
    }

    fn component(&self) -> &str {
        &self.inner.component
    }

    fn latency(&self) -> Option<Duration> {
        self.inner.latency()
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("websocket")
            .remote_addr(self.inner.config.url.clone())
            .connected_at(*lock(&self.inner.connected_at))
    }
}

fn queue_message(
    inner: &Inner,
    queue: &mut VecDeque<String>,
    text: String,
) -> Result<(), TransportError> {
    if !inner.config.queue_enabled {
        return Err(TransportError::NotConnected);
    }
    if queue.len() >= inner.config.max_queue_size {
        return Err(TransportError::QueueFull {
            capacity: inner.config.max_queue_size,
        });
    }
    queue.push_back(text);
    debug!(queued = queue.len(), "queued message while disconnected");
    Ok(())
}

fn map_ws_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(e) => TransportError::Io(e),
        WsError::Http(response) => TransportError::Http {
            status: response.status().as_u16(),
            message: response
                .status()
                .canonical_reason()
                .unwrap_or("handshake rejected")
                .to_string(),
        },
        WsError::Url(e) => TransportError::connection(format!("invalid URL: {e}")),
        WsError::Capacity(e) => TransportError::protocol(e.to_string()),
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::ConnectionClosed,
        other => TransportError::connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::protocol::Notification;

    #[tokio::test]
    async fn test_initial_state() {
        let transport = WebSocketTransport::new(WebSocketConfig::default());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(!transport.is_connected());
        assert!(transport.latency().is_none());
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_component_names_the_endpoint() {
        let transport = WebSocketTransport::new(
            WebSocketConfig::new("ws://example.com")
                .with_connect_timeout(Duration::from_secs(5))
                .with_ping_interval(Duration::from_secs(10))
                .without_auto_reconnect()
                .with_header("X-Custom", "value"),
        );

        assert!(!transport.is_connected());
        assert_eq!(transport.url(), "ws://example.com");
        assert!(!transport.config().auto_reconnect);
        assert_eq!(transport.component(), "websocket:ws://example.com");
    }

    #[tokio::test]
    async fn test_transport_metadata() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost:8080"));
        let metadata = transport.metadata();

        assert_eq!(metadata.transport_type, "websocket");
        assert_eq!(metadata.remote_addr, Some("ws://localhost:8080".to_string()));
        assert!(metadata.connected_at.is_none());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_queues() {
        let transport = WebSocketTransport::new(WebSocketConfig::default().with_max_queue_size(2));
        let note = || Message::Notification(Notification::new("notifications/test"));

        transport.send(note()).await.unwrap();
        transport.send(note()).await.unwrap();
        assert!(matches!(
            transport.send(note()).await,
            Err(TransportError::QueueFull { capacity: 2 })
        ));
        assert_eq!(transport.stats().await.queued, 2);
    }

    #[tokio::test]
    async fn test_send_without_queue_fails_fast() {
        let transport = WebSocketTransport::new(WebSocketConfig::default().without_queue());
        let result = transport
            .send(Message::Notification(Notification::new("x")))
            .await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_before_queueing() {
        let transport = WebSocketTransport::new(WebSocketConfig::default().with_max_message_size(8));
        let result = transport
            .send(Message::Notification(Notification::new("too/long/for/limit")))
            .await;
        assert!(matches!(result, Err(TransportError::MessageTooLarge { .. })));
        assert_eq!(transport.stats().await.queued, 0);
    }

    #[tokio::test]
    async fn test_connect_rejects_internal_target() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://127.0.0.1:9"));
        let result = transport.connect().await;
        assert!(matches!(result, Err(TransportError::InvalidTarget { .. })));
        // Security failures are not retried automatically.
        assert_eq!(transport.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let transport = WebSocketTransport::new(WebSocketConfig::default());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(transport.state(), ConnectionState::Closed);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::AlreadyClosed)
        ));
        assert!(matches!(
            transport
                .send(Message::Notification(Notification::new("x")))
                .await,
            Err(TransportError::AlreadyClosed)
        ));
    }

    #[test]
    fn test_ws_error_mapping() {
        use tokio_tungstenite::tungstenite::Error as WsError;
        let refused = map_ws_error(WsError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )));
        assert!(matches!(refused, TransportError::Io(_)));
        assert!(matches!(
            map_ws_error(WsError::ConnectionClosed),
            TransportError::ConnectionClosed
        ));
    }
}
