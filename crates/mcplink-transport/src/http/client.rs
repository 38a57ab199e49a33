//! HTTP transport client implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_lock::Mutex;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use mcplink_core::codec::MessageCodec;
use mcplink_core::error::ErrorContext;
use mcplink_core::protocol::Message;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::events::{ConnectionState, EventBus, StateCell, TransportEvent};
use crate::rate_limit::ConnectionRateLimiter;
use crate::recovery::RecoveryEngine;
use crate::target::{HTTP_SCHEMES, validate_target};
use crate::traits::{Transport, TransportMetadata};

use super::config::{
    EVENT_STREAM_CONTENT_TYPE, HttpTransportConfig, MCP_PROTOCOL_VERSION_HEADER,
    MCP_SESSION_ID_HEADER,
};
use super::sse::SseDecoder;

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    config: HttpTransportConfig,
    component: String,
    client: Client,
    codec: MessageCodec,
    state: StateCell,
    events: EventBus,
    recovery: Arc<RecoveryEngine>,
    limiter: ConnectionRateLimiter,
    session_id: StdMutex<Option<String>>,
    last_event_id: StdMutex<Option<String>>,
    inbound_tx: mpsc::UnboundedSender<Message>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Message>>,
    streams: StdMutex<Vec<JoinHandle<()>>>,
    connected_at: StdMutex<Option<Instant>>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

/// HTTP transport with SSE streaming support.
///
/// Messages are sent with HTTP POST. The server answers each POST with
/// nothing (202), a JSON body, or an event stream that is read in the
/// background; every decoded message is delivered through
/// [`recv`](Transport::recv) in arrival order.
pub struct HttpTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.inner.config.url)
            .field("state", &self.inner.state.get())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    ///
    /// No request is made until the first send.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::connection(format!("Failed to create HTTP client: {e}")))?;

        let events = EventBus::default();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            component: format!("http:{}", config.url),
            client,
            codec: MessageCodec::new(config.max_message_size),
            state: StateCell::new(events.clone()),
            events,
            recovery: Arc::new(RecoveryEngine::new(config.recovery)),
            limiter: ConnectionRateLimiter::new(config.rate_limit),
            session_id: StdMutex::new(config.session_id.clone()),
            last_event_id: StdMutex::new(None),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            streams: StdMutex::new(Vec::new()),
            connected_at: StdMutex::new(None),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create a transport and connect it.
    pub async fn connect_with(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let transport = Self::new(config)?;
        transport.connect().await?;
        Ok(transport)
    }

    /// Get the current session ID, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        lock(&self.inner.session_id).clone()
    }

    /// Set the session ID.
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *lock(&self.inner.session_id) = Some(session_id.into());
    }

    /// Get the last event ID seen on an event stream.
    #[must_use]
    pub fn last_event_id(&self) -> Option<String> {
        lock(&self.inner.last_event_id).clone()
    }

    /// Get the number of messages sent.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.inner.messages_sent.load(Ordering::Relaxed)
    }

    /// Get the number of messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.inner.messages_received.load(Ordering::Relaxed)
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.inner.abort_streams();
    }
}

impl Inner {
    fn abort_streams(&self) {
        for handle in lock(&self.streams).drain(..) {
            handle.abort();
        }
    }

    /// Build headers for requests.
    fn build_headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(
            MCP_PROTOCOL_VERSION_HEADER,
            HeaderValue::from_str(&self.config.protocol_version).map_err(|e| {
                TransportError::connection(format!("Invalid protocol version header: {e}"))
            })?,
        );

        if let Some(sid) = lock(&self.session_id).as_deref() {
            headers.insert(
                MCP_SESSION_ID_HEADER,
                HeaderValue::from_str(sid).map_err(|e| {
                    TransportError::connection(format!("Invalid session ID header: {e}"))
                })?,
            );
        }

        for (name, value) in &self.config.headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::connection(format!("Invalid header name '{name}': {e}"))
            })?;
            let mut value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::connection(format!("Invalid header value for '{name}': {e}"))
            })?;
            if header == AUTHORIZATION {
                value.set_sensitive(true);
            }
            headers.insert(header, value);
        }

        Ok(headers)
    }

    async fn post(self: &Arc<Self>, body: String) -> Result<(), TransportError> {
        let headers = self.build_headers()?;
        let response = self
            .client
            .post(&self.config.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, self.config.request_timeout))?;

        self.handle_response(response).await
    }

    /// Handle the HTTP response, which may be empty, JSON or SSE.
    async fn handle_response(self: &Arc<Self>, response: Response) -> Result<(), TransportError> {
        let status = response.status();

        if let Some(sid) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut session = lock(&self.session_id);
            if session.as_deref() != Some(sid) {
                debug!(session_id = sid, "session established");
                *session = Some(sid.to_string());
            }
        }

        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND && lock(&self.session_id).take().is_some() {
                warn!("server no longer knows the session, dropping session id");
            }
            let body = response.text().await.unwrap_or_default();
            let mut message = body.trim().to_string();
            if message.is_empty() {
                message = status.canonical_reason().unwrap_or("request failed").to_string();
            }
            if message.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(EVENT_STREAM_CONTENT_TYPE));

        if event_stream {
            let inner = Arc::clone(self);
            let handle = tokio::spawn(async move {
                if let Err(e) = inner.read_event_stream(response).await {
                    let classified = inner
                        .recovery
                        .classify(&e, ErrorContext::new(inner.component.clone(), "stream"));
                    warn!(error = %e, "event stream failed");
                    inner
                        .events
                        .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
                }
            });
            let mut streams = lock(&self.streams);
            streams.retain(|h| !h.is_finished());
            streams.push(handle);
            Ok(())
        } else {
            self.read_json_body(response).await
        }
    }

    async fn read_json_body(&self, response: Response) -> Result<(), TransportError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&e, self.config.request_timeout))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        if body.len() > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: self.config.max_message_size,
            });
        }
        let text = std::str::from_utf8(&body)
            .map_err(|e| TransportError::invalid_message(format!("response is not UTF-8: {e}")))?;
        let messages = self
            .codec
            .deserialize_batch(text)
            .map_err(|e| TransportError::invalid_message(e.to_string()))?;
        for message in messages {
            self.deliver(message);
        }
        Ok(())
    }

    async fn read_event_stream(&self, response: Response) -> Result<(), TransportError> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new(self.config.max_message_size);

        while let Some(chunk) = stream.next().await {
            let chunk: Bytes =
                chunk.map_err(|e| TransportError::connection(format!("SSE stream error: {e}")))?;
            for event in decoder.push(&chunk)? {
                match self.codec.deserialize_batch(&event.data) {
                    Ok(messages) => messages.into_iter().for_each(|m| self.deliver(m)),
                    Err(e) => {
                        debug!(error = %e, "dropping undecodable event");
                        let classified = self
                            .recovery
                            .classify(&e, ErrorContext::new(self.component.clone(), "stream"));
                        self.events
                            .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
                    }
                }
            }
            for skipped in decoder.take_skipped() {
                warn!(error = %skipped, "dropping oversized event");
                let classified = self
                    .recovery
                    .classify(&skipped, ErrorContext::new(self.component.clone(), "stream"));
                self.events
                    .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
            }
            if let Some(id) = decoder.last_event_id() {
                *lock(&self.last_event_id) = Some(id.to_string());
            }
        }

        if decoder.has_partial() {
            debug!("event stream ended inside an event");
        }
        Ok(())
    }

    fn deliver(&self, message: Message) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.events.emit(TransportEvent::MessageReceived {
            message: Box::new(message.clone()),
            received_at: Utc::now(),
        });
        let _ = self.inbound_tx.send(message);
    }

    fn report(&self, error: &TransportError, operation: &str) {
        let classified = self
            .recovery
            .classify(error, ErrorContext::new(self.component.clone(), operation));
        self.events
            .emit(TransportEvent::ErrorOccurred(Box::new(classified)));
    }
}

impl Transport for HttpTransport {
    type Error = TransportError;

    async fn connect(&self) -> Result<(), Self::Error> {
        let inner = &self.inner;
        match inner.state.get() {
            ConnectionState::Closed => return Err(TransportError::AlreadyClosed),
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Connecting => return Err(TransportError::ConnectInProgress),
            _ => {}
        }
        inner.state.set(ConnectionState::Connecting);

        let checks = async {
            validate_target(&inner.config.url, HTTP_SCHEMES, inner.config.allow_local_targets)?;
            inner.limiter.check().await?;
            inner.recovery.allows(&inner.component)
        };
        if let Err(e) = checks.await {
            inner.report(&e, "connect");
            inner.state.set(ConnectionState::Error);
            return Err(e);
        }

        *lock(&inner.connected_at) = Some(Instant::now());
        inner.state.set(ConnectionState::Connected);
        info!(url = %inner.config.url, "HTTP transport ready");
        Ok(())
    }

    async fn send(&self, msg: Message) -> Result<(), Self::Error> {
        let inner = &self.inner;
        let body = serde_json::to_string(&msg)?;
        if body.len() > inner.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: inner.config.max_message_size,
            });
        }
        match inner.state.get() {
            ConnectionState::Closed => return Err(TransportError::AlreadyClosed),
            ConnectionState::Connected => {}
            _ => return Err(TransportError::NotConnected),
        }

        match inner.post(body).await {
            Ok(()) => {
                inner.messages_sent.fetch_add(1, Ordering::Relaxed);
                inner.recovery.record_success(&inner.component);
                Ok(())
            }
            Err(e) => {
                warn!(url = %inner.config.url, error = %e, "HTTP POST failed");
                inner.report(&e, "send");
                Err(e)
            }
        }
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
        inner.abort_streams();
        *lock(&inner.connected_at) = None;
        if inner.state.get() != ConnectionState::Closed {
            inner.state.set(ConnectionState::Disconnected);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let inner = &self.inner;
        if inner.state.get() == ConnectionState::Closed {
            return Ok(());
        }
        self.disconnect().await?;

        // Best effort: tell the server the session is over.
        if lock(&inner.session_id).is_some() {
            match inner.build_headers() {
                Ok(headers) => {
                    if let Err(e) = inner
                        .client
                        .delete(&inner.config.url)
                        .headers(headers)
                        .send()
                        .await
                    {
                        debug!(error = %e, "session DELETE failed");
                    }
                }
                Err(e) => debug!(error = %e, "could not build session DELETE"),
            }
            lock(&inner.session_id).take();
        }

        inner.state.set(ConnectionState::Closed);
        info!(url = %inner.config.url, "HTTP transport closed");
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

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("http")
            .remote_addr(self.inner.config.url.clone())
            .session_id(self.session_id())
            .connected_at(*lock(&self.inner.connected_at))
            .bidirectional(false)
    }
}

fn map_reqwest_error(err: &reqwest::Error, timeout: std::time::Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            operation: "HTTP request".to_string(),
            duration: timeout,
        }
    } else if let Some(status) = err.status() {
        TransportError::Http {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else if err.is_connect() {
        // reqwest hides the io::Error; keep the full chain for the classifier.
        TransportError::connection(error_chain(err))
    } else {
        TransportError::connection(format!("HTTP request failed: {}", error_chain(err)))
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::protocol::Notification;
    use std::time::Duration;

    #[test]
    fn test_resumed_session_id() {
        let transport = HttpTransport::new(
            HttpTransportConfig::new("http://example.com/mcp")
                .with_session_id("test-session")
                .with_connect_timeout(Duration::from_secs(5))
                .with_bearer_token("token"),
        )
        .unwrap();

        assert!(!transport.is_connected());
        assert_eq!(transport.messages_sent(), 0);
        assert_eq!(transport.messages_received(), 0);
        assert_eq!(transport.session_id(), Some("test-session".to_string()));
    }

    #[tokio::test]
    async fn test_transport_metadata() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://localhost:8080")).unwrap();
        let metadata = transport.metadata();

        assert_eq!(metadata.transport_type, "http");
        assert_eq!(metadata.remote_addr, Some("http://localhost:8080".to_string()));
        assert!(!metadata.bidirectional);
    }

    #[tokio::test]
    async fn test_session_id_management() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://localhost:8080")).unwrap();

        assert!(transport.session_id().is_none());
        transport.set_session_id("test-session-123");
        assert_eq!(transport.session_id(), Some("test-session-123".to_string()));
    }

    #[test]
    fn test_headers() {
        let transport = HttpTransport::new(
            HttpTransportConfig::new("https://example.com/mcp")
                .with_session_id("abc")
                .with_bearer_token("secret"),
        )
        .unwrap();
        let headers = transport.inner.build_headers().unwrap();

        assert_eq!(headers[ACCEPT], ACCEPT_VALUE);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[MCP_SESSION_ID_HEADER], "abc");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_scheme() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("ws://example.com/mcp")).unwrap();
        let result = transport.connect().await;
        assert!(matches!(result, Err(TransportError::InvalidTarget { .. })));
        assert_eq!(transport.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_send_requires_connect() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("https://example.com/mcp")).unwrap();
        let result = transport
            .send(Message::Notification(Notification::new("x")))
            .await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_without_session_is_local() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("https://example.com/mcp")).unwrap();
        transport.connect().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(transport.state(), ConnectionState::Closed);
        assert!(transport.recv().await.unwrap().is_none());
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::AlreadyClosed)
        ));
    }
}
