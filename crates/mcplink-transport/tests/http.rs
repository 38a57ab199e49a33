//! HTTP transport tests against a local axum server.

#![cfg(feature = "http")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use mcplink_core::error::ErrorType;
use mcplink_core::protocol::{Message, Notification, Request, RequestId};
use mcplink_transport::http::{HttpTransport, HttpTransportConfig};
use mcplink_transport::{ConnectionState, Transport, TransportError};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const SESSION: &str = "sess-1";

#[derive(Clone, Default)]
struct ServerState {
    deleted: Arc<AtomicBool>,
}

fn accepts_both(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json") && v.contains("text/event-stream"))
}

async fn json_endpoint(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !accepts_both(&headers) {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    let Some(id) = body.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };
    let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"echo": body["method"]}});
    ([("mcp-session-id", SESSION)], Json(reply)).into_response()
}

async fn sse_endpoint(Json(body): Json<Value>) -> Response {
    let id = body["id"].clone();
    let progress = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"progress": 1}});
    let reply = json!({"jsonrpc": "2.0", "id": id, "result": {}});
    let stream = format!(
        ": stream opened\n\nid: 1\ndata: {progress}\n\nevent: heartbeat\ndata: {{}}\n\nid: 2\r\ndata: {reply}\r\n\r\ndata: [DONE]\n\n"
    );
    ([(header::CONTENT_TYPE, "text/event-stream")], stream).into_response()
}

async fn oversized_sse_endpoint(Json(body): Json<Value>) -> Response {
    let id = body["id"].clone();
    let progress = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"progress": 1}});
    let bulky = json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"data": "x".repeat(4096)}});
    let reply = json!({"jsonrpc": "2.0", "id": id, "result": {}});
    let stream = format!("data: {progress}\n\ndata: {bulky}\n\ndata: {reply}\n\n");
    ([(header::CONTENT_TYPE, "text/event-stream")], stream).into_response()
}

async fn batch_endpoint() -> Response {
    Json(json!([
        {"jsonrpc": "2.0", "id": 1, "result": {}},
        {"jsonrpc": "2.0", "id": 2, "result": {}}
    ]))
    .into_response()
}

async fn unauthorized_endpoint() -> Response {
    (StatusCode::UNAUTHORIZED, "missing token").into_response()
}

async fn unavailable_endpoint() -> Response {
    StatusCode::SERVICE_UNAVAILABLE.into_response()
}

async fn delete_session(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    if headers.get("mcp-session-id").is_some_and(|v| v == SESSION) {
        state.deleted.store(true, Ordering::SeqCst);
    }
    StatusCode::NO_CONTENT
}

async fn spawn_server() -> (SocketAddr, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/json", post(json_endpoint).delete(delete_session))
        .route("/sse", post(sse_endpoint))
        .route("/sse-oversized", post(oversized_sse_endpoint))
        .route("/batch", post(batch_endpoint))
        .route("/unauthorized", post(unauthorized_endpoint))
        .route("/unavailable", post(unavailable_endpoint))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn connected(addr: SocketAddr, path: &str) -> HttpTransport {
    let config = HttpTransportConfig::new(format!("http://{addr}{path}")).allow_local_targets();
    HttpTransport::connect_with(config).await.unwrap()
}

fn request(id: u64, method: &'static str) -> Message {
    Message::Request(Request::new(method, RequestId::Number(id)))
}

#[tokio::test]
async fn test_json_response_and_session() {
    let (addr, _) = spawn_server().await;
    let transport = connected(addr, "/json").await;
    assert_eq!(transport.state(), ConnectionState::Connected);

    transport.send(request(7, "tools/list")).await.unwrap();
    let msg = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
    match msg {
        Message::Response(resp) => {
            assert_eq!(resp.id, RequestId::Number(7));
            assert_eq!(resp.result, Some(json!({"echo": "tools/list"})));
        }
        other => panic!("expected response, got {other:?}"),
    }
    assert_eq!(transport.session_id().as_deref(), Some(SESSION));
    assert_eq!(transport.metadata().session_id.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_notification_accepted_without_body() {
    let (addr, _) = spawn_server().await;
    let transport = connected(addr, "/json").await;

    transport
        .send(Message::Notification(Notification::new("notifications/initialized")))
        .await
        .unwrap();
    assert_eq!(transport.messages_sent(), 1);
    assert_eq!(transport.messages_received(), 0);
}

#[tokio::test]
async fn test_event_stream_response() {
    let (addr, _) = spawn_server().await;
    let transport = connected(addr, "/sse").await;

    transport.send(request(3, "tools/call")).await.unwrap();

    let first = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(first.method(), Some("notifications/progress"));
    let second = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
    assert!(matches!(second, Message::Response(ref r) if r.id == RequestId::Number(3)));

    assert_eq!(transport.messages_received(), 2);
    assert_eq!(transport.last_event_id().as_deref(), Some("2"));
}

#[tokio::test]
async fn test_oversized_event_is_skipped_and_stream_continues() {
    let (addr, _) = spawn_server().await;
    let config = HttpTransportConfig::new(format!("http://{addr}/sse-oversized"))
        .allow_local_targets()
        .with_max_message_size(1024);
    let transport = HttpTransport::connect_with(config).await.unwrap();

    transport.send(request(9, "tools/call")).await.unwrap();

    let first = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(first.method(), Some("notifications/progress"));
    let second = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
    assert!(matches!(second, Message::Response(ref r) if r.id == RequestId::Number(9)));
    assert_eq!(transport.messages_received(), 2);

    // The dropped frame is reported once the chunk has been processed.
    let recovery = transport.recovery();
    timeout(WAIT, async {
        while !recovery.stats().by_type.contains_key(&ErrorType::PayloadTooLarge) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(recovery.stats().by_type[&ErrorType::PayloadTooLarge].count, 1);
}

#[tokio::test]
async fn test_batch_body() {
    let (addr, _) = spawn_server().await;
    let transport = connected(addr, "/batch").await;

    transport.send(request(1, "a")).await.unwrap();
    for expected in 1..=2 {
        let msg = timeout(WAIT, transport.recv()).await.unwrap().unwrap().unwrap();
        assert!(matches!(msg, Message::Response(ref r) if r.id == RequestId::Number(expected)));
    }
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let (addr, _) = spawn_server().await;

    let transport = connected(addr, "/unauthorized").await;
    let err = transport.send(request(1, "x")).await.unwrap_err();
    assert!(matches!(err, TransportError::Http { status: 401, ref message } if message == "missing token"));

    let transport_503 = connected(addr, "/unavailable").await;
    let err = transport_503.send(request(1, "x")).await.unwrap_err();
    assert!(matches!(err, TransportError::Http { status: 503, .. }));

    let stats = transport.recovery().stats();
    assert_eq!(stats.by_type[&ErrorType::Unauthorized].count, 1);
    let stats = transport_503.recovery().stats();
    assert_eq!(stats.by_type[&ErrorType::ServiceUnavailable].count, 1);
}

#[tokio::test]
async fn test_close_deletes_session() {
    let (addr, state) = spawn_server().await;
    let transport = connected(addr, "/json").await;

    transport.send(request(1, "initialize")).await.unwrap();
    let _ = timeout(WAIT, transport.recv()).await.unwrap();
    transport.close().await.unwrap();

    assert!(state.deleted.load(Ordering::SeqCst));
    assert_eq!(transport.state(), ConnectionState::Closed);
    assert!(transport.session_id().is_none());
    assert!(matches!(
        transport.send(request(2, "x")).await,
        Err(TransportError::AlreadyClosed)
    ));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = connected(addr, "/json").await;
    let err = transport.send(request(1, "x")).await.unwrap_err();
    assert!(matches!(err, TransportError::Connection { .. }));

    let stats = transport.recovery().stats();
    assert_eq!(stats.by_type[&ErrorType::ConnectionRefused].count, 1);
}
