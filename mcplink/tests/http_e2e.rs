//! End-to-end client tests over the streamable HTTP transport against a
//! local axum server.

#![cfg(feature = "http")]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use mcplink::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const SESSION: &str = "e2e-session";

async fn mcp_endpoint(Json(body): Json<Value>) -> Response {
    let Some(id) = body.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };
    let method = body["method"].as_str().unwrap_or_default();
    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": { "name": "http-server", "version": "2.0.0" }
        }),
        "tools/list" => json!({ "tools": [{ "name": "slow_sum" }] }),
        "tools/call" => {
            // Stream progress before the final result.
            let progress = json!({
                "jsonrpc": "2.0",
                "method": "notifications/progress",
                "params": { "progressToken": "t", "progress": 50 }
            });
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": "42" }] }
            });
            let stream = format!("data: {progress}\n\ndata: {reply}\n\n");
            return (
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::HeaderName::from_static("mcp-session-id"), SESSION),
                ],
                stream,
            )
                .into_response();
        }
        "resources/list" => json!({ "resources": [{ "uri": "mem://a", "name": "a" }] }),
        "resources/read" => json!({ "contents": [{ "uri": "mem://a", "text": "alpha" }] }),
        "ping" => json!({}),
        other => {
            let error = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not found: {other}") }
            });
            return Json(error).into_response();
        }
    };
    (
        [(header::HeaderName::from_static("mcp-session-id"), SESSION)],
        Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })),
    )
        .into_response()
}

async fn denied_endpoint() -> Response {
    (StatusCode::UNAUTHORIZED, "bad token").into_response()
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route("/denied", post(denied_endpoint));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn transport(addr: SocketAddr, path: &str) -> HttpTransport {
    HttpTransport::new(
        HttpTransportConfig::new(format!("http://{addr}{path}")).allow_local_targets(),
    )
    .unwrap()
}

#[derive(Clone, Default)]
struct ProgressRecorder {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl ClientHandler for ProgressRecorder {
    async fn on_progress(&self, params: Value) {
        self.seen.lock().unwrap().push(params);
    }
}

#[tokio::test]
async fn test_client_session_over_http() {
    let addr = spawn_server().await;
    let client = timeout(WAIT, ClientBuilder::new().connect(transport(addr, "/mcp")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(client.server_info().await.unwrap().name, "http-server");
    assert_eq!(client.transport().session_id().as_deref(), Some(SESSION));

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources[0].uri, "mem://a");
    let contents = client.read_resource("mem://a").await.unwrap();
    assert_eq!(contents.byte_len(), 5);

    // Prompts were not advertised.
    assert!(matches!(
        client.list_prompts().await,
        Err(McpError::CapabilityNotSupported { .. })
    ));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_streamed_tool_call_delivers_progress() {
    let addr = spawn_server().await;
    let recorder = ProgressRecorder::default();
    let client = ClientBuilder::new()
        .connect_with_handler(transport(addr, "/mcp"), recorder.clone())
        .await
        .unwrap();

    let result = timeout(WAIT, client.call_tool("slow_sum", json!({})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text_content(), "42");

    // The progress frame precedes the result on the same stream.
    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["progress"], 50);
    assert!(client.get_stats().await.notifications_received >= 1);
}

#[tokio::test]
async fn test_unknown_method_over_http() {
    let addr = spawn_server().await;
    let client = ClientBuilder::new()
        .connect(transport(addr, "/mcp"))
        .await
        .unwrap();

    let err = client.request("unknown.method", None).await.unwrap_err();
    let classified = err.as_classified().unwrap();
    assert_eq!(classified.category(), ErrorCategory::Validation);
    assert_eq!(classified.error_type(), ErrorType::MethodNotFound);
}

#[tokio::test]
async fn test_unauthorized_handshake_is_escalated() {
    let addr = spawn_server().await;
    let err = ClientBuilder::new()
        .connect(transport(addr, "/denied"))
        .await
        .unwrap_err();

    let classified = err.as_classified().unwrap();
    assert_eq!(classified.category(), ErrorCategory::Authentication);
    assert!(!classified.is_retryable());
    assert!(classified.guidance().is_some());
}
