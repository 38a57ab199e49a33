//! Resilience tests: transport lifecycle under failure and the recovery
//! engine driving breaker and backoff decisions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mcplink_core::error::{ErrorContext, ErrorType, McpError};
use mcplink_core::protocol::{Message, Notification, Request, RequestId};
use mcplink_transport::events::{ConnectionState, EventKind, TransportEvent};
use mcplink_transport::memory::MemoryTransport;
use mcplink_transport::recovery::{
    CircuitBreakerConfig, CircuitState, RecoveryAction, RecoveryConfig, RecoveryEngine,
    RecoveryOutcome,
};
use mcplink_transport::{Backoff, Transport, TransportError, TransportExt};
use serde_json::json;
use tokio::time::timeout;

// =============================================================================
// Connection Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_double_close_is_safe() {
    let (client, server) = MemoryTransport::pair();

    client.close().await.unwrap();
    client.close().await.unwrap();
    server.close().await.unwrap();
    server.close().await.unwrap();

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_send_after_close_fails() {
    let (client, _server) = MemoryTransport::pair();
    client.close().await.unwrap();

    let result = client
        .send(Message::Notification(Notification::new("test")))
        .await;
    assert!(matches!(result, Err(TransportError::AlreadyClosed)));
    assert!(matches!(
        client.connect().await,
        Err(TransportError::AlreadyClosed)
    ));
}

#[tokio::test]
async fn test_state_events_follow_lifecycle() {
    let (client, _server) = MemoryTransport::pair();
    let mut states = client.subscribe_to(EventKind::StateChanged);

    client.disconnect().await.unwrap();
    client.connect().await.unwrap();
    client.close().await.unwrap();
    // Ignored once closed.
    client.disconnect().await.unwrap();

    let mut seen = Vec::new();
    while let Some(TransportEvent::StateChanged { previous, current }) = states.try_recv() {
        seen.push((previous, current));
    }
    assert_eq!(
        seen,
        vec![
            (ConnectionState::Connected, ConnectionState::Disconnected),
            (ConnectionState::Disconnected, ConnectionState::Connected),
            (ConnectionState::Connected, ConnectionState::Closed),
        ]
    );
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_sends() {
    let (client, server) = MemoryTransport::pair_with_capacity(200);
    let client = Arc::new(client);
    let send_count = Arc::new(AtomicU32::new(0));

    let mut handles = vec![];
    for i in 0..10 {
        let client = Arc::clone(&client);
        let counter = Arc::clone(&send_count);
        handles.push(tokio::spawn(async move {
            for j in 0..10 {
                let msg = Message::Notification(
                    Notification::new("concurrent").params(json!({"sender": i, "seq": j})),
                );
                if client.send(msg).await.is_ok() {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(send_count.load(Ordering::Relaxed), 100);

    client.close().await.unwrap();
    let mut received = 0;
    while let Ok(Ok(Some(_))) = timeout(Duration::from_secs(2), server.recv()).await {
        received += 1;
    }
    assert_eq!(received, 100, "Should receive all 100 messages");
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let (client, server) = MemoryTransport::pair();
    let batch = (0..5)
        .map(|i| Message::Request(Request::new("tools/list", RequestId::Number(i))))
        .collect();

    client.send_batch(batch).await.unwrap();
    for expected in 0..5 {
        match server.recv().await.unwrap().unwrap() {
            Message::Request(req) => assert_eq!(req.id, RequestId::Number(expected)),
            other => panic!("expected request, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_recv_timeout_behavior() {
    let (_client, server) = MemoryTransport::pair();
    let result = timeout(Duration::from_millis(100), server.recv()).await;
    assert!(result.is_err(), "Should timeout when no messages");
}

// =============================================================================
// Recovery Engine Tests
// =============================================================================

fn engine() -> RecoveryEngine {
    RecoveryEngine::new(
        RecoveryConfig::default()
            .with_breaker(
                CircuitBreakerConfig::default()
                    .with_failure_threshold(3)
                    .with_success_threshold(2)
                    .with_cooldown(Duration::from_secs(10)),
            )
            .with_backoff(Backoff::new(Duration::from_millis(100), Duration::from_secs(2)).without_jitter()),
    )
}

fn refused() -> TransportError {
    TransportError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
}

#[test]
fn test_breaker_trips_and_recovers() {
    let engine = engine();
    let ctx = || ErrorContext::new("websocket:wss://example.com", "connect");

    for _ in 0..3 {
        engine.classify(&refused(), ctx());
    }
    assert_eq!(engine.circuit_state("websocket:wss://example.com"), CircuitState::Open);
    assert!(matches!(
        engine.allows("websocket:wss://example.com"),
        Err(TransportError::CircuitOpen { .. })
    ));

    // Open short-circuits to Escalate.
    let classified = engine.classify(&refused(), ctx());
    let strategy = engine.decide_recovery_strategy(&classified, CircuitState::Open, 4);
    assert_eq!(strategy.action, RecoveryAction::Escalate);

    let quick = RecoveryEngine::new(
        RecoveryConfig::default().with_breaker(
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_success_threshold(2)
                .with_cooldown(Duration::from_millis(20)),
        ),
    );
    quick.classify(&refused(), ErrorContext::new("k", "connect"));
    assert_eq!(quick.circuit_state("k"), CircuitState::Open);
    std::thread::sleep(Duration::from_millis(30));
    assert!(quick.allows("k").is_ok());
    assert_eq!(quick.circuit_state("k"), CircuitState::HalfOpen);

    quick.record_success("k");
    assert_eq!(quick.circuit_state("k"), CircuitState::HalfOpen);
    quick.record_success("k");
    assert_eq!(quick.circuit_state("k"), CircuitState::Closed);
}

#[test]
fn test_low_and_medium_severity_do_not_trip() {
    let engine = engine();
    for _ in 0..10 {
        engine.classify(&McpError::parse("bad frame"), ErrorContext::new("c", "recv"));
        engine.classify(
            &McpError::timeout("tools/call", Duration::from_secs(1)),
            ErrorContext::new("c", "call"),
        );
    }
    assert_eq!(engine.circuit_state("c"), CircuitState::Closed);

    let stats = engine.stats();
    assert_eq!(stats.total_errors, 20);
    assert_eq!(stats.by_type[&ErrorType::ParseError].count, 10);
    assert_eq!(stats.by_type[&ErrorType::Timeout].count, 10);
}

#[test]
fn test_reconnection_delay_is_monotonic_and_capped() {
    let engine = engine();
    let delays: Vec<_> = (1..=10)
        .map(|attempt| engine.calculate_reconnection_delay(attempt, Some(ErrorType::ConnectionRefused)))
        .collect();

    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(delays[0], Duration::from_millis(100));
    assert_eq!(delays[9], Duration::from_secs(2));

    let reset = engine.calculate_reconnection_delay(5, Some(ErrorType::ConnectionReset));
    assert!(reset < delays[4]);
}

#[tokio::test(start_paused = true)]
async fn test_execute_strategy_outcomes() {
    let engine = engine();

    let unavailable = TransportError::Http {
        status: 503,
        message: "busy".into(),
    };
    let classified = engine.classify(&unavailable, ErrorContext::new("http", "send"));
    let retry = engine.decide_recovery_strategy(&classified, CircuitState::Closed, 2);
    assert_eq!(retry.action, RecoveryAction::Retry);
    assert_eq!(retry.delay, Duration::from_millis(200));
    assert_eq!(
        engine.execute_recovery_strategy(&retry).await,
        RecoveryOutcome::Retry {
            waited: Duration::from_millis(200)
        }
    );

    let tls = TransportError::Tls {
        message: "bad certificate".into(),
    };
    let classified = engine.classify(&tls, ErrorContext::new("wss", "connect"));
    let manual = engine.decide_recovery_strategy(&classified, CircuitState::Closed, 1);
    assert_eq!(manual.action, RecoveryAction::Manual);
    assert!(manual.metadata.contains_key("guidance"));
    assert_eq!(
        engine.execute_recovery_strategy(&manual).await,
        RecoveryOutcome::ManualIntervention
    );

    let parse = engine.classify(&McpError::parse("junk"), ErrorContext::new("ws", "recv"));
    let skip = engine.decide_recovery_strategy(&parse, CircuitState::Closed, 1);
    assert_eq!(
        engine.execute_recovery_strategy(&skip).await,
        RecoveryOutcome::Skipped
    );
}

#[test]
fn test_reset_clears_everything() {
    let engine = engine();
    for _ in 0..3 {
        engine.classify(&refused(), ErrorContext::new("k", "connect"));
    }
    engine.record_connection_attempt("k", false);
    engine.reset();

    let stats = engine.stats();
    assert_eq!(stats.total_errors, 0);
    assert!(stats.by_type.is_empty());
    assert!(stats.breakers.is_empty());
    assert!(engine.reconnection_state("k").is_none());
    assert_eq!(engine.circuit_state("k"), CircuitState::Closed);
}
