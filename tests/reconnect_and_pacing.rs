mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use battlebots::transport::in_memory::ClientFrame;
use battlebots::{Agent, AgentConfig, AgentState, Identity, InMemoryConnector};
use common::{accept_and_greet, Snapshot, StubPredictor, BOT_ID};
use tokio::time::{timeout, Duration, Instant};

fn identity() -> Identity {
    Identity::new(BOT_ID, "bot", "game-1")
}

#[tokio::test(start_paused = true)]
async fn refused_connections_stop_after_max_attempts() {
    let (connector, _accepted) = InMemoryConnector::new();
    connector.set_refusing(true);
    let retirements = Arc::new(AtomicUsize::new(0));
    let counter = retirements.clone();
    let config = AgentConfig {
        max_reconnect_attempts: 3,
        ..AgentConfig::default()
    };

    let started = Instant::now();
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        config.clone(),
        Arc::new(connector.clone()),
        StubPredictor::failing(),
        Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    handle.retired().await;

    // The counter may reach the maximum; only going past it retires.
    assert_eq!(connector.attempts(), 4);
    assert_eq!(handle.snapshot().reconnect_attempts, 4);
    assert_eq!(retirements.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= config.reconnect_delay * 4);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn abnormal_close_reconnects_and_resets_attempts() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        AgentConfig::default(),
        Arc::new(connector.clone()),
        StubPredictor::failing(),
        None,
    );

    let first = accept_and_greet(&mut accepted).await;
    assert_eq!(handle.snapshot().reconnect_attempts, 0);
    assert_eq!(handle.snapshot().generation, 1);

    let dropped_at = Instant::now();
    drop(first);
    handle.wait_for_state(AgentState::Disconnected).await;

    let mut second = accept_and_greet(&mut accepted).await;
    assert!(dropped_at.elapsed() >= AgentConfig::default().reconnect_delay);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, AgentState::WaitingForConfig);
    assert_eq!(snapshot.reconnect_attempts, 0);
    assert_eq!(snapshot.generation, 2);

    second.send_json(&Snapshot::needs_positions().message("configuration"));
    let positions = second.recv_json().await.unwrap();
    assert_eq!(positions["type"], "ship-positions");
}

#[tokio::test(start_paused = true)]
async fn transport_error_followed_by_close_reconnects() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        AgentConfig::default(),
        Arc::new(connector.clone()),
        StubPredictor::failing(),
        None,
    );

    let first = accept_and_greet(&mut accepted).await;
    first.fail("connection reset");
    first.close(1006);

    let _second = accept_and_greet(&mut accepted).await;
    assert_eq!(connector.attempts(), 2);
    assert!(!handle.is_retired());
}

#[tokio::test(start_paused = true)]
async fn normal_close_retires_without_reconnecting() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        AgentConfig::default(),
        Arc::new(connector.clone()),
        StubPredictor::failing(),
        None,
    );

    let server = accept_and_greet(&mut accepted).await;
    server.close(1000);
    handle.retired().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts(), 1);
    assert!(accepted.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn nothing_is_written_before_the_send_delay() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let config = AgentConfig::default();
    let _handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        config.clone(),
        Arc::new(connector),
        StubPredictor::failing(),
        None,
    );

    let mut server = accepted.recv().await.unwrap();
    let early = timeout(config.send_delay - Duration::from_millis(1), server.recv()).await;
    assert!(early.is_err());

    match server.recv().await {
        Some(ClientFrame::Text(text)) => assert!(text.contains("\"connection\"")),
        other => panic!("expected connection payload, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn queued_message_is_dropped_when_the_connection_closes() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        AgentConfig::default(),
        Arc::new(connector),
        StubPredictor::failing(),
        None,
    );

    let mut first = accept_and_greet(&mut accepted).await;
    first.send_json(&Snapshot::needs_positions().message("configuration"));
    first.close(4000);
    handle.wait_for_state(AgentState::Disconnected).await;

    // The layout queued while positioning must not leak onto any connection.
    assert_eq!(first.recv().await, None);
    let mut second = accepted.recv().await.unwrap();
    let hello = second.recv_json().await.unwrap();
    assert_eq!(hello["type"], "connection");
    assert!(timeout(Duration::from_secs(5), second.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn prediction_answer_from_a_lost_connection_is_discarded() {
    let (connector, mut accepted) = InMemoryConnector::new();
    let predictor = StubPredictor::slow(2, 3, Duration::from_secs(2));
    let handle = Agent::spawn(
        identity(),
        "ws://game.test/game",
        AgentConfig::default(),
        Arc::new(connector),
        predictor.clone(),
        None,
    );

    let first = accept_and_greet(&mut accepted).await;
    first.send_json(&Snapshot::our_turn().message("configuration"));
    handle.wait_for_state(AgentState::Attacking).await;
    first.close(4001);

    let mut second = accept_and_greet(&mut accepted).await;
    assert_eq!(predictor.calls(), 1);
    assert!(timeout(Duration::from_secs(10), second.recv()).await.is_err());
    assert_eq!(handle.current_state(), AgentState::WaitingForConfig);
}
