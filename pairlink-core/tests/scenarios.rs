//! End-to-end session scenarios
//!
//! These drive a SessionManager through the mock transport the way a real
//! socket would, and check what subscribers see:
//! - pairing, authentication and the post-pairing resocket
//! - bounded reconnection and the max-attempts ceiling
//! - cancellation of pending reconnections on disconnect and reconnect

use std::sync::Arc;
use std::time::Duration;

use pairlink_core::disconnect::codes;
use pairlink_core::{
    ManagerConfig, ManagerContext, MAX_ATTEMPTS_ERROR, MockTransportFactory, NotificationEvent,
    RecordingNotifier, SessionManager, SessionPhase, SessionState,
};
use tempfile::TempDir;

const IDENTITY: &str = "5491112345678";

struct Harness {
    manager: SessionManager,
    transports: Arc<MockTransportFactory>,
    notifier: Arc<RecordingNotifier>,
    _root: TempDir,
}

fn create_harness() -> Harness {
    let root = TempDir::new().unwrap();
    let transports = Arc::new(MockTransportFactory::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let context = ManagerContext::new(transports.clone(), notifier.clone())
        .with_config(ManagerConfig::default().with_storage_root(root.path()));
    Harness {
        manager: SessionManager::new("u1", context),
        transports,
        notifier,
        _root: root,
    }
}

/// Sleep past a scheduler delay and let the loop apply whatever fired
async fn elapse(h: &Harness, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    h.manager.flush().await;
}

/// connect, then authenticate on the first transport
async fn connected_harness() -> Harness {
    let h = create_harness();
    h.manager.connect().await;
    h.transports.latest().unwrap().emit_authenticated(IDENTITY);
    h.manager.flush().await;
    h.notifier.clear();
    h
}

fn assert_exclusive(state: &SessionState) {
    assert!(
        !(state.pairing_artifact.is_some() && state.identity.is_some()),
        "pairing artifact and identity must not coexist: {state:?}"
    );
    if state.reconnecting {
        assert!(!state.connected);
    }
}

// ==================== Pairing Flow ====================

#[tokio::test]
async fn pairing_then_authentication_notifies_in_order() {
    let h = create_harness();

    let response = h.manager.connect().await;
    assert!(response.success);

    let handle = h.transports.latest().unwrap();
    handle.emit_pairing(b"XYZ");
    h.manager.flush().await;
    assert_exclusive(&h.manager.state().await);

    let events = h.notifier.events_for("u1");
    assert_eq!(events.len(), 1);
    match &events[0] {
        NotificationEvent::SessionPairing(payload) => {
            assert_eq!(payload.session_id, response.session_id());
            assert!(payload.pairing_artifact.as_data_uri().starts_with("data:image/png"));
        }
        other => panic!("expected session-pairing, got {other:?}"),
    }

    handle.emit_authenticated(IDENTITY);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_exclusive(&state);
    assert_eq!(state.phase, SessionPhase::Connected);
    assert!(state.pairing_artifact.is_none());
    assert!(h.manager.is_connected().await);

    let events = h.notifier.events_for("u1");
    assert_eq!(
        h.notifier.kinds(),
        vec!["session-pairing", "session-connected", "session-status"]
    );
    match (&events[1], &events[2]) {
        (NotificationEvent::SessionConnected(connected), NotificationEvent::SessionStatus(status)) => {
            assert_eq!(connected.identity, IDENTITY);
            assert!(status.connected);
            assert_eq!(status.identity.as_deref(), Some(IDENTITY));
            assert!(status.last_activity.is_some());
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn pairing_artifact_expiry_is_advertised_not_enforced() {
    let h = create_harness();
    h.manager.connect().await;
    h.transports.latest().unwrap().emit_pairing(b"XYZ");
    h.manager.flush().await;

    let state = h.manager.state().await;
    let expires_at = state.pairing_expires_at.unwrap();
    let ttl = expires_at - chrono::Utc::now();
    assert!(ttl.num_seconds() > 50 && ttl.num_seconds() <= 60);
}

// ==================== Resocket ====================

#[tokio::test(start_paused = true)]
async fn expected_close_after_pairing_reopens_without_counting() {
    let h = connected_harness().await;
    let first = h.transports.latest().unwrap();

    first.emit_closed(codes::RESTART_REQUIRED);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::AwaitingPairing);
    assert_eq!(state.attempts, 0);
    assert!(!state.reconnecting);
    assert!(first.credentials_path().is_dir(), "credentials survive resocket");

    elapse(&h, 2001).await;

    assert_eq!(h.transports.opened_count(), 2);
    let second = h.transports.latest().unwrap();
    assert_eq!(second.session_id(), first.session_id());
    assert_eq!(second.credentials_path(), first.credentials_path());
    assert_eq!(h.manager.state().await.phase, SessionPhase::AwaitingPairing);
    assert_eq!(h.manager.state().await.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_resockets_never_touch_the_retry_counter() {
    let h = connected_harness().await;

    for round in 0..5 {
        let handle = h.transports.latest().unwrap();
        handle.emit_authenticated(IDENTITY);
        handle.emit_closed(codes::RESTART_REQUIRED);
        h.manager.flush().await;
        assert_eq!(h.manager.state().await.attempts, 0, "round {round}");
        elapse(&h, 2001).await;
    }

    assert_eq!(h.transports.opened_count(), 6);
    assert_eq!(h.manager.state().await.attempts, 0);
}

// ==================== Bounded Retries ====================

#[tokio::test(start_paused = true)]
async fn transient_closes_stop_at_the_ceiling() {
    let h = connected_harness().await;

    // Initial drop plus three failed reconnections
    for attempt in 1..=3u32 {
        h.transports.latest().unwrap().emit_closed(codes::CONNECTION_LOST);
        h.manager.flush().await;

        let state = h.manager.state().await;
        assert_eq!(state.phase, SessionPhase::Reconnecting);
        assert_eq!(state.attempts, attempt);
        assert!(state.reconnecting);
        assert_exclusive(&state);

        elapse(&h, 3001).await;
        assert_eq!(h.transports.opened_count(), 1 + attempt as usize);
    }

    h.transports.latest().unwrap().emit_closed(codes::CONNECTION_LOST);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Terminated);
    assert_eq!(state.last_error.as_deref(), Some(MAX_ATTEMPTS_ERROR));
    assert!(!state.reconnecting);

    match h.notifier.last() {
        Some(NotificationEvent::SessionStatus(status)) => {
            assert!(!status.connected);
            assert_eq!(status.error.as_deref(), Some(MAX_ATTEMPTS_ERROR));
        }
        other => panic!("expected session-status, got {other:?}"),
    }

    elapse(&h, 10_000).await;
    assert_eq!(h.transports.opened_count(), 4, "no fourth attempt");
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_resets_the_counter() {
    let h = connected_harness().await;

    h.transports.latest().unwrap().emit_closed(codes::CONNECTION_CLOSED);
    h.manager.flush().await;
    elapse(&h, 3001).await;

    h.transports.latest().unwrap().emit_authenticated(IDENTITY);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Connected);
    assert_eq!(state.attempts, 0);
    assert!(!state.reconnecting);
}

#[tokio::test(start_paused = true)]
async fn transient_closes_before_authentication_are_bounded_too() {
    let h = create_harness();
    h.manager.connect().await;

    for attempt in 1..=3u32 {
        h.transports.latest().unwrap().emit_closed(codes::CONNECTION_CLOSED);
        h.manager.flush().await;

        let state = h.manager.state().await;
        assert_eq!(state.phase, SessionPhase::Reconnecting);
        assert_eq!(state.attempts, attempt);
        assert!(state.identity.is_none());

        elapse(&h, 3001).await;
    }

    h.transports.latest().unwrap().emit_closed(codes::CONNECTION_CLOSED);
    h.manager.flush().await;
    elapse(&h, 10_000).await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Terminated);
    assert_eq!(state.last_error.as_deref(), Some(MAX_ATTEMPTS_ERROR));
    assert_eq!(h.transports.opened_count(), 4);
}

// ==================== Terminal Closes ====================

#[tokio::test]
async fn terminal_close_while_awaiting_pairing_terminates() {
    let h = create_harness();
    h.manager.connect().await;
    let handle = h.transports.latest().unwrap();
    handle.emit_pairing(b"XYZ");

    handle.emit_closed(codes::LOGGED_OUT);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Terminated);
    assert!(state.pairing_artifact.is_none());
    assert!(!state.transport_active);
    assert!(state.last_error.as_deref().unwrap().contains("401"));
    assert!(!handle.credentials_path().exists());
}

#[tokio::test(start_paused = true)]
async fn terminal_close_while_reconnecting_terminates() {
    let h = connected_harness().await;
    h.transports.latest().unwrap().emit_closed(codes::CONNECTION_LOST);
    h.manager.flush().await;
    elapse(&h, 3001).await;

    let reopened = h.transports.latest().unwrap();
    assert_eq!(h.transports.opened_count(), 2);
    assert_eq!(h.manager.state().await.phase, SessionPhase::Reconnecting);

    reopened.emit_closed(codes::CONNECTION_REPLACED);
    h.manager.flush().await;

    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Terminated);
    assert!(!state.reconnecting);
    assert!(!reopened.credentials_path().exists());
    match h.notifier.last() {
        Some(NotificationEvent::SessionStatus(status)) => {
            assert!(!status.connected);
            assert!(status.error.as_deref().unwrap().contains("440"));
        }
        other => panic!("expected session-status, got {other:?}"),
    }

    elapse(&h, 10_000).await;
    assert_eq!(h.transports.opened_count(), 2);
}

// ==================== Cancellation ====================

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnection() {
    let h = connected_harness().await;
    h.transports.latest().unwrap().emit_closed(codes::CONNECTION_LOST);
    h.manager.flush().await;
    assert_eq!(h.manager.state().await.phase, SessionPhase::Reconnecting);

    h.manager.disconnect().await;
    elapse(&h, 10_000).await;

    assert_eq!(h.transports.opened_count(), 1);
    let state = h.manager.state().await;
    assert_eq!(state.phase, SessionPhase::Idle);
    assert!(!state.transport_active);
}

#[tokio::test(start_paused = true)]
async fn stale_timer_does_not_touch_new_session() {
    let h = connected_harness().await;
    h.transports.latest().unwrap().emit_closed(codes::RESTART_REQUIRED);
    h.manager.flush().await;

    let response = h.manager.connect().await;
    elapse(&h, 5000).await;

    assert_eq!(h.transports.opened_count(), 2);
    let latest = h.transports.latest().unwrap();
    assert_eq!(latest.session_id(), response.session_id());
    assert!(!latest.is_closed());
}

// ==================== Idempotence & Uniqueness ====================

#[tokio::test]
async fn disconnect_twice_matches_disconnect_once() {
    let h = connected_harness().await;

    h.manager.disconnect().await;
    let once = h.manager.state().await;
    let events_after_once = h.notifier.len();

    h.manager.disconnect().await;
    let twice = h.manager.state().await;

    assert_eq!(once, twice);
    assert!(h.notifier.len() - events_after_once <= 1);
    for event in h.notifier.events_for("u1") {
        match event {
            NotificationEvent::SessionStatus(status) => assert!(!status.connected),
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn every_connect_gets_a_fresh_session_id() {
    let h = create_harness();
    let mut seen = std::collections::HashSet::new();

    for _ in 0..10 {
        let response = h.manager.connect().await;
        assert!(seen.insert(response.session_id().to_string()));
    }

    // Only the latest transport is still open
    let handles = h.transports.handles();
    assert!(handles[..9].iter().all(|handle| handle.is_closed()));
    assert!(!handles[9].is_closed());
}

#[tokio::test]
async fn connect_response_serializes_for_http_layer() {
    let h = create_harness();
    let response = h.manager.connect().await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["connected"], false);
    assert_eq!(json["data"]["sessionId"], response.session_id());
    assert!(json["data"]["pairingArtifact"].is_null());
    assert!(json["data"]["message"].is_string());
}
