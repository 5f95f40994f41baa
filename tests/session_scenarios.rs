//! Session engine integration tests
//!
//! Drives a real engine through the client event contract: join, edit,
//! lock, disconnect cascades, and the ordering/idempotence guarantees.

use assert_matches::assert_matches;
use cosync::backend::engine::Engine;
use cosync::backend::session::SessionKey;
use cosync::shared::config::EngineConfig;
use cosync::shared::error::EngineError;
use cosync::shared::event::{ClientEvent, ServerEvent};
use cosync::shared::operation::EditOperation;
use cosync::shared::user::UserIdentity;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

fn user(name: &str) -> UserIdentity {
    UserIdentity::new(Uuid::new_v4(), name)
}

fn join(document_id: &str) -> ClientEvent {
    ClientEvent::JoinDocument {
        document_type: "quote".to_string(),
        document_id: document_id.to_string(),
    }
}

fn submit(document_id: &str, operation: EditOperation, revision: u64) -> ClientEvent {
    ClientEvent::DocumentOperation {
        document_type: "quote".to_string(),
        document_id: document_id.to_string(),
        operation,
        revision,
    }
}

/// Receive events until one matches, skipping unrelated traffic
/// (presence fan-out interleaves with session events).
async fn recv_until<F>(rx: &mut UnboundedReceiver<ServerEvent>, mut pred: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn scenario_a_insert_into_empty_document() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let (conn, mut rx) = engine.connect(alice.clone()).await;

    engine.handle_event(conn, join("D1")).await.unwrap();
    let snapshot = recv_until(&mut rx, |e| matches!(e, ServerEvent::DocumentState { .. })).await;
    match snapshot {
        ServerEvent::DocumentState { state, participants, .. } => {
            assert_eq!(state.revision, 0);
            assert!(state.content.is_empty());
            assert_eq!(participants.len(), 1);
        }
        _ => unreachable!(),
    }

    let operation = EditOperation::insert(alice.id, "body", 0, "hello");
    let operation_id = operation.id;
    engine.handle_event(conn, submit("D1", operation, 0)).await.unwrap();

    let ack = recv_until(&mut rx, |e| matches!(e, ServerEvent::OperationAck { .. })).await;
    match ack {
        ServerEvent::OperationAck { operation_id: id, revision } => {
            assert_eq!(id, operation_id);
            assert_eq!(revision, 1);
        }
        _ => unreachable!(),
    }

    // A second participant's snapshot shows the applied content.
    let (bob_conn, mut bob_rx) = engine.connect(user("bob")).await;
    engine.handle_event(bob_conn, join("D1")).await.unwrap();
    let snapshot = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentState { .. })).await;
    match snapshot {
        ServerEvent::DocumentState { state, .. } => {
            assert_eq!(state.field_text("body"), "hello");
            assert_eq!(state.revision, 1);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn revision_increases_by_one_per_accepted_operation() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let (conn, mut rx) = engine.connect(alice.clone()).await;
    engine.handle_event(conn, join("D1")).await.unwrap();

    for expected in 1..=5u64 {
        let operation = EditOperation::update(alice.id, "counter", expected.to_string(), None);
        engine
            .handle_event(conn, submit("D1", operation, expected - 1))
            .await
            .unwrap();
        let ack = recv_until(&mut rx, |e| matches!(e, ServerEvent::OperationAck { .. })).await;
        match ack {
            ServerEvent::OperationAck { revision, .. } => assert_eq!(revision, expected),
            _ => unreachable!(),
        }
    }
}

#[tokio::test]
async fn duplicate_operation_id_is_not_double_applied() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let bob = user("bob");
    let (alice_conn, mut alice_rx) = engine.connect(alice.clone()).await;
    let (bob_conn, mut bob_rx) = engine.connect(bob).await;
    engine.handle_event(alice_conn, join("D1")).await.unwrap();
    engine.handle_event(bob_conn, join("D1")).await.unwrap();

    let operation = EditOperation::insert(alice.id, "body", 0, "once");
    engine
        .handle_event(alice_conn, submit("D1", operation.clone(), 0))
        .await
        .unwrap();
    engine
        .handle_event(alice_conn, submit("D1", operation.clone(), 0))
        .await
        .unwrap();

    // Both submissions are acknowledged with the same revision.
    for _ in 0..2 {
        let ack = recv_until(&mut alice_rx, |e| matches!(e, ServerEvent::OperationAck { .. })).await;
        match ack {
            ServerEvent::OperationAck { revision, .. } => assert_eq!(revision, 1),
            _ => unreachable!(),
        }
    }

    // Bob sees the operation exactly once: the next document operation he
    // receives after it is the sentinel, not a replay.
    let first = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentOperation { .. })).await;
    match first {
        ServerEvent::DocumentOperation { operation: op, revision, .. } => {
            assert_eq!(op.id, operation.id);
            assert_eq!(revision, 1);
        }
        _ => unreachable!(),
    }

    let sentinel = EditOperation::update(alice.id, "marker", "end", None);
    let sentinel_id = sentinel.id;
    engine
        .handle_event(alice_conn, submit("D1", sentinel, 1))
        .await
        .unwrap();
    let second = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentOperation { .. })).await;
    match second {
        ServerEvent::DocumentOperation { operation: op, .. } => assert_eq!(op.id, sentinel_id),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn stale_submission_is_rejected_not_queued() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let (conn, mut rx) = engine.connect(alice.clone()).await;
    engine.handle_event(conn, join("D1")).await.unwrap();

    for i in 0..4u64 {
        let operation = EditOperation::update(alice.id, "body", i.to_string(), None);
        engine.handle_event(conn, submit("D1", operation, i)).await.unwrap();
    }

    let stale = EditOperation::update(alice.id, "body", "late", None);
    let stale_id = stale.id;
    engine.handle_event(conn, submit("D1", stale, 1)).await.unwrap();

    let error = recv_until(&mut rx, |e| matches!(e, ServerEvent::OperationError { .. })).await;
    match error {
        ServerEvent::OperationError { operation_id, error } => {
            assert_eq!(operation_id, Some(stale_id));
            assert_matches!(error, EngineError::StaleRevision { current: 4, .. });
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn scenario_c_lock_conflict_and_release_on_disconnect() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let bob = user("bob");
    let (alice_conn, _alice_rx) = engine.connect(alice.clone()).await;
    let (bob_conn, mut bob_rx) = engine.connect(bob.clone()).await;
    engine.handle_event(alice_conn, join("D1")).await.unwrap();
    engine.handle_event(bob_conn, join("D1")).await.unwrap();

    let lock = ClientEvent::DocumentLock {
        document_type: "quote".to_string(),
        document_id: "D1".to_string(),
    };

    // Alice takes the lock; bob observes it.
    engine.handle_event(alice_conn, lock.clone()).await.unwrap();
    let locked = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentLocked { .. })).await;
    match locked {
        ServerEvent::DocumentLocked { user_id, .. } => assert_eq!(user_id, alice.id),
        _ => unreachable!(),
    }

    // Bob's request is refused while alice holds it.
    let err = engine.handle_event(bob_conn, lock.clone()).await.unwrap_err();
    assert_eq!(err, EngineError::LockConflict { holder: Some(alice.id) });

    // Alice disconnecting releases the lock automatically.
    engine.disconnect(alice_conn).await;
    recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentUnlocked { .. })).await;

    engine.handle_event(bob_conn, lock).await.unwrap();
}

#[tokio::test]
async fn enforced_lock_rejects_non_holder_operations() {
    let mut config = EngineConfig::default();
    config.enforce_lock = true;
    let engine = Engine::new(config);

    let alice = user("alice");
    let bob = user("bob");
    let (alice_conn, _alice_rx) = engine.connect(alice.clone()).await;
    let (bob_conn, mut bob_rx) = engine.connect(bob.clone()).await;
    engine.handle_event(alice_conn, join("D1")).await.unwrap();
    engine.handle_event(bob_conn, join("D1")).await.unwrap();

    engine
        .handle_event(
            alice_conn,
            ClientEvent::DocumentLock {
                document_type: "quote".to_string(),
                document_id: "D1".to_string(),
            },
        )
        .await
        .unwrap();
    recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentLocked { .. })).await;

    let operation = EditOperation::update(bob.id, "title", "mine now", None);
    engine.handle_event(bob_conn, submit("D1", operation, 0)).await.unwrap();
    let error = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::OperationError { .. })).await;
    match error {
        ServerEvent::OperationError { error, .. } => {
            assert!(matches!(error, EngineError::LockConflict { .. }))
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn participant_and_presence_views_stay_consistent() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let bob = user("bob");
    let key = SessionKey::new("quote", "D1");
    let (alice_conn, _alice_rx) = engine.connect(alice.clone()).await;
    let (bob_conn, mut bob_rx) = engine.connect(bob.clone()).await;

    engine.handle_event(alice_conn, join("D1")).await.unwrap();
    engine.handle_event(bob_conn, join("D1")).await.unwrap();

    let snapshot = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentState { .. })).await;
    match snapshot {
        ServerEvent::DocumentState { participants, state, .. } => {
            assert_eq!(participants.len(), 2);
            assert_eq!(state.active_users.len(), 2);
        }
        _ => unreachable!(),
    }
    let doc_users = engine.presence().document_users(&key).await;
    assert!(doc_users.contains(&alice.id) && doc_users.contains(&bob.id));

    // Leaving removes alice from the participant set and the presence view
    // together.
    engine
        .handle_event(
            alice_conn,
            ClientEvent::LeaveDocument {
                document_type: "quote".to_string(),
                document_id: "D1".to_string(),
            },
        )
        .await
        .unwrap();
    let left = recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::UserLeftDocument { .. })).await;
    match left {
        ServerEvent::UserLeftDocument { user_id, .. } => assert_eq!(user_id, alice.id),
        _ => unreachable!(),
    }
    let doc_users = engine.presence().document_users(&key).await;
    assert!(!doc_users.contains(&alice.id));
    assert!(doc_users.contains(&bob.id));
}

#[tokio::test]
async fn status_delta_reaches_other_participants_only() {
    let engine = Engine::new(EngineConfig::default());
    let alice = user("alice");
    let bob = user("bob");
    let (alice_conn, mut alice_rx) = engine.connect(alice.clone()).await;
    let (bob_conn, mut bob_rx) = engine.connect(bob).await;
    engine.handle_event(alice_conn, join("D1")).await.unwrap();
    engine.handle_event(bob_conn, join("D1")).await.unwrap();
    recv_until(&mut bob_rx, |e| matches!(e, ServerEvent::DocumentState { .. })).await;

    engine
        .handle_event(
            alice_conn,
            ClientEvent::UpdateStatus {
                document_type: "quote".to_string(),
                document_id: "D1".to_string(),
                status: Some(cosync::shared::user::ParticipantStatus::Editing),
                cursor: None,
            },
        )
        .await
        .unwrap();

    let changed = recv_until(&mut bob_rx, |e| {
        matches!(e, ServerEvent::ParticipantStatusChanged { .. })
    })
    .await;
    match changed {
        ServerEvent::ParticipantStatusChanged { user_id, changes, .. } => {
            assert_eq!(user_id, alice.id);
            assert_eq!(
                changes.status,
                Some(cosync::shared::user::ParticipantStatus::Editing)
            );
        }
        _ => unreachable!(),
    }

    // The originator gets no echo of its own delta.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    while let Ok(event) = alice_rx.try_recv() {
        assert!(!matches!(event, ServerEvent::ParticipantStatusChanged { .. }));
    }
}
