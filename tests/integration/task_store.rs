//! Integration tests for the optimistic task store.
//!
//! Covers the store operations end to end against both backends, the
//! keep-and-retry reconciliation policy, and remote list merging.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use std::sync::Arc;
use std::time::Duration;

use tasklist::persist::{FileBackend, InMemoryBackend, TaskBackend, WriteKind};
use tasklist::tasks::{StoreConfig, StoreEvent, SyncState, TaskError, TaskStore};
use tasklist_proto::session::{Session, User};
use tasklist_proto::task::{Task, TaskChanges, TaskId, TaskStatus, ValidationError};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn signed_in() -> Session {
    Session::SignedIn(User::new("Alice", "alice@example.com"))
}

struct Harness<B: TaskBackend + 'static> {
    store: TaskStore,
    events: tokio::sync::mpsc::Receiver<StoreEvent>,
    session: watch::Sender<Session>,
    backend: Arc<B>,
}

fn harness<B: TaskBackend + 'static>(backend: B) -> Harness<B> {
    let backend = Arc::new(backend);
    let (session, rx) = watch::channel(signed_in());
    let (store, events) = TaskStore::new(Arc::clone(&backend), rx, &StoreConfig::default());
    Harness {
        store,
        events,
        session,
        backend,
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_then_list_contains_exactly_one_task() {
    let h = harness(InMemoryBackend::new());
    h.store.add_task("Buy milk").unwrap();

    let tasks = h.store.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Buy milk");
    assert_eq!(tasks[0].status, TaskStatus::Todo);
    assert_eq!(tasks[0].description, "");
}

#[tokio::test]
async fn list_order_is_insertion_order_across_mutations() {
    let h = harness(InMemoryBackend::new());
    let a = h.store.add_task("a").unwrap();
    let b = h.store.add_task("b").unwrap();
    let c = h.store.add_task("c").unwrap();
    h.store.toggle_task_status(&a.id).unwrap();
    h.store.change_task(&b.id, TaskChanges::title("B")).unwrap();
    h.store.remove_task(&b.id).unwrap();

    let ids: Vec<TaskId> = h.store.tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a.id, c.id]);
}

#[tokio::test]
async fn toggle_twice_restores_status() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("x").unwrap();
    h.store.toggle_task_status(&task.id).unwrap();
    let back = h.store.toggle_task_status(&task.id).unwrap();
    assert_eq!(back.status, TaskStatus::Todo);

    h.store.flush().await;
    assert_eq!(h.backend.stored()[0].status, TaskStatus::Todo);
}

#[tokio::test]
async fn change_task_preserves_identity() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("before").unwrap();
    let changed = h.store.change_task(&task.id, TaskChanges::title("X")).unwrap();
    assert_eq!(changed.id, task.id);
    assert_eq!(changed.status, task.status);
    assert_eq!(changed.title, "X");
}

#[tokio::test]
async fn change_task_description_only_keeps_title() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("title").unwrap();
    let changed = h
        .store
        .change_task(&task.id, TaskChanges::description("details"))
        .unwrap();
    assert_eq!(changed.title, "title");
    assert_eq!(changed.description, "details");

    h.store.flush().await;
    assert_eq!(h.backend.stored()[0].description, "details");
}

#[tokio::test]
async fn every_operation_fails_after_remove() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("gone").unwrap();
    h.store.remove_task(&task.id).unwrap();

    let not_found = TaskError::NotFound(task.id.clone());
    assert_eq!(h.store.toggle_task_status(&task.id), Err(not_found.clone()));
    assert_eq!(
        h.store.change_task(&task.id, TaskChanges::title("y")),
        Err(not_found.clone())
    );
    assert_eq!(h.store.remove_task(&task.id), Err(not_found));
}

#[tokio::test]
async fn missing_task_is_reported_before_invalid_title() {
    let h = harness(InMemoryBackend::new());
    let id = TaskId::new();
    assert_eq!(
        h.store.change_task(&id, TaskChanges::title("")),
        Err(TaskError::NotFound(id.clone()))
    );
}

#[tokio::test]
async fn whitespace_title_is_validation_error() {
    let h = harness(InMemoryBackend::new());
    assert_eq!(
        h.store.add_task(" \t\n"),
        Err(TaskError::Validation(ValidationError::Empty))
    );
}

#[tokio::test]
async fn session_gating_has_no_effect_on_collection() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("kept").unwrap();
    h.store.flush().await;
    let writes = h.backend.completed_writes();

    for session in [Session::Unknown, Session::SignedOut] {
        h.session.send_replace(session);
        assert_eq!(h.store.add_task("new"), Err(TaskError::Unauthorized));
        assert_eq!(
            h.store.toggle_task_status(&task.id),
            Err(TaskError::Unauthorized)
        );
        assert_eq!(
            h.store.change_task(&task.id, TaskChanges::title("z")),
            Err(TaskError::Unauthorized)
        );
        assert_eq!(h.store.remove_task(&task.id), Err(TaskError::Unauthorized));
        assert_eq!(h.store.tasks(), vec![task.clone()]);
    }

    h.store.flush().await;
    assert_eq!(h.backend.completed_writes(), writes);
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn optimistic_change_is_visible_before_write_completes() {
    let h = harness(InMemoryBackend::new());
    let mut rx = h.store.watch();
    let task = h.store.add_task("instant").unwrap();

    // No await between add and read: the writer has not run yet.
    let views = rx.borrow_and_update().clone();
    assert_eq!(views[0].task, task);
    assert_eq!(views[0].sync, SyncState::Pending);
    assert!(h.backend.stored().is_empty());
}

#[tokio::test]
async fn persistence_failure_is_reported_against_the_task() {
    let mut h = harness(InMemoryBackend::new());
    let task = h.store.add_task("x").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.toggle_task_status(&task.id).unwrap();
    h.store.flush().await;

    assert_eq!(h.store.get(&task.id).unwrap().status, TaskStatus::Done);
    match h.events.recv().await.unwrap() {
        StoreEvent::PersistenceFailed { task_id, op, reason } => {
            assert_eq!(task_id, task.id);
            assert_eq!(op, WriteKind::Update);
            assert!(reason.contains("unavailable"));
        }
        other => panic!("expected PersistenceFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_task_eventually_persists_failed_writes() {
    let h = harness(InMemoryBackend::new());
    h.backend.set_failing(true);
    let task = h.store.add_task("offline").unwrap();
    h.store.flush().await;
    assert_eq!(h.store.failed_writes(), 1);

    let _retry = h.store.spawn_retry_task(Duration::from_millis(10));
    h.backend.set_failing(false);

    let mut rx = h.store.watch();
    tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|views| views.iter().all(|v| v.sync.is_clean())),
    )
    .await
    .expect("retry did not converge")
    .unwrap();

    assert_eq!(h.backend.stored(), vec![task]);
    assert_eq!(h.store.failed_writes(), 0);
}

#[tokio::test]
async fn delete_failure_keeps_task_removed_locally() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("x").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.remove_task(&task.id).unwrap();
    h.store.flush().await;
    assert!(h.store.is_empty());
    assert_eq!(h.store.failed_writes(), 1);

    h.backend.set_failing(false);
    h.store.retry_failed();
    h.store.flush().await;
    assert!(h.backend.stored().is_empty());
}

#[tokio::test]
async fn retry_after_newer_successful_write_keeps_newest_value() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("orig").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.change_task(&task.id, TaskChanges::title("A")).unwrap();
    h.store.flush().await;
    h.backend.set_failing(false);
    h.store.change_task(&task.id, TaskChanges::title("B")).unwrap();
    h.store.flush().await;
    assert!(matches!(
        h.store.sync_state(&task.id),
        Some(SyncState::Failed(_))
    ));

    h.store.retry_failed();
    h.store.flush().await;

    assert_eq!(h.store.get(&task.id).unwrap().title, "B");
    assert_eq!(h.backend.stored(), h.store.tasks());
    assert_eq!(h.store.sync_state(&task.id), Some(SyncState::Clean));
    assert_eq!(h.store.failed_writes(), 0);
}

#[tokio::test]
async fn failed_delete_survives_remote_snapshot_then_completes() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("doomed").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.remove_task(&task.id).unwrap();
    h.store.flush().await;
    assert_eq!(h.store.failed_writes(), 1);

    // The backend still lists the task.
    let summary = h.store.apply_remote(&h.backend.stored());
    assert!(summary.is_empty());
    assert!(h.store.get(&task.id).is_none());

    h.backend.set_failing(false);
    h.store.retry_failed();
    h.store.flush().await;
    assert!(h.backend.stored().is_empty());
    assert!(h.store.is_empty());
    assert_eq!(h.store.failed_writes(), 0);
}

#[tokio::test]
async fn pending_delete_survives_remote_snapshot() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("doomed").unwrap();
    h.store.flush().await;

    // No await between remove and merge: the delete is still queued.
    h.store.remove_task(&task.id).unwrap();
    assert!(h.store.apply_remote(&[task.clone()]).is_empty());
    assert!(h.store.get(&task.id).is_none());

    h.store.flush().await;
    assert!(h.backend.stored().is_empty());
}

#[tokio::test]
async fn retried_delete_already_gone_from_backend_is_settled() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("x").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.remove_task(&task.id).unwrap();
    h.store.flush().await;
    h.backend.set_failing(false);

    // Another client removes it first.
    h.backend.delete(&task.id).await.unwrap();
    assert_eq!(h.store.retry_failed(), 1);
    h.store.flush().await;
    assert_eq!(h.store.failed_writes(), 0);
}

// ---------------------------------------------------------------------------
// Backends and remote sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_backend_round_trips_store_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.bin");

    let h = harness(FileBackend::new(&path));
    let a = h.store.add_task("a").unwrap();
    let b = h.store.add_task("b").unwrap();
    h.store.toggle_task_status(&b.id).unwrap();
    h.store.change_task(&a.id, TaskChanges::description("notes")).unwrap();
    h.store.flush().await;

    let reopened = FileBackend::new(&path);
    let loaded = reopened.list().await.unwrap();
    assert_eq!(loaded, h.store.tasks());

    let h2 = harness(reopened);
    h2.store.hydrate(loaded.clone());
    assert_eq!(h2.store.tasks(), loaded);
}

#[tokio::test]
async fn remote_list_feed_is_merged() {
    let mut h = harness(InMemoryBackend::with_list_feed());
    let feed = h.backend.subscribe_list().unwrap();
    let _listener = h.store.spawn_remote_listener(feed);

    let local = h.store.add_task("local").unwrap();
    h.store.flush().await;

    let mut remote_done = local.clone();
    remote_done.status = TaskStatus::Done;
    let from_elsewhere = Task::new("from another client");
    h.backend
        .push_remote(vec![remote_done.clone(), from_elsewhere.clone()])
        .await;

    let event = tokio::time::timeout(Duration::from_secs(2), h.events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        StoreEvent::RemoteMerged(summary) => {
            assert_eq!(summary.added, 1);
            assert_eq!(summary.updated, 1);
        }
        other => panic!("expected RemoteMerged, got {other:?}"),
    }
    assert_eq!(h.store.tasks(), vec![remote_done, from_elsewhere]);
}

#[tokio::test]
async fn remote_list_does_not_clobber_unconfirmed_local_change() {
    let h = harness(InMemoryBackend::new());
    let task = h.store.add_task("x").unwrap();
    h.store.flush().await;

    h.backend.set_failing(true);
    h.store.toggle_task_status(&task.id).unwrap();
    h.store.flush().await;

    // The remote still has the old status.
    let summary = h.store.apply_remote(&[task.clone()]);
    assert!(summary.is_empty());
    assert_eq!(h.store.get(&task.id).unwrap().status, TaskStatus::Done);
}
