//! Integration tests for the assembled client.
//!
//! Starts `App` with the in-process identity provider and drives it the
//! way a UI would: intents in, snapshots and events out.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tasklist::app::{App, AppConfig};
use tasklist::auth::InMemoryAuthProvider;
use tasklist::edit::{CommitOutcome, EditForm};
use tasklist::persist::{FileBackend, InMemoryBackend};
use tasklist::tasks::{StoreEvent, SyncState, TaskError};
use tasklist_proto::session::{Session, User};
use tasklist_proto::task::{Task, TaskStatus};

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "hunter2";

fn provider() -> Arc<InMemoryAuthProvider> {
    Arc::new(InMemoryAuthProvider::new().with_account(EMAIL, PASSWORD, Some("Alice")))
}

async fn start(backend: Arc<InMemoryBackend>) -> App<InMemoryAuthProvider> {
    App::start(provider(), backend, &AppConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn full_session_walkthrough() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = start(Arc::clone(&backend)).await;
    assert_eq!(app.wait_until_known().await, Session::SignedOut);

    assert_eq!(app.add_task("too early"), Err(TaskError::Unauthorized));

    app.sign_in(EMAIL, PASSWORD).await.unwrap();
    let milk = app.add_task("Buy milk").unwrap();
    let dog = app.add_task("Walk dog").unwrap();
    app.toggle_task_status(&dog.id).unwrap();

    app.open_edit(&milk.id).unwrap();
    app.commit_edit(EditForm::new("Buy oat milk", "2 litres"))
        .unwrap();

    let snap = app.snapshot();
    assert_eq!(snap.edit_selection, None);
    assert_eq!(snap.add_error, None);
    assert_eq!(snap.tasks.len(), 2);
    assert_eq!(snap.tasks[0].task.title, "Buy oat milk");
    assert_eq!(snap.tasks[1].task.status, TaskStatus::Done);

    app.sign_out().await.unwrap();
    assert_eq!(app.session(), Session::SignedOut);
    assert_eq!(app.toggle_task_status(&dog.id), Err(TaskError::Unauthorized));

    app.shutdown().await;
    let stored = backend.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].description, "2 litres");
}

#[tokio::test]
async fn restored_provider_session_enables_intents() {
    let p = provider();
    p.restore_session(User::new("Alice", EMAIL)).await;
    let app = App::start(p, Arc::new(InMemoryBackend::new()), &AppConfig::default())
        .await
        .unwrap();

    assert!(app.wait_until_known().await.is_signed_in());
    assert!(app.add_task("no explicit sign-in").is_ok());
}

#[tokio::test]
async fn watchers_observe_changes() {
    let app = start(Arc::new(InMemoryBackend::new())).await;
    let mut sessions = app.watch_session();
    let mut tasks = app.watch_tasks();

    app.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert!(sessions.borrow_and_update().is_signed_in());

    let task = app.add_task("watched").unwrap();
    tokio::time::timeout(Duration::from_secs(2), tasks.wait_for(|v| v.len() == 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tasks.borrow()[0].task, task);
}

#[tokio::test]
async fn backend_failure_surfaces_as_event_and_recovers() {
    let backend = Arc::new(InMemoryBackend::new());
    let config = AppConfig {
        retry_interval: Duration::from_secs(3600),
        ..AppConfig::default()
    };
    let app = App::start(provider(), Arc::clone(&backend), &config)
        .await
        .unwrap();
    app.sign_in(EMAIL, PASSWORD).await.unwrap();

    backend.set_failing(true);
    let task = app.add_task("offline").unwrap();
    app.flush().await;

    let events = app.drain_events();
    assert!(matches!(
        events.as_slice(),
        [StoreEvent::PersistenceFailed { task_id, .. }] if *task_id == task.id
    ));
    assert!(matches!(app.snapshot().tasks[0].sync, SyncState::Failed(_)));

    backend.set_failing(false);
    assert_eq!(app.retry_failed(), 1);
    app.flush().await;
    assert_eq!(app.snapshot().tasks[0].sync, SyncState::Clean);
    assert_eq!(backend.stored(), vec![task]);
}

#[tokio::test]
async fn remote_feed_is_wired_at_start() {
    let backend = Arc::new(InMemoryBackend::with_list_feed());
    let app = start(Arc::clone(&backend)).await;
    let mut tasks = app.watch_tasks();

    let remote = Task::new("from another device");
    backend.push_remote(vec![remote.clone()]).await;

    tokio::time::timeout(Duration::from_secs(2), tasks.wait_for(|v| v.len() == 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.store().tasks(), vec![remote]);
    assert!(matches!(
        app.drain_events().as_slice(),
        [StoreEvent::RemoteMerged(_)]
    ));
}

#[tokio::test]
async fn remote_removal_of_selected_task_closes_edit() {
    let backend = Arc::new(InMemoryBackend::with_list_feed());
    let app = start(Arc::clone(&backend)).await;
    app.sign_in(EMAIL, PASSWORD).await.unwrap();
    let task = app.add_task("edited here, deleted elsewhere").unwrap();
    app.flush().await;
    app.open_edit(&task.id).unwrap();

    let mut tasks = app.watch_tasks();
    backend.push_remote(Vec::new()).await;
    tokio::time::timeout(Duration::from_secs(2), tasks.wait_for(Vec::is_empty))
        .await
        .unwrap()
        .unwrap();

    let snap = app.snapshot();
    assert!(snap.tasks.is_empty());
    assert_eq!(snap.edit_selection, None);
    assert_eq!(app.commit_edit_buffer(), Ok(CommitOutcome::Ignored));
}

#[tokio::test]
async fn direct_merge_of_stale_list_closes_edit() {
    let app = start(Arc::new(InMemoryBackend::new())).await;
    app.sign_in(EMAIL, PASSWORD).await.unwrap();
    let task = app.add_task("x").unwrap();
    app.flush().await;
    app.open_edit(&task.id).unwrap();

    app.store().apply_remote(&[]);
    assert_eq!(app.snapshot().edit_selection, None);
}

#[tokio::test]
async fn tasks_survive_restart_with_file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.bin");

    let app = App::start(
        provider(),
        Arc::new(FileBackend::new(&path)),
        &AppConfig::default(),
    )
    .await
    .unwrap();
    app.sign_in(EMAIL, PASSWORD).await.unwrap();
    let task = app.add_task("durable").unwrap();
    app.toggle_task_status(&task.id).unwrap();
    app.shutdown().await;

    let app = App::start(
        provider(),
        Arc::new(FileBackend::new(&path)),
        &AppConfig::default(),
    )
    .await
    .unwrap();
    let tasks = app.store().tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task.id);
    assert_eq!(tasks[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn shutdown_unsubscribes_from_provider() {
    let p = provider();
    let app = App::start(
        Arc::clone(&p),
        Arc::new(InMemoryBackend::new()),
        &AppConfig::default(),
    )
    .await
    .unwrap();
    app.wait_until_known().await;
    assert_eq!(p.subscriber_count(), 1);

    app.shutdown().await;
    while p.subscriber_count() > 0 {
        tokio::task::yield_now().await;
    }
}
