//! Process-wide client state and the presentation boundary.
//!
//! [`App::start`] is called once, before any intent is accepted. It builds
//! the session machine and task store, subscribes to the identity provider,
//! loads persisted tasks and starts the background listeners. Every UI
//! intent then goes through an `App` method, and the UI renders from
//! [`App::snapshot`] or the watch receivers. [`App::shutdown`] flushes
//! outstanding writes and tears the listeners down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tasklist_proto::session::{Session, User};
use tasklist_proto::task::{Task, TaskChanges, TaskId};
use tokio::sync::{mpsc, watch};

use crate::add::AddTaskController;
use crate::auth::{AuthProvider, SessionError, SessionStateMachine};
use crate::edit::{CommitOutcome, EditForm, EditSessionController};
use crate::persist::{PersistError, TaskBackend};
use crate::subscription::Subscription;
use crate::tasks::{StoreConfig, StoreEvent, TaskError, TaskStore, TaskView};

/// Settings for [`App::start`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Task store tunables.
    pub store: StoreConfig,
    /// Period of the failed-write retry task.
    pub retry_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// Everything a UI needs to render one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Current session.
    pub session: Session,
    /// Tasks in list order with their sync state.
    pub tasks: Vec<TaskView>,
    /// Task currently open for editing.
    pub edit_selection: Option<TaskId>,
    /// Error from the last failed add, if any.
    pub add_error: Option<String>,
}

/// The wired-up client.
pub struct App<P: AuthProvider + 'static> {
    session: Arc<SessionStateMachine<P>>,
    store: TaskStore,
    edit: Arc<Mutex<EditSessionController>>,
    add: Mutex<AddTaskController>,
    events: Mutex<mpsc::Receiver<StoreEvent>>,
    /// Background tasks, stopped on shutdown or drop.
    listeners: Vec<Subscription>,
}

impl<P: AuthProvider + 'static> App<P> {
    /// Builds the client, subscribes to `provider` and loads the task list
    /// from `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the initial task list cannot be read.
    pub async fn start<B: TaskBackend + 'static>(
        provider: Arc<P>,
        backend: Arc<B>,
        config: &AppConfig,
    ) -> Result<Self, PersistError> {
        let session = Arc::new(SessionStateMachine::new(provider));
        let mut listeners = vec![session.start()];

        let (store, events) = TaskStore::new(Arc::clone(&backend), session.watch(), &config.store);
        store.hydrate(backend.list().await?);
        if let Some(feed) = backend.subscribe_list() {
            listeners.push(store.spawn_remote_listener(feed));
        }
        listeners.push(store.spawn_retry_task(config.retry_interval));
        let edit = Arc::new(Mutex::new(EditSessionController::new()));
        listeners.push(spawn_edit_guard(store.clone(), Arc::clone(&edit)));

        tracing::info!(tasks = store.len(), "client started");
        Ok(Self {
            session,
            store,
            edit,
            add: Mutex::new(AddTaskController::new(config.store.max_title_len)),
            events: Mutex::new(events),
            listeners,
        })
    }

    /// Current state for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session: self.session.session(),
            tasks: self.store.views(),
            edit_selection: self.edit().selection().cloned(),
            add_error: self.add.lock().error().map(ToString::to_string),
        }
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.session()
    }

    /// Observes session changes.
    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.watch()
    }

    /// Observes task list changes.
    #[must_use]
    pub fn watch_tasks(&self) -> watch::Receiver<Vec<TaskView>> {
        self.store.watch()
    }

    /// The underlying task store.
    #[must_use]
    pub const fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Returns every store event received since the last call.
    pub fn drain_events(&self) -> Vec<StoreEvent> {
        let mut rx = self.events.lock();
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// Waits for the identity provider's first notification.
    pub async fn wait_until_known(&self) -> Session {
        self.session.wait_until_known().await
    }

    /// Signs in with an email/password credential.
    ///
    /// # Errors
    ///
    /// See [`SessionStateMachine::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, SessionError> {
        self.session.sign_in(email, password).await
    }

    /// Signs out.
    ///
    /// # Errors
    ///
    /// See [`SessionStateMachine::sign_out`].
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.session.sign_out().await
    }

    /// Submits `title` through the add controller.
    ///
    /// # Errors
    ///
    /// See [`AddTaskController::submit`].
    pub fn add_task(&self, title: &str) -> Result<Task, TaskError> {
        let mut add = self.add.lock();
        add.set_input(title);
        add.submit(&self.store)
    }

    /// Flips a task between `Todo` and `Done`.
    ///
    /// # Errors
    ///
    /// See [`TaskStore::toggle_task_status`].
    pub fn toggle_task_status(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.store.toggle_task_status(id)
    }

    /// Changes a task's title and/or description directly.
    ///
    /// # Errors
    ///
    /// See [`TaskStore::change_task`].
    pub fn change_task(&self, id: &TaskId, changes: TaskChanges) -> Result<Task, TaskError> {
        self.store.change_task(id, changes)
    }

    /// Removes a task, closing the edit if it was the one selected.
    ///
    /// # Errors
    ///
    /// See [`TaskStore::remove_task`].
    pub fn remove_task(&self, id: &TaskId) -> Result<(), TaskError> {
        self.store.remove_task(id)?;
        self.edit.lock().close_if_missing(&self.store);
        Ok(())
    }

    /// Opens the edit workflow for a task.
    ///
    /// # Errors
    ///
    /// See [`EditSessionController::open_edit`].
    pub fn open_edit(&self, id: &TaskId) -> Result<(), TaskError> {
        self.edit().open_edit(&self.store, id)
    }

    /// Updates the buffered title of the open edit.
    pub fn set_edit_title(&self, title: &str) -> bool {
        self.edit().set_title(title)
    }

    /// Updates the buffered description of the open edit.
    pub fn set_edit_description(&self, description: &str) -> bool {
        self.edit().set_description(description)
    }

    /// Commits a submitted edit form.
    ///
    /// # Errors
    ///
    /// See [`EditSessionController::commit_edit`].
    pub fn commit_edit(&self, form: EditForm) -> Result<CommitOutcome, TaskError> {
        self.edit().commit_edit(&self.store, form)
    }

    /// Commits the open edit's buffer.
    ///
    /// # Errors
    ///
    /// See [`EditSessionController::commit_edit`].
    pub fn commit_edit_buffer(&self) -> Result<CommitOutcome, TaskError> {
        self.edit().commit_buffer(&self.store)
    }

    /// Closes the edit without committing.
    pub fn cancel_edit(&self) {
        self.edit().cancel_edit();
    }

    /// Immediately re-queues failed writes. Returns how many were queued.
    pub fn retry_failed(&self) -> usize {
        self.store.retry_failed()
    }

    /// Waits for queued writes to reach the backend.
    pub async fn flush(&self) {
        self.store.flush().await;
    }

    /// Locks the edit controller, first closing it if its task is gone.
    fn edit(&self) -> MutexGuard<'_, EditSessionController> {
        let mut edit = self.edit.lock();
        edit.close_if_missing(&self.store);
        edit
    }

    /// Flushes outstanding writes, then unsubscribes from the provider and
    /// stops every background task.
    pub async fn shutdown(self) {
        self.store.flush().await;
        for listener in self.listeners {
            tracing::debug!(listener = listener.name(), "stopping");
            listener.unsubscribe();
        }
        tracing::info!(
            failed_writes = self.store.failed_writes(),
            "client shut down"
        );
    }
}

/// Closes the edit whenever the task list changes under it.
fn spawn_edit_guard(store: TaskStore, edit: Arc<Mutex<EditSessionController>>) -> Subscription {
    let mut views = store.watch();
    let handle = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            edit.lock().close_if_missing(&store);
        }
    });
    Subscription::new("edit-guard", handle)
}
