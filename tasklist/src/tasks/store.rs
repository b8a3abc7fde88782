//! The optimistic task store.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tasklist_proto::session::Session;
use tasklist_proto::task::{
    MAX_TASK_TITLE_LENGTH, Task, TaskChanges, TaskId, TaskPatch, validate_title,
};
use tokio::sync::{mpsc, oneshot, watch};

use super::merge::{MergeSummary, merge_remote_list};
use super::writer::{self, WriterMsg};
use super::{Entry, StoreEvent, SyncState, TaskError, TaskView};
use crate::persist::{PersistError, TaskBackend, WriteKind, WriteOp};
use crate::subscription::Subscription;

/// Tunables for a [`TaskStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum task title length in characters.
    pub max_title_len: usize,
    /// Capacity of the backend write queue.
    pub write_queue_capacity: usize,
    /// Capacity of the [`StoreEvent`] channel.
    pub event_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_title_len: MAX_TASK_TITLE_LENGTH,
            write_queue_capacity: 256,
            event_buffer: 64,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    /// Tasks in insertion order.
    entries: Vec<Entry>,
    /// Writes that failed, in the order they were issued.
    failed: VecDeque<WriteOp>,
    /// Tasks removed locally whose delete the backend has not confirmed.
    tombstones: HashSet<TaskId>,
}

/// State shared between store handles and the background writer.
pub(crate) struct Shared {
    state: Mutex<StoreState>,
    views: watch::Sender<Vec<TaskView>>,
    events: mpsc::Sender<StoreEvent>,
}

impl Shared {
    fn publish(&self, state: &StoreState) {
        self.views
            .send_replace(state.entries.iter().map(Entry::view).collect());
    }

    fn emit(&self, event: StoreEvent) {
        // Best-effort: a full channel means the UI is not draining events.
        if self.events.try_send(event).is_err() {
            tracing::debug!("store event dropped");
        }
    }

    /// Records the outcome of a write and publishes the new views.
    pub(crate) fn complete(&self, op: WriteOp, result: Result<(), PersistError>) {
        let mut guard = self.state.lock();
        self.settle(&mut guard, op, result);
        self.publish(&guard);
    }

    fn settle(&self, state: &mut StoreState, op: WriteOp, result: Result<(), PersistError>) {
        let result = match result {
            Err(PersistError::NotFound(_)) if op.kind() == WriteKind::Delete => {
                tracing::debug!(task_id = %op.task_id(), "delete target already absent");
                Ok(())
            }
            other => other,
        };
        if op.kind() == WriteKind::Delete && result.is_ok() {
            state.tombstones.remove(op.task_id());
        }
        let entry = state.entries.iter_mut().find(|e| &e.task.id == op.task_id());
        match result {
            Ok(()) => {
                if let Some(entry) = entry {
                    entry.queued = entry.queued.saturating_sub(1);
                    if entry.queued == 0 && entry.sync == SyncState::Pending {
                        entry.sync = SyncState::Clean;
                    }
                }
                tracing::debug!(task_id = %op.task_id(), op = %op.kind(), "write confirmed");
            }
            Err(err) => {
                let reason = err.to_string();
                if let Some(entry) = entry {
                    entry.queued = entry.queued.saturating_sub(1);
                    entry.sync = SyncState::Failed(reason.clone());
                }
                tracing::warn!(
                    task_id = %op.task_id(),
                    op = %op.kind(),
                    error = %err,
                    "write failed; keeping local change for retry"
                );
                let event = StoreEvent::PersistenceFailed {
                    task_id: op.task_id().clone(),
                    op: op.kind(),
                    reason,
                };
                state.failed.push_back(op);
                self.emit(event);
            }
        }
    }
}

/// Owns the task collection and reconciles it with a [`TaskBackend`].
///
/// Every mutation requires a signed-in session, runs to completion on the
/// local collection before returning, and then queues a backend write.
/// Handles are cheap to clone and all see the same collection.
#[derive(Clone)]
pub struct TaskStore {
    shared: Arc<Shared>,
    session: watch::Receiver<Session>,
    writes: mpsc::Sender<WriterMsg>,
    max_title_len: usize,
}

impl TaskStore {
    /// Creates an empty store and spawns its backend writer.
    ///
    /// Returns the store and a receiver for [`StoreEvent`]s that the UI
    /// layer should consume. Must be called inside a tokio runtime.
    pub fn new<B: TaskBackend + 'static>(
        backend: Arc<B>,
        session: watch::Receiver<Session>,
        config: &StoreConfig,
    ) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (views, _) = watch::channel(Vec::new());
        let shared = Arc::new(Shared {
            state: Mutex::new(StoreState::default()),
            views,
            events: event_tx,
        });

        let (writes, write_rx) = mpsc::channel(config.write_queue_capacity.max(1));
        tokio::spawn(writer::run(backend, Arc::clone(&shared), write_rx));

        let store = Self {
            shared,
            session,
            writes,
            max_title_len: config.max_title_len,
        };
        (store, event_rx)
    }

    /// Replaces the collection with tasks loaded from the backend, all
    /// marked clean.
    pub fn hydrate(&self, tasks: Vec<Task>) {
        let mut state = self.shared.state.lock();
        tracing::info!(count = tasks.len(), "loaded tasks from storage");
        state.entries = tasks.into_iter().map(Entry::clean).collect();
        self.shared.publish(&state);
    }

    /// Creates a `Todo` task with an empty description at the end of the
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Unauthorized`] without a signed-in session, or
    /// [`TaskError::Validation`] if the title is empty after trimming or
    /// too long.
    pub fn add_task(&self, title: &str) -> Result<Task, TaskError> {
        self.require_session()?;
        let title = validate_title(title, self.max_title_len)?;
        let task = Task::new(title);

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.entries.push(Entry::clean(task.clone()));
        self.enqueue(state, WriteOp::Create(task.clone()));
        self.shared.publish(state);

        tracing::debug!(task_id = %task.id, "task added");
        Ok(task)
    }

    /// Flips a task between `Todo` and `Done`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Unauthorized`] without a signed-in session, or
    /// [`TaskError::NotFound`] if no such task exists.
    pub fn toggle_task_status(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.require_session()?;

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let entry = entry_mut(&mut state.entries, id)?;
        entry.task.status = entry.task.status.toggled();
        let task = entry.task.clone();

        self.enqueue(
            state,
            WriteOp::Update {
                id: id.clone(),
                patch: TaskPatch::status(task.status),
            },
        );
        self.shared.publish(state);

        tracing::debug!(task_id = %id, status = %task.status, "task toggled");
        Ok(task)
    }

    /// Replaces the supplied fields of a task. The identifier and status
    /// never change here.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Unauthorized`] without a signed-in session,
    /// [`TaskError::NotFound`] if the task no longer exists, or
    /// [`TaskError::Validation`] if a supplied title is empty. Nothing is
    /// changed on error.
    pub fn change_task(&self, id: &TaskId, changes: TaskChanges) -> Result<Task, TaskError> {
        self.require_session()?;

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let entry = entry_mut(&mut state.entries, id)?;

        if changes.is_empty() {
            return Ok(entry.task.clone());
        }
        let mut patch = TaskPatch::from(changes);
        patch.title = patch
            .title
            .as_deref()
            .map(|t| validate_title(t, self.max_title_len))
            .transpose()?
            .map(str::to_string);

        entry.task.apply_patch(&patch);
        let task = entry.task.clone();
        self.enqueue(
            state,
            WriteOp::Update {
                id: id.clone(),
                patch,
            },
        );
        self.shared.publish(state);

        tracing::debug!(task_id = %id, "task changed");
        Ok(task)
    }

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Unauthorized`] without a signed-in session, or
    /// [`TaskError::NotFound`] if the task does not exist, including when
    /// it was already removed.
    pub fn remove_task(&self, id: &TaskId) -> Result<(), TaskError> {
        self.require_session()?;

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let pos = state
            .entries
            .iter()
            .position(|e| &e.task.id == id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        state.entries.remove(pos);
        state.tombstones.insert(id.clone());
        self.enqueue(state, WriteOp::Delete(id.clone()));
        self.shared.publish(state);

        tracing::debug!(task_id = %id, "task removed");
        Ok(())
    }

    /// Returns the current tasks in list order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .map(|e| e.task.clone())
            .collect()
    }

    /// Returns the current tasks with their sync state.
    #[must_use]
    pub fn views(&self) -> Vec<TaskView> {
        self.shared.views.borrow().clone()
    }

    /// Returns the task with this identifier, if present.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .find(|e| &e.task.id == id)
            .map(|e| e.task.clone())
    }

    /// Returns `true` if a task with this identifier is present.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .any(|e| &e.task.id == id)
    }

    /// Returns the sync state of a task, if present.
    #[must_use]
    pub fn sync_state(&self, id: &TaskId) -> Option<SyncState> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .find(|e| &e.task.id == id)
            .map(|e| e.sync.clone())
    }

    /// Number of tasks in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Returns `true` if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a receiver that observes every change to the task views.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<TaskView>> {
        self.shared.views.subscribe()
    }

    /// Number of failed writes awaiting retry.
    #[must_use]
    pub fn failed_writes(&self) -> usize {
        self.shared.state.lock().failed.len()
    }

    /// Retries every task with a failed write, in the order the failures
    /// happened.
    ///
    /// A failed write is never replayed as captured: a newer write to the
    /// same task may already have succeeded. Instead each task gets one
    /// write carrying its current local value, a replacing create, or a
    /// delete if the task has been removed locally.
    ///
    /// Returns the number of writes queued.
    pub fn retry_failed(&self) -> usize {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let mut ids: Vec<TaskId> = Vec::new();
        for op in state.failed.drain(..) {
            if !ids.contains(op.task_id()) {
                ids.push(op.task_id().clone());
            }
        }

        let count = ids.len();
        for id in ids {
            let op = match state.entries.iter_mut().find(|e| e.task.id == id) {
                Some(entry) => {
                    entry.sync = SyncState::Pending;
                    WriteOp::Create(entry.task.clone())
                }
                None => {
                    state.tombstones.insert(id.clone());
                    WriteOp::Delete(id)
                }
            };
            self.enqueue(state, op);
        }
        if count > 0 {
            self.shared.publish(state);
            tracing::info!(count, "retrying failed writes");
        }
        count
    }

    /// Spawns a background task that retries failed writes every
    /// `interval`.
    pub fn spawn_retry_task(&self, interval: Duration) -> Subscription {
        let store = self.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut tick = tokio::time::interval_at(start, interval);
            loop {
                tick.tick().await;
                if store.failed_writes() > 0 {
                    store.retry_failed();
                }
            }
        });
        Subscription::new("retry", handle)
    }

    /// Waits until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writes.send(WriterMsg::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Merges a full task list pushed by the backend.
    pub fn apply_remote(&self, remote: &[Task]) -> MergeSummary {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let summary = merge_remote_list(&mut state.entries, remote, &state.tombstones);
        if !summary.is_empty() {
            tracing::debug!(
                added = summary.added,
                updated = summary.updated,
                removed = summary.removed,
                "merged remote task list"
            );
            self.shared.publish(state);
            self.shared.emit(StoreEvent::RemoteMerged(summary));
        }
        summary
    }

    /// Spawns a listener that merges every list pushed on `rx`.
    pub fn spawn_remote_listener(&self, mut rx: mpsc::Receiver<Vec<Task>>) -> Subscription {
        let store = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(remote) = rx.recv().await {
                store.apply_remote(&remote);
            }
            tracing::debug!("remote task feed closed");
        });
        Subscription::new("remote-list", handle)
    }

    fn require_session(&self) -> Result<(), TaskError> {
        if self.session.borrow().is_signed_in() {
            Ok(())
        } else {
            tracing::debug!("task mutation rejected: not signed in");
            Err(TaskError::Unauthorized)
        }
    }

    /// Marks the target task pending and hands the write to the writer.
    fn enqueue(&self, state: &mut StoreState, op: WriteOp) {
        if let Some(entry) = state.entries.iter_mut().find(|e| &e.task.id == op.task_id()) {
            entry.queued += 1;
            // A failed write still awaits retry, so keep showing it.
            if !matches!(entry.sync, SyncState::Failed(_)) {
                entry.sync = SyncState::Pending;
            }
        }
        if let Err(err) = self.writes.try_send(WriterMsg::Write(op)) {
            if let WriterMsg::Write(op) = err.into_inner() {
                self.shared.settle(
                    state,
                    op,
                    Err(PersistError::Unavailable("write queue full or closed".to_string())),
                );
            }
        }
    }
}

fn entry_mut<'a>(entries: &'a mut [Entry], id: &TaskId) -> Result<&'a mut Entry, TaskError> {
    entries
        .iter_mut()
        .find(|e| &e.task.id == id)
        .ok_or_else(|| TaskError::NotFound(id.clone()))
}
