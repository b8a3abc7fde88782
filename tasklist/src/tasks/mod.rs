//! Optimistic task collection.
//!
//! [`TaskStore`] applies every mutation locally first, then queues a
//! write to the persistence backend. Each task carries a [`SyncState`] tag
//! so the UI can show which changes are still unconfirmed or failed.
//!
//! Failed writes are kept optimistic and retried: the local change stays
//! visible, the task is tagged [`SyncState::Failed`], a
//! [`StoreEvent::PersistenceFailed`] is emitted and the write is queued for
//! [`TaskStore::retry_failed`].

pub mod merge;
pub mod store;
mod writer;

pub use merge::MergeSummary;
pub use store::{StoreConfig, TaskStore};

use serde::Serialize;
use tasklist_proto::task::{Task, TaskId, ValidationError};

use crate::persist::WriteKind;

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// A supplied field is empty or malformed.
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),

    /// No task with this identifier exists locally.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The operation needs a signed-in session.
    #[error("not signed in")]
    Unauthorized,
}

/// Reconciliation state of one task against the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    /// Local value matches what the backend confirmed.
    Clean,
    /// At least one write is queued or in flight.
    Pending,
    /// A write failed; the local value is kept and the write awaits retry.
    Failed(String),
}

impl SyncState {
    /// Returns `true` if nothing is outstanding for this task.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// A task together with its reconciliation state, as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    /// The task's current local value.
    #[serde(flatten)]
    pub task: Task,
    /// Whether the backend has confirmed it.
    pub sync: SyncState,
}

/// Notifications from the store for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A backend write failed after the local change was applied.
    PersistenceFailed {
        /// The task the write targeted.
        task_id: TaskId,
        /// Which write failed.
        op: WriteKind,
        /// Description of the error.
        reason: String,
    },
    /// A remote list was merged into the local collection.
    RemoteMerged(MergeSummary),
}

/// Store-internal record for one task.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) task: Task,
    pub(crate) sync: SyncState,
    /// Writes queued or in flight for this task.
    pub(crate) queued: u32,
}

impl Entry {
    pub(crate) const fn clean(task: Task) -> Self {
        Self {
            task,
            sync: SyncState::Clean,
            queued: 0,
        }
    }

    pub(crate) fn view(&self) -> TaskView {
        TaskView {
            task: self.task.clone(),
            sync: self.sync.clone(),
        }
    }
}
