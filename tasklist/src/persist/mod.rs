//! Persistence collaborators for the task store.
//!
//! Defines the [`TaskBackend`] trait keyed by task identifier.
//! Concrete implementations include:
//! - [`memory::InMemoryBackend`]: map-backed store with failure injection
//!   and an optional list feed, for tests and the no-persistence mode
//! - [`file::FileBackend`]: postcard snapshot file on local disk
//!
//! Retry and timeout policy belongs to the backend; the store only sees
//! the final `Result` of each write.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use std::fmt;

use tasklist_proto::task::{Task, TaskId, TaskPatch};
use tokio::sync::mpsc;

/// Errors that can occur during backend operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// The backend is unreachable or refused the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// The backend has no record of the task.
    #[error("task not found in storage: {0}")]
    NotFound(TaskId),
}

/// Async contract for task persistence.
pub trait TaskBackend: Send + Sync {
    /// Store a task, replacing any record with the same identifier.
    fn create(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), PersistError>> + Send;

    /// Apply a partial update to an existing task.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<(), PersistError>> + Send;

    /// Delete a task.
    fn delete(&self, id: &TaskId)
    -> impl std::future::Future<Output = Result<(), PersistError>> + Send;

    /// Load every stored task in list order.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Task>, PersistError>> + Send;

    /// Open a feed of full task lists pushed by the backend when other
    /// clients change the data. Single-client backends return `None`.
    fn subscribe_list(&self) -> Option<mpsc::Receiver<Vec<Task>>> {
        None
    }
}

/// Which kind of write an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Task creation.
    Create,
    /// Partial field update.
    Update,
    /// Task deletion.
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single queued write against a [`TaskBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create the task.
    Create(Task),
    /// Patch the task's fields.
    Update {
        /// Task being updated.
        id: TaskId,
        /// Fields that changed.
        patch: TaskPatch,
    },
    /// Delete the task.
    Delete(TaskId),
}

impl WriteOp {
    /// The task this write targets.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Create(task) => &task.id,
            Self::Update { id, .. } | Self::Delete(id) => id,
        }
    }

    /// The kind of write.
    #[must_use]
    pub const fn kind(&self) -> WriteKind {
        match self {
            Self::Create(_) => WriteKind::Create,
            Self::Update { .. } => WriteKind::Update,
            Self::Delete(_) => WriteKind::Delete,
        }
    }

    /// Performs this write against `backend`.
    ///
    /// # Errors
    ///
    /// Returns whatever [`PersistError`] the backend reports.
    pub async fn apply<B: TaskBackend>(&self, backend: &B) -> Result<(), PersistError> {
        match self {
            Self::Create(task) => backend.create(task).await,
            Self::Update { id, patch } => backend.update(id, patch).await,
            Self::Delete(id) => backend.delete(id).await,
        }
    }
}
