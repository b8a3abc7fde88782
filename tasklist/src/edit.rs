//! Edit workflow for a single task.
//!
//! ```text
//!   Closed ── open_edit(id) ──▶ Open { selection, buffer }
//!     ▲                              │
//!     └─ commit ok / commit err / cancel
//! ```
//!
//! The controller keeps only the selected task's identifier plus a transient
//! buffer seeded from the task's committed values when the edit opens. The
//! buffer is not re-synced if the task changes while the edit is open.

use tasklist_proto::task::{Task, TaskChanges, TaskId};

use crate::tasks::{TaskError, TaskStore};

/// Candidate values for the task being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    /// Candidate title.
    pub title: String,
    /// Candidate description.
    pub description: String,
}

/// Current state of the edit workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditState {
    /// No edit in progress.
    #[default]
    Closed,
    /// An edit is in progress for `selection`.
    Open {
        /// Identifier of the task being edited.
        selection: TaskId,
        /// Uncommitted field values.
        buffer: EditBuffer,
    },
}

/// A submitted edit form. A field is `None` when the submission did not
/// carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditForm {
    /// Submitted title.
    pub title: Option<String>,
    /// Submitted description.
    pub description: Option<String>,
}

impl EditForm {
    /// A form carrying both fields.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }
}

/// Result of a commit that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The change was applied and the edit closed.
    Committed(Task),
    /// Nothing happened: no edit was open, or the form was incomplete.
    Ignored,
}

/// Owns the "which task is being edited" state.
#[derive(Debug, Default)]
pub struct EditSessionController {
    state: EditState,
}

impl EditSessionController {
    /// Creates a closed controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current workflow state.
    #[must_use]
    pub const fn state(&self) -> &EditState {
        &self.state
    }

    /// Identifier of the task being edited, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<&TaskId> {
        match &self.state {
            EditState::Open { selection, .. } => Some(selection),
            EditState::Closed => None,
        }
    }

    /// Returns `true` while an edit is in progress.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, EditState::Open { .. })
    }

    /// The uncommitted buffer, if an edit is open.
    #[must_use]
    pub const fn buffer(&self) -> Option<&EditBuffer> {
        match &self.state {
            EditState::Open { buffer, .. } => Some(buffer),
            EditState::Closed => None,
        }
    }

    /// Opens an edit for `id`, seeding the buffer from the task's current
    /// values. An edit already open for another task is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the store has no such task; the
    /// controller state is unchanged in that case.
    pub fn open_edit(&mut self, store: &TaskStore, id: &TaskId) -> Result<(), TaskError> {
        let task = store
            .get(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        if let Some(previous) = self.selection().filter(|s| *s != id) {
            tracing::debug!(task_id = %previous, "discarding open edit");
        }
        self.state = EditState::Open {
            selection: task.id,
            buffer: EditBuffer {
                title: task.title,
                description: task.description,
            },
        };
        tracing::debug!(task_id = %id, "edit opened");
        Ok(())
    }

    /// Replaces the buffered title. Returns `false` if no edit is open.
    pub fn set_title(&mut self, title: impl Into<String>) -> bool {
        match &mut self.state {
            EditState::Open { buffer, .. } => {
                buffer.title = title.into();
                true
            }
            EditState::Closed => false,
        }
    }

    /// Replaces the buffered description. Returns `false` if no edit is open.
    pub fn set_description(&mut self, description: impl Into<String>) -> bool {
        match &mut self.state {
            EditState::Open { buffer, .. } => {
                buffer.description = description.into();
                true
            }
            EditState::Closed => false,
        }
    }

    /// Commits `form` to the selected task.
    ///
    /// An incomplete form is dropped: the result is [`CommitOutcome::Ignored`]
    /// and the edit stays open. Otherwise the edit closes whether or not the
    /// store accepted the change.
    ///
    /// # Errors
    ///
    /// Propagates the [`TaskError`] from [`TaskStore::change_task`].
    pub fn commit_edit(
        &mut self,
        store: &TaskStore,
        form: EditForm,
    ) -> Result<CommitOutcome, TaskError> {
        let Some(id) = self.selection().cloned() else {
            return Ok(CommitOutcome::Ignored);
        };
        let (Some(title), Some(description)) = (form.title, form.description) else {
            tracing::warn!(task_id = %id, "dropping incomplete edit submission");
            return Ok(CommitOutcome::Ignored);
        };

        self.state = EditState::Closed;
        let changes = TaskChanges {
            title: Some(title),
            description: Some(description),
        };
        match store.change_task(&id, changes) {
            Ok(task) => {
                tracing::debug!(task_id = %id, "edit committed");
                Ok(CommitOutcome::Committed(task))
            }
            Err(err) => {
                tracing::debug!(task_id = %id, error = %err, "edit rejected");
                Err(err)
            }
        }
    }

    /// Commits the current buffer.
    ///
    /// # Errors
    ///
    /// See [`commit_edit`](Self::commit_edit).
    pub fn commit_buffer(&mut self, store: &TaskStore) -> Result<CommitOutcome, TaskError> {
        let form = self
            .buffer()
            .map(|b| EditForm::new(b.title.clone(), b.description.clone()))
            .unwrap_or_default();
        self.commit_edit(store, form)
    }

    /// Closes the edit and discards the buffer. Writes already issued are
    /// not affected.
    pub fn cancel_edit(&mut self) {
        if let Some(id) = self.selection() {
            tracing::debug!(task_id = %id, "edit cancelled");
        }
        self.state = EditState::Closed;
    }

    /// Closes the edit if its task is no longer in `store`, for example
    /// after a remote list dropped it. Returns `true` if it closed.
    pub fn close_if_missing(&mut self, store: &TaskStore) -> bool {
        let missing = self.selection().is_some_and(|id| !store.contains(id));
        if missing {
            if let Some(id) = self.selection() {
                tracing::info!(task_id = %id, "selected task disappeared; closing edit");
            }
            self.state = EditState::Closed;
        }
        missing
    }
}
