//! Add-task input handling.

use tasklist_proto::task::{MAX_TASK_TITLE_LENGTH, Task, validate_title};

use crate::tasks::{TaskError, TaskStore};

/// Holds the new-task input field and the last submission error.
#[derive(Debug)]
pub struct AddTaskController {
    input: String,
    error: Option<TaskError>,
    max_title_len: usize,
}

impl Default for AddTaskController {
    fn default() -> Self {
        Self::new(MAX_TASK_TITLE_LENGTH)
    }
}

impl AddTaskController {
    /// Creates a controller with an empty input.
    #[must_use]
    pub const fn new(max_title_len: usize) -> Self {
        Self {
            input: String::new(),
            error: None,
            max_title_len,
        }
    }

    /// Current input text.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the input text.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// The error from the last failed submission, cleared by the next
    /// successful one.
    #[must_use]
    pub const fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Submits the current input as a new task.
    ///
    /// On success the input and any previous error are cleared. On failure
    /// the input is kept and the error is both stored and returned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] for a blank or overlong title and
    /// otherwise whatever [`TaskStore::add_task`] returns.
    pub fn submit(&mut self, store: &TaskStore) -> Result<Task, TaskError> {
        let result = validate_title(&self.input, self.max_title_len)
            .map_err(TaskError::from)
            .and_then(|title| store.add_task(title));
        match result {
            Ok(task) => {
                self.input.clear();
                self.error = None;
                Ok(task)
            }
            Err(err) => {
                tracing::debug!(error = %err, "add task rejected");
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }
}
