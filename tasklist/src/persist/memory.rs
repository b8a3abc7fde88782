//! In-memory task backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tasklist_proto::task::{Task, TaskId, TaskPatch};
use tokio::sync::mpsc;

use super::{PersistError, TaskBackend};

/// Default capacity of each list feed channel.
const DEFAULT_FEED_BUFFER: usize = 16;

/// Task backend that keeps everything in process memory.
///
/// Data is lost when the process exits. Writes can be made to fail with
/// [`set_failing`](Self::set_failing), and a list feed can be enabled to
/// model another client pushing changes.
pub struct InMemoryBackend {
    /// Stored tasks in insertion order.
    tasks: Mutex<Vec<Task>>,
    /// When set, every write fails with [`PersistError::Unavailable`].
    failing: AtomicBool,
    /// Whether [`subscribe_list`](TaskBackend::subscribe_list) opens a feed.
    feed_enabled: bool,
    /// Open list feeds.
    feeds: Mutex<Vec<mpsc::Sender<Vec<Task>>>>,
    /// Number of writes that succeeded.
    completed_writes: AtomicUsize,
}

impl InMemoryBackend {
    /// Creates an empty single-client backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            feed_enabled: false,
            feeds: Mutex::new(Vec::new()),
            completed_writes: AtomicUsize::new(0),
        }
    }

    /// Creates an empty backend that supports list subscriptions.
    #[must_use]
    pub fn with_list_feed() -> Self {
        Self {
            feed_enabled: true,
            ..Self::new()
        }
    }

    /// Creates a backend pre-populated with `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let backend = Self::new();
        *backend.tasks.lock() = tasks;
        backend
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of writes that have succeeded so far.
    #[must_use]
    pub fn completed_writes(&self) -> usize {
        self.completed_writes.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored tasks.
    #[must_use]
    pub fn stored(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Replaces the stored list as if another client had written it, then
    /// pushes it to every feed.
    pub async fn push_remote(&self, tasks: Vec<Task>) {
        *self.tasks.lock() = tasks;
        self.publish_list().await;
    }

    /// Pushes the current stored list to every open feed.
    pub async fn publish_list(&self) {
        let snapshot = self.stored();
        let feeds: Vec<_> = self.feeds.lock().clone();
        for tx in feeds {
            let _ = tx.send(snapshot.clone()).await;
        }
        self.feeds.lock().retain(|tx| !tx.is_closed());
    }

    fn check_available(&self) -> Result<(), PersistError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("backend offline".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.completed_writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBackend for InMemoryBackend {
    async fn create(&self, task: &Task) -> Result<(), PersistError> {
        self.check_available()?;
        {
            let mut tasks = self.tasks.lock();
            // Upsert, so a retried create after a lost ack is harmless.
            if let Some(existing) = tasks.iter_mut().find(|t| t.id == task.id) {
                existing.clone_from(task);
            } else {
                tasks.push(task.clone());
            }
        }
        self.record_write();
        Ok(())
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), PersistError> {
        self.check_available()?;
        {
            let mut tasks = self.tasks.lock();
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| PersistError::NotFound(id.clone()))?;
            task.apply_patch(patch);
        }
        self.record_write();
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), PersistError> {
        self.check_available()?;
        {
            let mut tasks = self.tasks.lock();
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            if tasks.len() == before {
                return Err(PersistError::NotFound(id.clone()));
            }
        }
        self.record_write();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>, PersistError> {
        self.check_available()?;
        Ok(self.stored())
    }

    fn subscribe_list(&self) -> Option<mpsc::Receiver<Vec<Task>>> {
        if !self.feed_enabled {
            return None;
        }
        let (tx, rx) = mpsc::channel(DEFAULT_FEED_BUFFER);
        self.feeds.lock().push(tx);
        Some(rx)
    }
}
