//! File-backed task persistence.
//!
//! The whole list is kept as one postcard snapshot (see
//! [`tasklist_proto::codec`]). Each write loads the snapshot, modifies it and
//! replaces the file through a temporary sibling and a rename, so a crash
//! mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use tasklist_proto::codec;
use tasklist_proto::task::{Task, TaskId, TaskPatch};
use tokio::sync::Mutex;

use super::{PersistError, TaskBackend};

/// Task backend storing a postcard snapshot on local disk.
pub struct FileBackend {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileBackend {
    /// Creates a backend for the snapshot at `path`. The file is created on
    /// the first write; a missing file reads as an empty list.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Task>, PersistError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                codec::decode_tasks(&bytes).map_err(|e| PersistError::ReadFailed(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PersistError::ReadFailed(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, tasks: &[Task]) -> Result<(), PersistError> {
        let bytes =
            codec::encode_tasks(tasks).map_err(|e| PersistError::WriteFailed(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PersistError::WriteFailed(format!("{}: {e}", dir.display())))?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PersistError::WriteFailed(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistError::WriteFailed(format!("{}: {e}", self.path.display())))
    }

    async fn modify<F>(&self, f: F) -> Result<(), PersistError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<(), PersistError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await?;
        f(&mut tasks)?;
        self.save(&tasks).await
    }
}

impl TaskBackend for FileBackend {
    async fn create(&self, task: &Task) -> Result<(), PersistError> {
        self.modify(|tasks| {
            if let Some(existing) = tasks.iter_mut().find(|t| t.id == task.id) {
                existing.clone_from(task);
            } else {
                tasks.push(task.clone());
            }
            Ok(())
        })
        .await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), PersistError> {
        self.modify(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| PersistError::NotFound(id.clone()))?;
            task.apply_patch(patch);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), PersistError> {
        self.modify(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            if tasks.len() == before {
                return Err(PersistError::NotFound(id.clone()));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Task>, PersistError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }
}
