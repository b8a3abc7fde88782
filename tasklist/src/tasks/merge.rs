//! Last-write-wins merge of a remote task list into local state.
//!
//! A task with an unconfirmed local write (`Pending` or `Failed`) holds the
//! most recent change, so its local value wins. Every clean task takes the
//! remote value, including disappearing when the remote list no longer has
//! it. Remote-only tasks are appended in remote order, except tombstoned
//! ones: a local delete the backend has not confirmed also wins.

use std::collections::HashSet;

use tasklist_proto::task::{Task, TaskId};

use super::Entry;

/// Counts of what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Tasks that appeared from the remote list.
    pub added: usize,
    /// Clean tasks whose fields were replaced by the remote value.
    pub updated: usize,
    /// Clean tasks dropped because the remote list no longer has them.
    pub removed: usize,
}

impl MergeSummary {
    /// Returns `true` if the merge changed nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Merges `remote` into `local` in place, preserving local order.
///
/// `tombstones` holds tasks removed locally whose delete is unconfirmed.
pub(crate) fn merge_remote_list(
    local: &mut Vec<Entry>,
    remote: &[Task],
    tombstones: &HashSet<TaskId>,
) -> MergeSummary {
    let mut summary = MergeSummary::default();
    let remote_ids: HashSet<&TaskId> = remote.iter().map(|t| &t.id).collect();

    let before = local.len();
    local.retain(|e| !e.sync.is_clean() || remote_ids.contains(&e.task.id));
    summary.removed = before - local.len();

    for remote_task in remote {
        if let Some(entry) = local.iter_mut().find(|e| e.task.id == remote_task.id) {
            if entry.sync.is_clean() && entry.task != *remote_task {
                entry.task.clone_from(remote_task);
                summary.updated += 1;
            }
        } else if !tombstones.contains(&remote_task.id) {
            local.push(Entry::clean(remote_task.clone()));
            summary.added += 1;
        }
    }

    summary
}
