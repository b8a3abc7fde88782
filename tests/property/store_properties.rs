//! Property-based tests for the task store.
//!
//! Uses proptest to verify:
//! 1. Identifiers from any sequence of adds are pairwise distinct.
//! 2. Toggling any task twice restores its status.
//! 3. Without a signed-in session no operation changes the collection.
//! 4. Any sequence of operations keeps the store in step with a plain
//!    `Vec` model (order, titles, statuses, `NotFound` after removal).

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use tasklist::persist::InMemoryBackend;
use tasklist::tasks::{StoreConfig, TaskError, TaskStore};
use tasklist_proto::session::{Session, User};
use tasklist_proto::task::{Task, TaskChanges, TaskStatus};
use tokio::runtime::Runtime;
use tokio::sync::watch;

// --- Helpers ---

/// A runtime to host the store's writer. Operations under test are
/// synchronous, so the writer never needs to run.
fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

fn store_with(session: Session) -> (TaskStore, watch::Sender<Session>) {
    let (tx, rx) = watch::channel(session);
    let (store, _events) =
        TaskStore::new(Arc::new(InMemoryBackend::new()), rx, &StoreConfig::default());
    (store, tx)
}

fn signed_in() -> Session {
    Session::SignedIn(User::new("Prop", "prop@example.com"))
}

/// Strategy for titles that survive trimming.
fn arb_title() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 ]{0,30}"
}

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Toggle(usize),
    Rename(usize, String),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_title().prop_map(Op::Add),
        any::<usize>().prop_map(Op::Toggle),
        (any::<usize>(), arb_title()).prop_map(|(i, t)| Op::Rename(i, t)),
        any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    /// Every add allocates a fresh identifier.
    #[test]
    fn add_ids_are_unique(titles in prop::collection::vec(arb_title(), 1..64)) {
        let rt = runtime();
        let _guard = rt.enter();
        let (store, _tx) = store_with(signed_in());

        let ids: Vec<_> = titles
            .iter()
            .map(|t| store.add_task(t).expect("valid title").id)
            .collect();
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }

    /// Toggle is its own inverse.
    #[test]
    fn toggle_pair_restores_status(
        n in 1usize..16,
        pick in any::<prop::sample::Index>(),
        pre_toggled in any::<bool>(),
    ) {
        let rt = runtime();
        let _guard = rt.enter();
        let (store, _tx) = store_with(signed_in());

        for i in 0..n {
            store.add_task(&format!("task {i}")).expect("valid title");
        }
        let target = store.tasks()[pick.index(n)].id.clone();
        if pre_toggled {
            store.toggle_task_status(&target).expect("task exists");
        }
        let before = store.get(&target).expect("task exists").status;

        store.toggle_task_status(&target).expect("task exists");
        store.toggle_task_status(&target).expect("task exists");

        prop_assert_eq!(store.get(&target).expect("task exists").status, before);
    }

    /// Every mutation without a signed-in session is `Unauthorized` and
    /// leaves the collection untouched.
    #[test]
    fn session_gating(
        ops in prop::collection::vec(arb_op(), 1..32),
        unknown in any::<bool>(),
    ) {
        let rt = runtime();
        let _guard = rt.enter();
        let (store, _tx) = store_with(if unknown { Session::Unknown } else { Session::SignedOut });
        let seeded = vec![Task::new("a"), Task::new("b"), Task::new("c")];
        store.hydrate(seeded.clone());

        for op in ops {
            let result = match op {
                Op::Add(title) => store.add_task(&title).map(|_| ()),
                Op::Toggle(i) => store.toggle_task_status(&seeded[i % 3].id).map(|_| ()),
                Op::Rename(i, title) => store
                    .change_task(&seeded[i % 3].id, TaskChanges::title(title))
                    .map(|_| ()),
                Op::Remove(i) => store.remove_task(&seeded[i % 3].id),
            };
            prop_assert_eq!(result, Err(TaskError::Unauthorized));
        }
        prop_assert_eq!(store.tasks(), seeded);
    }

    /// The store behaves like an ordered list of tasks.
    #[test]
    fn store_matches_vec_model(ops in prop::collection::vec(arb_op(), 1..64)) {
        let rt = runtime();
        let _guard = rt.enter();
        let (store, _tx) = store_with(signed_in());
        let mut model: Vec<Task> = Vec::new();
        let mut removed = Vec::new();

        for op in ops {
            match op {
                Op::Add(title) => {
                    let task = store.add_task(&title).expect("valid title");
                    prop_assert_eq!(&task.title, title.trim());
                    model.push(task);
                }
                Op::Toggle(i) if !model.is_empty() => {
                    let i = i % model.len();
                    let task = store.toggle_task_status(&model[i].id).expect("task exists");
                    model[i].status = match model[i].status {
                        TaskStatus::Todo => TaskStatus::Done,
                        TaskStatus::Done => TaskStatus::Todo,
                    };
                    prop_assert_eq!(&task, &model[i]);
                }
                Op::Rename(i, title) if !model.is_empty() => {
                    let i = i % model.len();
                    let task = store
                        .change_task(&model[i].id, TaskChanges::title(title.clone()))
                        .expect("task exists");
                    model[i].title = title.trim().to_string();
                    prop_assert_eq!(&task, &model[i]);
                }
                Op::Remove(i) if !model.is_empty() => {
                    let i = i % model.len();
                    let task = model.remove(i);
                    store.remove_task(&task.id).expect("task exists");
                    removed.push(task.id);
                }
                _ => {}
            }
        }

        prop_assert_eq!(store.tasks(), model);
        for id in removed {
            prop_assert_eq!(
                store.toggle_task_status(&id),
                Err(TaskError::NotFound(id.clone()))
            );
        }
    }
}
