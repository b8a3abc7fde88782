//! `Tasklist`: single-user task list client core.
//!
//! Two cooperating pieces of state sit at the centre: the
//! [`auth::SessionStateMachine`] tracking who is signed in, and the
//! [`tasks::TaskStore`] holding the optimistic task collection. The
//! [`app::App`] wires them together with the edit and add controllers and
//! exposes a reactive snapshot for any UI layer.

pub mod add;
pub mod app;
pub mod auth;
pub mod config;
pub mod edit;
pub mod persist;
pub mod subscription;
pub mod tasks;
