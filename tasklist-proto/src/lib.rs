//! Shared data model for the `Tasklist` client core.
//!
//! Holds the task and session types that cross every component boundary,
//! title validation, and the postcard snapshot codec used by file-backed
//! persistence.

pub mod codec;
pub mod session;
pub mod task;
