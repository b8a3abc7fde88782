//! Snapshot encoding for persisted task lists.
//!
//! A snapshot is a version byte followed by the postcard-encoded task list.
//! The version is checked on decode so an older binary refuses a file it
//! cannot read instead of misinterpreting it.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Error type for snapshot encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Snapshot was written by an unsupported format version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version byte found in the input.
        found: u8,
        /// Version this build understands.
        expected: u8,
    },
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u8,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u8,
    tasks: &'a [Task],
}

/// Encodes an ordered task list into a snapshot.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the tasks cannot be serialized.
pub fn encode_tasks(tasks: &[Task]) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        tasks,
    })
    .map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a snapshot back into an ordered task list.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized,
/// or `CodecError::UnsupportedVersion` if the version byte does not match.
pub fn decode_tasks(bytes: &[u8]) -> Result<Vec<Task>, CodecError> {
    let snapshot: Snapshot =
        postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot.tasks)
}
