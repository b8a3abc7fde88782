//! Background task that drains the store's write queue.
//!
//! A single writer consumes every queued write in issue order, so two
//! writes to the same task can never be in flight at once.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::store::Shared;
use crate::persist::{TaskBackend, WriteOp};

/// Messages accepted by the writer.
#[derive(Debug)]
pub(crate) enum WriterMsg {
    /// Perform a backend write.
    Write(WriteOp),
    /// Signal once every earlier message has been processed.
    Flush(oneshot::Sender<()>),
}

/// Runs until every sender of the queue has been dropped.
pub(crate) async fn run<B: TaskBackend>(
    backend: Arc<B>,
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<WriterMsg>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Write(op) => {
                let result = op.apply(backend.as_ref()).await;
                shared.complete(op, result);
            }
            WriterMsg::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("task write queue closed");
}
