//! Cancellation handle for background listener tasks.

use tokio::task::JoinHandle;

/// Owns a spawned listener task and stops it when cancelled or dropped.
///
/// Returned wherever a component subscribes to a push channel, so the
/// caller decides how long the subscription lives.
#[derive(Debug)]
#[must_use = "dropping a Subscription cancels the listener"]
pub struct Subscription {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Wraps a spawned task under a name used in logs.
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }

    /// Returns the listener name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the listener task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            tracing::debug!(listener = self.name, "unsubscribing");
        }
        self.handle.abort();
    }
}
