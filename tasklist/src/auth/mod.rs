//! Authentication: identity provider contract and session tracking.
//!
//! Defines the [`AuthProvider`] trait the session layer consumes.
//! Concrete implementations include:
//! - [`memory::InMemoryAuthProvider`]: in-process credential table for
//!   tests and the demo binary
//!
//! [`session::SessionStateMachine`] turns provider notifications and
//! explicit sign-in/sign-out requests into a single observable
//! [`Session`](tasklist_proto::session::Session) value.

pub mod memory;
pub mod session;

pub use memory::InMemoryAuthProvider;
pub use session::SessionStateMachine;

use tasklist_proto::session::User;
use tokio::sync::mpsc;

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The email/password pair was rejected.
    #[error("invalid credential")]
    InvalidCredential,

    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),
}

/// Errors from explicit session requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another sign-in or sign-out request is still in flight.
    #[error("another session request is in progress")]
    Busy,

    /// The provider rejected or failed the request.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Async contract for an external identity provider.
///
/// # Invariant
///
/// [`subscribe`](AuthProvider::subscribe) pushes the current state to the
/// new receiver as soon as it is known, then one notification per change.
/// Notifications on a single receiver are delivered in order.
pub trait AuthProvider: Send + Sync {
    /// Exchange an email/password credential for a signed-in user.
    fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<User, AuthError>> + Send;

    /// Terminate the provider-side session.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Open a notification channel carrying `Some(user)` or `None` on every
    /// session change. Dropping the receiver ends the subscription.
    fn subscribe(&self) -> mpsc::Receiver<Option<User>>;
}
