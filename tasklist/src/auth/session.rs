//! Session state machine.
//!
//! ```text
//!             push(user) / sign_in ok
//!   Unknown ──────────────────────────► SignedIn(user)
//!      │                                   ▲      │
//!      │ push(none)     push(user) /       │      │ push(none) /
//!      ▼                sign_in ok         │      ▼ sign_out ok
//!   SignedOut ─────────────────────────────┘   SignedOut
//! ```
//!
//! The provider's push channel is the source of truth. Explicit requests
//! apply their result immediately; a later push for the same target state
//! is a no-op, so the two channels may resolve in either order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tasklist_proto::session::{Session, User};
use tokio::sync::watch;

use super::{AuthProvider, SessionError};
use crate::subscription::Subscription;

/// Tracks the current [`Session`] and serializes explicit auth requests.
pub struct SessionStateMachine<P: AuthProvider> {
    provider: Arc<P>,
    /// Published session value.
    state: watch::Sender<Session>,
    /// Set while a sign-in or sign-out is awaiting the provider.
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the request finishes, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| SessionError::Busy)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<P: AuthProvider + 'static> SessionStateMachine<P> {
    /// Creates a machine in the `Unknown` state. Call
    /// [`start`](Self::start) to begin receiving provider notifications.
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        let (state, _) = watch::channel(Session::Unknown);
        Self {
            provider,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Subscribes to the provider and spawns the listener that applies its
    /// notifications in delivery order.
    ///
    /// The returned [`Subscription`] is the teardown handle: dropping it
    /// stops listening.
    pub fn start(self: &Arc<Self>) -> Subscription {
        let mut rx = self.provider.subscribe();
        let machine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(user) = rx.recv().await {
                machine.apply_notification(user);
            }
            tracing::debug!("identity provider closed the notification channel");
        });
        Subscription::new("session", handle)
    }

    /// Applies one provider notification, replacing the current state.
    pub fn apply_notification(&self, user: Option<User>) {
        self.transition(Session::from_notification(user), "provider");
    }

    /// Returns a copy of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Returns a receiver that observes every session change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Waits until the provider has reported at least once.
    pub async fn wait_until_known(&self) -> Session {
        let mut rx = self.state.subscribe();
        match rx.wait_for(Session::is_known).await {
            Ok(session) => session.clone(),
            Err(_) => self.session(),
        }
    }

    /// Returns `true` while a sign-in or sign-out request is pending.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Signs in with an email/password credential.
    ///
    /// On success the state becomes `SignedIn(user)`. On failure the state
    /// is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] if another request is in flight, or
    /// [`SessionError::Auth`] if the provider rejects or fails the exchange.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).inspect_err(|_| {
            tracing::warn!(email, "sign-in rejected: request already in flight");
        })?;

        match self.provider.sign_in_with_credential(email, password).await {
            Ok(user) => {
                self.transition(Session::SignedIn(user.clone()), "sign_in");
                Ok(user)
            }
            Err(err) => {
                tracing::warn!(email, error = %err, "sign-in failed");
                Err(err.into())
            }
        }
    }

    /// Signs out of the current session.
    ///
    /// On success the state becomes `SignedOut`. On failure the previous
    /// session is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] if another request is in flight, or
    /// [`SessionError::Auth`] if the provider fails the request.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).inspect_err(|_| {
            tracing::warn!("sign-out rejected: request already in flight");
        })?;

        match self.provider.sign_out().await {
            Ok(()) => {
                self.transition(Session::SignedOut, "sign_out");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "sign-out failed; keeping session");
                Err(err.into())
            }
        }
    }

    fn transition(&self, next: Session, source: &'static str) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!(from = %current, to = %next, source, "session transition");
            *current = next;
            true
        });
    }
}
