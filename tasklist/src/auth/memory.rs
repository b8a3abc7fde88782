//! In-process identity provider.
//!
//! Keeps a credential table in memory and fans session changes out to every
//! subscriber over `tokio::sync::mpsc` channels. Failure injection and an
//! optional artificial latency make the error and concurrency paths of the
//! session layer reachable from tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tasklist_proto::session::User;
use tokio::sync::mpsc;

use super::{AuthError, AuthProvider};

/// Default per-subscriber notification buffer.
const DEFAULT_NOTIFICATION_BUFFER: usize = 16;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    display_name: Option<String>,
}

/// Identity provider backed by an in-memory credential table.
pub struct InMemoryAuthProvider {
    /// Email -> account record.
    accounts: Mutex<HashMap<String, Account>>,
    /// The provider-side signed-in user.
    current: Mutex<Option<User>>,
    /// Live notification channels.
    subscribers: Mutex<Vec<mpsc::Sender<Option<User>>>>,
    /// When set, every request fails with [`AuthError::Network`].
    network_down: AtomicBool,
    /// Delay applied before answering a request.
    latency: Mutex<Duration>,
    /// Capacity of each subscriber channel.
    buffer: usize,
}

impl InMemoryAuthProvider {
    /// Creates a provider with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_NOTIFICATION_BUFFER)
    }

    /// Creates a provider with a custom per-subscriber buffer.
    #[must_use]
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            network_down: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            buffer: buffer.max(1),
        }
    }

    /// Registers an account. A missing display name falls back to the
    /// default user name when the account signs in.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, display_name: Option<&str>) -> Self {
        self.add_account(email, password, display_name);
        self
    }

    /// Registers or replaces an account.
    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) {
        self.accounts.lock().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                display_name: display_name.map(str::to_string),
            },
        );
    }

    /// Simulates losing (or regaining) connectivity to the provider.
    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    /// Delays every subsequent request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Returns the provider-side signed-in user.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.current.lock().clone()
    }

    /// Number of subscribers whose receiver is still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }

    /// Restores a session on the provider side without a local request,
    /// as happens when persisted credentials are picked up at startup.
    pub async fn restore_session(&self, user: User) {
        *self.current.lock() = Some(user.clone());
        self.notify(Some(user)).await;
    }

    /// Ends the session on the provider side without a local request,
    /// e.g. a token revoked elsewhere.
    pub async fn expire_session(&self) {
        *self.current.lock() = None;
        self.notify(None).await;
    }

    async fn notify(&self, user: Option<User>) {
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        for tx in subscribers {
            // A closed receiver means the subscriber unsubscribed.
            let _ = tx.send(user.clone()).await;
        }
        self.subscribers.lock().retain(|tx| !tx.is_closed());
    }

    async fn begin_request(&self) -> Result<(), AuthError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.network_down.load(Ordering::SeqCst) {
            return Err(AuthError::Network("identity provider unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in_with_credential(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.begin_request().await?;

        let account = self.accounts.lock().get(email).cloned();
        let user = match account {
            Some(account) if account.password == password => {
                User::from_provider(account.display_name.as_deref(), Some(email))
            }
            _ => return Err(AuthError::InvalidCredential),
        };

        *self.current.lock() = Some(user.clone());
        self.notify(Some(user.clone())).await;
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.begin_request().await?;
        *self.current.lock() = None;
        self.notify(None).await;
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<Option<User>> {
        let (tx, rx) = mpsc::channel(self.buffer);
        // Fresh channel with capacity >= 1, so the initial push cannot fail.
        let _ = tx.try_send(self.current.lock().clone());
        self.subscribers.lock().push(tx);
        rx
    }
}
