//! Session and user types.

use serde::{Deserialize, Serialize};

/// Display name used when the identity provider has none for a user.
pub const DEFAULT_USER_NAME: &str = "User";

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    pub name: String,
    /// Email address used to sign in.
    pub email: String,
}

impl User {
    /// Creates a user record.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Builds a user from optional provider fields, filling in defaults.
    #[must_use]
    pub fn from_provider(display_name: Option<&str>, email: Option<&str>) -> Self {
        Self {
            name: display_name.unwrap_or(DEFAULT_USER_NAME).to_string(),
            email: email.unwrap_or_default().to_string(),
        }
    }
}

/// Current authentication status.
///
/// `Unknown` is the initial state until the identity provider delivers its
/// first notification; it is distinct from a confirmed `SignedOut`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "user")]
pub enum Session {
    /// The provider has not reported yet.
    #[default]
    Unknown,
    /// Confirmed: no user is signed in.
    SignedOut,
    /// A user is signed in.
    SignedIn(User),
}

impl Session {
    /// Maps a provider notification onto a session value.
    #[must_use]
    pub fn from_notification(user: Option<User>) -> Self {
        user.map_or(Self::SignedOut, Self::SignedIn)
    }

    /// Returns `true` once the provider has reported at least once.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns `true` if a user is signed in.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Unknown | Self::SignedOut => None,
        }
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::SignedOut => write!(f, "signed out"),
            Self::SignedIn(user) => write!(f, "signed in as {} <{}>", user.name, user.email),
        }
    }
}
