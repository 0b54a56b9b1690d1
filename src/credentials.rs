//! Credential resolution
//!
//! Credentials are resolved once, before any case starts, and handed to the
//! engine as an immutable value. Resolution takes the lookup function as a
//! parameter so tests never depend on the process environment.

use std::fmt;

/// Environment variable holding the login name
pub const USERNAME_VAR: &str = "USERNAME";
/// Environment variable holding the login password
pub const PASSWORD_VAR: &str = "PASSWORD";

/// Placeholder login name used when none is configured
pub const DEFAULT_USERNAME: &str = "defaultUser";
/// Placeholder password used when none is configured
pub const DEFAULT_PASSWORD: &str = "defaultPassword";

/// Username/password pair shared read-only by every case
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Resolve credentials through `lookup`, falling back to the placeholder
    /// pair for any value that is unset or empty. Never fails.
    pub fn resolve<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str, fallback: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            username: value(USERNAME_VAR, DEFAULT_USERNAME),
            password: value(PASSWORD_VAR, DEFAULT_PASSWORD),
        }
    }

    /// Resolve credentials from the process environment
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Whether the username is the placeholder value
    pub fn is_default_username(&self) -> bool {
        self.username == DEFAULT_USERNAME
    }

    /// Whether the password is the placeholder value
    pub fn is_default_password(&self) -> bool {
        self.password == DEFAULT_PASSWORD
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}
