//! Appliance Authentication
//!
//! The management API uses HTTP basic authentication. Credentials come from a
//! config profile, CLI flags, or the environment.

use anyhow::{Context, Result};
use std::fmt;

/// Environment variable holding the management password
pub const PASSWORD_ENV: &str = "ISAMCFG_PASSWORD";

/// Environment variable holding the management user
pub const USERNAME_ENV: &str = "ISAMCFG_USERNAME";

/// Default management account on a fresh appliance
pub const DEFAULT_USERNAME: &str = "admin@local";

/// Basic auth credentials for the management interface
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Resolve credentials, falling back to the environment for anything not given
    pub fn resolve(username: Option<&str>, password: Option<&str>) -> Result<Self> {
        let username = username
            .map(str::to_string)
            .or_else(|| std::env::var(USERNAME_ENV).ok())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        if !validate_username(&username) {
            anyhow::bail!("Invalid username: {}", username);
        }

        let password = match password {
            Some(p) => p.to_string(),
            None => std::env::var(PASSWORD_ENV)
                .with_context(|| format!("No password configured. Set {}", PASSWORD_ENV))?,
        };

        Ok(Self { username, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// Security: never print the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Usernames are local accounts (`admin`, `admin@local`) or LDAP style names
fn validate_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 256
        && !username.contains(':')
        && username.chars().all(|c| !c.is_control())
}
