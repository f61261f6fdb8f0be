use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub demo_email: String,
    pub demo_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            demo_email: "johndoe@gmail.com".to_string(),
            demo_password: "12121212".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid credentials, use the configured demo account")]
    InvalidCredentials,
    #[error("please fill in all fields")]
    MissingFields,
    #[error("session has been signed out")]
    SignedOut,
}

#[must_use]
pub fn unix_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Proof of sign-in handed to whatever needs to know who is asking.
/// Created by [`Authenticator`], dead after [`SessionContext::sign_out`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    email: String,
    display_name: Option<String>,
    signed_in_at_unix_ms: u128,
    active: bool,
}

impl SessionContext {
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }

    #[must_use]
    pub fn signed_in_at_unix_ms(&self) -> u128 {
        self.signed_in_at_unix_ms
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn require_active(&self) -> Result<&Self, SessionError> {
        if self.active {
            Ok(self)
        } else {
            Err(SessionError::SignedOut)
        }
    }

    pub fn sign_out(&mut self) {
        if self.active {
            info!(email = %self.email, "signed out");
        }
        self.active = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }
        if email != self.config.demo_email || password != self.config.demo_password {
            warn!(email, "rejected sign-in");
            return Err(SessionError::InvalidCredentials);
        }
        info!(email, "signed in");
        Ok(open_session(email, None))
    }

    /// Account creation is simulated: any complete form yields a session.
    pub fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionContext, SessionError> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() || password.trim().is_empty() {
            return Err(SessionError::MissingFields);
        }
        info!(email, "account created");
        Ok(open_session(email, Some(name)))
    }
}

fn open_session(email: &str, display_name: Option<&str>) -> SessionContext {
    SessionContext {
        email: email.to_string(),
        display_name: display_name.map(str::to_string),
        signed_in_at_unix_ms: unix_timestamp_millis(),
        active: true,
    }
}
