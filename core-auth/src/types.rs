use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

pub const ENV_CLIENT_ID: &str = "SHAREPOINT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SHAREPOINT_CLIENT_SECRET";
pub const ENV_DIRECTORY_ID: &str = "SHAREPOINT_CLIENT_DIRECTORY_ID";

/// Application credentials registered in a Microsoft Entra directory.
///
/// # Security
///
/// The `Debug` implementation redacts the client secret.
///
/// # Examples
///
/// ```
/// use core_auth::ClientCredentials;
///
/// let credentials = ClientCredentials::new("app-id", "secret", "tenant-id");
/// assert!(!format!("{:?}", credentials).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub directory_id: String,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        directory_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            directory_id: directory_id.into(),
        }
    }

    /// Reads `SHAREPOINT_CLIENT_ID`, `SHAREPOINT_CLIENT_SECRET`, and
    /// `SHAREPOINT_CLIENT_DIRECTORY_ID`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingConfiguration` naming the first variable
    /// that is unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AuthError::MissingConfiguration(format!("{} is not set", key)))
        };

        Ok(Self {
            client_id: read(ENV_CLIENT_ID)?,
            client_secret: read(ENV_CLIENT_SECRET)?,
            directory_id: read(ENV_DIRECTORY_ID)?,
        })
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("directory_id", &self.directory_id)
            .finish()
    }
}

/// A bearer token with its absolute expiry.
#[derive(Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token that expires `expires_in` seconds after `issued_at`.
    pub fn new(secret: String, issued_at: DateTime<Utc>, expires_in: i64) -> Self {
        Self {
            secret,
            expires_at: issued_at + Duration::seconds(expires_in),
        }
    }

    /// Whether the token is expired, or will be within `buffer_seconds` of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now >= self.expires_at - Duration::seconds(buffer_seconds)
    }
}

// Never print the bearer value
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
