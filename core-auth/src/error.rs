use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed ({status}): {reason}")]
    AuthenticationFailed { status: u16, reason: String },

    #[error("Invalid client credentials: {0}")]
    InvalidClient(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Auth error: {0}")]
    Other(String),
}

impl AuthError {
    /// Whether the identity platform rejected the credential itself, as
    /// opposed to a transient or transport failure.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidClient(_) | AuthError::AuthenticationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
