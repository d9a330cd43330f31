//! Error types for the SharePoint provider

use std::time::Duration;
use thiserror::Error;

/// SharePoint provider errors
#[derive(Error, Debug)]
pub enum SharePointError {
    /// Graph API request returned a non-success status
    #[error("Graph API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Server-requested delay from the `Retry-After` header
        retry_after: Option<Duration>,
    },

    /// No graph client installed; `load_credentials` was never called
    #[error("Missing credentials for SharePoint connector")]
    MissingCredential,

    /// Tenant-wide enumeration returned zero sites
    #[error("No sites found in the tenant")]
    NoSitesFound,

    /// Poll window bounds cannot be represented as timestamps
    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    /// Failed to parse a Graph API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Text extraction refused the content
    #[error("Text extraction failed for '{file_name}': {reason}")]
    Extraction { file_name: String, reason: String },

    /// Token acquisition failed
    #[error(transparent)]
    Auth(#[from] core_auth::AuthError),

    /// Transport or host bridge error
    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),

    /// Connector configuration was rejected
    #[error(transparent)]
    Config(#[from] core_runtime::Error),
}

/// Result type for SharePoint operations
pub type Result<T> = std::result::Result<T, SharePointError>;

impl SharePointError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SharePointError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate limited (429) or service unavailable (503).
    pub fn is_retryable(&self) -> bool {
        matches!(self.status(), Some(429) | Some(503))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SharePointError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether a failure while resolving a site means the scope or the
    /// credential is wrong, rather than the site simply holding no drives.
    pub fn is_fatal_site_error(&self) -> bool {
        match self {
            SharePointError::Api {
                status, message, ..
            } => matches!(status, 401 | 403 | 404) || message.contains("invalid_client"),
            SharePointError::Auth(err) => err.is_credential_rejection(),
            SharePointError::MissingCredential => true,
            _ => false,
        }
    }
}

impl From<SharePointError> for bridge_traits::error::BridgeError {
    fn from(error: SharePointError) -> Self {
        match error {
            SharePointError::Bridge(e) => e,
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}
