//! Workspace facade crate.
//!
//! Re-exports the SharePoint connector together with the runtime, auth, and
//! desktop bridge crates behind feature flags, so host applications can depend
//! on `sharepoint-connector-workspace` alone and pick the pieces they need.

#[cfg(feature = "connector")]
pub use core_auth::{ClientCredentials, ClientCredentialsProvider, TokenProvider};
#[cfg(feature = "connector")]
pub use core_runtime::{config::ConnectorConfig, logging};
#[cfg(feature = "connector")]
pub use provider_sharepoint::{
    ConversionOutcome, Document, DocumentBatchStream, ScopeTarget, SharePointConnector,
    SharePointError, TextExtractor, TimeWindow,
};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
