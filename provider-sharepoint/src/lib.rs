//! # SharePoint Provider
//!
//! Ingests documents from SharePoint Online through Microsoft Graph.
//!
//! ## Overview
//!
//! This crate provides:
//! - Scope resolution from site / library / folder URLs
//! - Tenant-wide site discovery when no scope is configured
//! - Lazy recursive drive listing with server-side paging
//! - Folder and modification-time filtering
//! - Rate-limit aware retry with `Retry-After` support
//! - Size-gated content download and text extraction
//! - Batched document streams for full loads and polls
//!
//! ## Usage
//!
//! ```ignore
//! use provider_sharepoint::SharePointConnector;
//!
//! let mut connector = SharePointConnector::new(ConnectorConfig::from_env()?)?;
//! connector.load_credentials(ClientCredentials::from_env()?, http_client);
//! let batches = connector.load_from_state()?;
//! ```

pub mod connector;
pub mod converter;
pub mod document;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod pager;
pub mod retry;
pub mod scope;
pub mod sites;
pub mod traverser;
pub mod types;

pub use connector::{DocumentBatchStream, SharePointConnector};
pub use converter::{ConversionOutcome, DocumentConverter};
pub use document::{BasicExpertInfo, Document, DocumentSource, TextSection};
pub use error::{Result, SharePointError};
pub use extractor::{TextExtractor, Utf8TextExtractor};
pub use graph::{GraphClient, HttpGraphClient};
pub use pager::RecursiveItemPager;
pub use retry::{RetryPolicy, RetryingExecutor};
pub use scope::{resolve_scope, ScopeTarget};
pub use sites::SiteEnumerator;
pub use traverser::{ItemTraverser, SecondsSinceUnixEpoch, TimeWindow};
pub use types::{Drive, DriveItem, Site};
