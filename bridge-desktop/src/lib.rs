//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for processes running on a
//! regular OS (workstations, servers, CI runners).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! the connector needs:
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let settings = SqliteSettingsStore::new("connector.db".into()).await?;
//!
//!     // Hand both to the connector configuration
//!     Ok(())
//! }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
