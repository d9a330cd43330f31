//! # Fetch First Batch
//!
//! Runs a full load against a real tenant and prints the first batch of
//! documents.
//!
//! Credentials come from `SHAREPOINT_CLIENT_ID`, `SHAREPOINT_CLIENT_SECRET`,
//! and `SHAREPOINT_CLIENT_DIRECTORY_ID`. Scope comes from `SHAREPOINT_SITES`
//! (comma-separated); leave it unset to walk every site.
//!
//! Run with: `cargo run --example fetch_first_batch --package provider-sharepoint`

use bridge_desktop::ReqwestHttpClient;
use core_auth::ClientCredentials;
use core_runtime::config::ConnectorConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use futures::StreamExt;
use provider_sharepoint::SharePointConnector;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("provider_sharepoint=debug,core_auth=info"),
    )?;

    let config = ConnectorConfig::from_env()?;
    let credentials = ClientCredentials::from_env()?;

    let mut connector = SharePointConnector::new(config)?;
    connector.load_credentials(credentials, Arc::new(ReqwestHttpClient::new()?));

    let mut batches = connector.load_from_state()?;
    let Some(batch) = batches.next().await else {
        println!("No batches produced");
        return Ok(());
    };

    let batch = batch?;
    println!("First batch: {} document(s)", batch.len());
    for document in &batch {
        println!(
            "- {} [{}] updated {} ({} chars)",
            document.semantic_identifier,
            document.metadata.get("drive").map(String::as_str).unwrap_or("?"),
            document.doc_updated_at,
            document.text().len(),
        );
    }

    Ok(())
}
