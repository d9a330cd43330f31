//! Drive item to document conversion

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::document::{
    BasicExpertInfo, Document, DocumentSource, TextSection, METADATA_DRIVE,
};
use crate::error::Result;
use crate::extractor::TextExtractor;
use crate::graph::GraphClient;
use crate::retry::RetryingExecutor;
use crate::types::DriveItem;

/// Result of converting one drive item.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Emitted(Document),
    /// Reported size exceeds the threshold; content was never fetched
    SkippedTooLarge { size: u64, threshold: u64 },
    /// The service returned no content
    SkippedEmpty,
    /// The item carries no drive reference, so its content is unaddressable
    SkippedNoDrive,
}

impl ConversionOutcome {
    pub fn into_document(self) -> Option<Document> {
        match self {
            ConversionOutcome::Emitted(document) => Some(document),
            _ => None,
        }
    }
}

/// Fetches item content and builds [`Document`]s.
pub struct DocumentConverter {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
    extractor: Arc<dyn TextExtractor>,
    size_threshold: u64,
}

impl DocumentConverter {
    pub fn new(
        graph: Arc<dyn GraphClient>,
        retry: Arc<RetryingExecutor>,
        extractor: Arc<dyn TextExtractor>,
        size_threshold: u64,
    ) -> Self {
        Self {
            graph,
            retry,
            extractor,
            size_threshold,
        }
    }

    /// Convert `item`, reporting `container_label` as its drive.
    ///
    /// # Errors
    ///
    /// Content retrieval failures, including retry exhaustion, are returned
    /// as is. Items without a drive id are skipped with a warning.
    #[instrument(skip(self, item), fields(item = %item.name))]
    pub async fn convert(&self, item: DriveItem, container_label: &str) -> Result<ConversionOutcome> {
        match item.size {
            Some(size) if size > self.size_threshold => {
                warn!(
                    size,
                    threshold = self.size_threshold,
                    "File exceeds size threshold, skipping"
                );
                return Ok(ConversionOutcome::SkippedTooLarge {
                    size,
                    threshold: self.size_threshold,
                });
            }
            Some(_) => {}
            None => warn!("Could not access file size, proceeding with download"),
        }

        let Some(drive_id) = item.drive_id() else {
            warn!(item_id = %item.id, "Item has no drive reference, skipping");
            return Ok(ConversionOutcome::SkippedNoDrive);
        };

        let content = self
            .retry
            .execute("get_content", || self.graph.get_content(drive_id, &item.id))
            .await?;

        let Some(content) = content else {
            warn!("Could not access content");
            return Ok(ConversionOutcome::SkippedEmpty);
        };

        let text = match self.extractor.extract(&content, &item.name, false) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Text extraction failed, indexing without text");
                String::new()
            }
        };
        debug!(bytes = content.len(), chars = text.len(), "Extracted text");

        Ok(ConversionOutcome::Emitted(build_document(
            item,
            container_label,
            text,
        )))
    }
}

fn build_document(item: DriveItem, container_label: &str, text: String) -> Document {
    let owner = item.last_modifier();
    let owner = BasicExpertInfo {
        display_name: owner
            .and_then(|user| user.display_name.clone())
            .unwrap_or_default(),
        email: owner.and_then(|user| user.email.clone()),
    };

    Document {
        sections: vec![TextSection {
            link: item.web_url,
            text,
        }],
        source: DocumentSource::SharePoint,
        semantic_identifier: item.name,
        doc_updated_at: item.last_modified_date_time,
        primary_owners: vec![owner],
        metadata: HashMap::from([(METADATA_DRIVE.to_string(), container_label.to_string())]),
        id: item.id,
    }
}
