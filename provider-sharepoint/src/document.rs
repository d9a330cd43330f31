//! Normalized document records handed to the indexing pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key holding the container label of a document's drive
pub const METADATA_DRIVE: &str = "drive";

/// System a document was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    SharePoint,
}

/// A block of extracted text with the link it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSection {
    pub link: Option<String>,
    pub text: String,
}

/// Person credited with a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicExpertInfo {
    pub display_name: String,
    pub email: Option<String>,
}

/// One indexed unit.
///
/// `id` is the remote item id and is stable across runs, so repeated loads
/// of unchanged content produce the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: DocumentSource,
    pub sections: Vec<TextSection>,
    /// Human readable name shown in search results
    pub semantic_identifier: String,
    pub doc_updated_at: DateTime<Utc>,
    pub primary_owners: Vec<BasicExpertInfo>,
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Concatenated text of every section.
    pub fn text(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
