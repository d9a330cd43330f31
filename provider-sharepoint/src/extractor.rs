//! Text extraction seam
//!
//! Turning office formats and PDFs into text is the job of an external
//! component. The connector only needs [`TextExtractor`]; the bundled
//! [`Utf8TextExtractor`] handles plain text.

use crate::error::{Result, SharePointError};

/// Extracts indexable text from raw file content.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `content`.
    ///
    /// With `break_on_unprocessable` unset, content the extractor cannot
    /// handle yields a best-effort result instead of an error.
    fn extract(&self, content: &[u8], file_name: &str, break_on_unprocessable: bool)
        -> Result<String>;
}

/// Treats every file as UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8TextExtractor;

impl TextExtractor for Utf8TextExtractor {
    fn extract(
        &self,
        content: &[u8],
        file_name: &str,
        break_on_unprocessable: bool,
    ) -> Result<String> {
        match std::str::from_utf8(content) {
            Ok(text) => Ok(text.to_string()),
            Err(err) if break_on_unprocessable => Err(SharePointError::Extraction {
                file_name: file_name.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Ok(String::from_utf8_lossy(content).into_owned()),
        }
    }
}
