//! Text extraction for the supported document formats.
//!
//! Formats form a closed set selected by file extension at the pipeline
//! boundary. Each variant extracts plain UTF-8 text from raw bytes; PDF
//! pages are concatenated in order with newline separators.

use std::path::Path;

/// A source document format recognized by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

/// Extraction error. A document-level failure; the pipeline decides
/// whether to abort the run or skip the item.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl DocumentFormat {
    /// Select the format for a path by its extension (case-insensitive).
    /// Returns `None` for extensions outside the supported set.
    pub fn from_path(path: &Path) -> Option<DocumentFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentFormat::PlainText),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }

    /// Extract plain text from raw document bytes.
    pub fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        match self {
            DocumentFormat::PlainText => extract_plain_text(bytes),
            DocumentFormat::Pdf => extract_pdf(bytes),
        }
    }
}

/// Stray bytes from legacy encodings are replaced rather than failing
/// the whole document.
fn extract_plain_text(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Extract PDF text page by page and join pages with newlines.
/// A page the extractor cannot render contributes an empty string;
/// only a document-level parse failure is an error.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages.join("\n"))
}
