//! Text extraction collaborator boundary.
//!
//! Format-specific extraction (PDF, DOCX, spreadsheets) lives outside this
//! crate. The contract is deliberately total: an extractor returns an empty
//! string for unsupported or corrupt input instead of raising past the
//! boundary, and the ingestion job maps empty text to a terminal `no_text`
//! outcome rather than a retryable failure.

/// Turns raw document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes`; returns an empty string when the format is
    /// unsupported or the content is unrecoverable.
    fn extract(&self, filename: &str, bytes: &[u8]) -> String;
}

/// Default extractor: lossy UTF-8 decode of the raw bytes.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes).into_owned();
        tracing::debug!(filename, bytes = bytes.len(), "Extracted plain text");
        text
    }
}
