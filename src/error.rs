//! Error types for the pdf2csv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2CsvError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input file, provider not configured, no usable data in the whole
//!   document). Returned as `Err(Pdf2CsvError)` from the top-level
//!   `extract*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (model call error,
//!   unparseable reply) but other pages are fine. Stored inside
//!   [`crate::output::PageOutcome`] so callers can inspect partial success
//!   rather than losing the whole document to one bad page.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! page failure, log and continue, or collect all errors for a post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2csv library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2CsvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("Input is not a valid PDF: '{input}'\nFirst bytes: {magic:?}")]
    NotAPdf { input: String, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF structure is corrupt and cannot be parsed or split.
    #[error("PDF document could not be parsed: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    DocumentParse { detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No provider could be resolved (missing API key etc.).
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned a non-retryable error.
    #[error("Extraction call failed: {message}")]
    Extraction { message: String },

    /// The model API returned HTTP 429 — caller should back off.
    ///
    /// Check `retry_after_secs` for a server-specified delay, or use
    /// exponential backoff if `None`.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The model API call timed out — the caller may retry.
    #[error("API call timed out after {elapsed_ms}ms")]
    ApiTimeout { elapsed_ms: u64 },

    /// The model API returned an authentication error (401/403) — retry unlikely to help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Every page failed at the model-call level; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── Result errors ─────────────────────────────────────────────────────
    /// No JSON could be salvaged from the model's reply (single-call mode).
    #[error("Model reply contained no parseable JSON.\nReply started with: {snippet:?}")]
    ResponseFormat { snippet: String },

    /// The document was processed but zero records were extracted.
    #[error("No records could be extracted from the document ({pages_processed} pages processed)")]
    NoRecords { pages_processed: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The field specification was empty after trimming.
    #[error("Field specification is empty.\nProvide at least one field name, e.g. --fields \"name,price,quantity\"")]
    InvalidFields,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page in per-page mode.
///
/// Stored alongside [`crate::output::PageOutcome`] when a page fails.
/// The overall extraction continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The single-page buffer could not be produced or submitted.
    #[error("Page {page}: split failed: {detail}")]
    SplitFailed { page: usize, detail: String },

    /// Model call failed after retries.
    #[error("Page {page}: model call failed after {retries} retries: {detail}")]
    ModelFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// Model call timed out.
    #[error("Page {page}: model call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_records_display() {
        let e = Pdf2CsvError::NoRecords { pages_processed: 4 };
        let msg = e.to_string();
        assert!(msg.contains("4 pages"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = Pdf2CsvError::RateLimitExceeded {
            provider: "gemini".into(),
            retry_after_secs: Some(60),
        };
        assert!(e.to_string().contains("gemini"));
    }

    #[test]
    fn response_format_display() {
        let e = Pdf2CsvError::ResponseFormat {
            snippet: "Sure, here you go".into(),
        };
        assert!(e.to_string().contains("Sure, here you go"));
    }

    #[test]
    fn auth_error_display() {
        let e = Pdf2CsvError::AuthError {
            provider: "gemini".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn page_error_display() {
        let e = PageError::ModelFailed {
            page: 3,
            retries: 2,
            detail: "HTTP 503".into(),
        };
        assert!(e.to_string().contains("Page 3"));
        assert!(e.to_string().contains("HTTP 503"));
    }
}
