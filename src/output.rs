//! Output types: the final CSV plus per-page detail and run statistics.

use crate::error::PageError;
use crate::fields::Record;
use serde::{Deserialize, Serialize};

/// The complete result of one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final CSV text, UTF-8 with a leading byte-order mark.
    pub csv: String,
    /// All normalised records, in document order.
    pub records: Vec<Record>,
    /// Per-page detail. Empty in whole-document mode (the single call's
    /// tokens and duration are still reflected in `stats`).
    pub pages: Vec<PageOutcome>,
    /// Document metadata read from the PDF itself.
    pub metadata: DocumentMetadata,
    /// Aggregated run statistics.
    pub stats: ExtractionStats,
}

/// What one page contributed in per-page mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    /// Records this page contributed to the merged result.
    pub records: Vec<Record>,
    /// True when the page's reply parsed but yielded zero or one record and
    /// was therefore treated as containing no usable data.
    pub skipped: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries consumed before the call succeeded (or gave up).
    pub retries: u8,
    /// Set when the model call itself failed; the page contributed nothing.
    pub error: Option<PageError>,
}

impl PageOutcome {
    /// True when this page added at least one record to the merged result.
    pub fn contributed(&self) -> bool {
        self.error.is_none() && !self.records.is_empty()
    }
}

/// Document metadata read from the PDF trailer, no model call required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// Aggregated statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Model calls that succeeded and contributed records.
    pub contributing_pages: usize,
    /// Pages skipped under the zero-or-one-record policy.
    pub skipped_pages: usize,
    /// Pages that failed at the model-call level.
    pub failed_pages: usize,
    /// Records in the final CSV.
    pub total_records: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub split_duration_ms: u64,
    pub model_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_outcome_contributed() {
        let mut outcome = PageOutcome {
            page_num: 1,
            records: vec![],
            skipped: true,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        };
        assert!(!outcome.contributed());

        outcome.skipped = false;
        outcome.records = vec![Record::default()];
        assert!(outcome.contributed());

        outcome.error = Some(PageError::Timeout { page: 1, secs: 60 });
        assert!(!outcome.contributed());
    }
}
