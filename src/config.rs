//! Configuration types for PDF field extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls and to diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Pdf2CsvError;
use crate::progress::ProgressCallback;
use crate::provider::ExtractionProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one PDF-to-CSV extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2csv::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.0-flash")
///     .split_pages(true)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier passed to the provider. Default: `gemini-2.0-flash`.
    pub model: String,

    /// Pre-constructed provider. Takes precedence over env-based resolution.
    pub provider: Option<Arc<dyn ExtractionProvider>>,

    /// Submit one model call per page instead of one for the whole document. Default: false.
    ///
    /// Per-page mode bounds how much content each call carries and isolates
    /// failures: a page whose reply cannot be parsed costs that page, not the
    /// document. The cost is one HTTP round trip per page, issued strictly in
    /// sequence. Whole-document mode is faster and cheaper for short PDFs and
    /// is the default.
    pub split_pages: bool,

    /// Page selection, applied only in per-page mode. Default: all pages.
    pub pages: PageSelection,

    /// Sampling temperature for the model. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what is on the page —
    /// exactly what you want for data extraction. Higher values introduce
    /// creativity that worsens accuracy.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A truncated reply is an unparseable reply: the closing `]` is the
    /// first thing lost. Dense tables can exceed 4 000 output tokens, so the
    /// default leaves generous headroom.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient model-call failure. Default: 3.
    ///
    /// Most 5xx and timeout errors are transient. Permanent errors (bad API
    /// key, 400) are not retried — they surface immediately. Set to 0 to
    /// disable retries entirely.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Custom extraction prompt. If None, one is built from the field spec.
    ///
    /// The override replaces the whole prompt; it is the caller's job to ask
    /// for a JSON array the salvage parser can recognise.
    pub prompt_override: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Progress callback fired per page. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            provider: None,
            split_pages: false,
            pages: PageSelection::default(),
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            prompt_override: None,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field(
                "provider",
                &self.provider.as_ref().map(|_| "<dyn ExtractionProvider>"),
            )
            .field("split_pages", &self.split_pages)
            .field("pages", &self.pages)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ExtractionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn split_pages(mut self, v: bool) -> Self {
        self.config.split_pages = v;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn prompt_override(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_override = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2CsvError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Pdf2CsvError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2CsvError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2CsvError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to submit in per-page mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Submit all pages (default).
    #[default]
    All,
    /// Submit a single page (1-indexed).
    Single(usize),
    /// Submit a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Submit specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
