//! # pdf2csv
//!
//! Extract structured fields from PDF documents into CSV using generative
//! AI models.
//!
//! ## Why this crate?
//!
//! Pulling tabular data out of PDFs (invoices, order forms, survey results)
//! with layout-based parsers breaks on every new template. This crate takes
//! the opposite approach: you name the fields you want, the PDF goes to a
//! multimodal model as an inline payload, and the model's free-form reply is
//! salvage-parsed into records and flattened into a spreadsheet-ready CSV.
//! The model is treated as an opaque bytes-plus-instructions → text function;
//! everything it returns is tolerated and projected onto your field list.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Split      optional: one standalone single-page PDF per page (lopdf)
//!  ├─ 3. Prompt     build a JSON-array extraction prompt from the field list
//!  ├─ 4. Model      sequential calls to Gemini with inline PDF payloads
//!  ├─ 5. Salvage    recover JSON from fences / prose / partial replies
//!  ├─ 6. Normalize  project every record onto exactly the requested fields
//!  └─ 7. Export     UTF-8-BOM CSV, quoted cells, column order = field order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2csv::{extract, ExtractionConfig, FieldSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let fields = FieldSpec::parse("name, unit price, quantity")?;
//!     let config = ExtractionConfig::default();
//!     let output = extract("invoice.pdf", &fields, &config).await?;
//!     std::fs::write("extracted_data.csv", &output.csv)?;
//!     eprintln!("{} records from {} pages",
//!         output.stats.total_records,
//!         output.stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2csv` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2csv = { version = "0.3", default-features = false }
//! ```
//!
//! ## Whole-document vs per-page
//!
//! The default submits the entire PDF in one call — fastest and cheapest for
//! short documents. `split_pages(true)` submits one standalone single-page
//! PDF per call, strictly in sequence: replies stay small enough to never
//! truncate, and a bad page costs that page instead of the whole run.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod fields;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use convert::{extract, extract_from_bytes, extract_sync, extract_to_file, inspect};
pub use error::{PageError, Pdf2CsvError};
pub use fields::{FieldSpec, Record};
pub use output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageOutcome};
pub use progress::{ExtractionProgressCallback, ProgressCallback};
pub use provider::{
    DocumentPayload, ExtractionProvider, GeminiClient, GenerationOptions, ModelResponse,
};
pub use stream::{extract_stream, extract_stream_from_bytes};
