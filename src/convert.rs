//! Eager (full-document) extraction entry points.
//!
//! This module provides the simpler API: run the whole pipeline, then return
//! one [`ExtractionOutput`] holding the CSV, the records, and per-page
//! detail. Use [`crate::stream::extract_stream`] instead when you want page
//! results progressively.
//!
//! Two processing paths exist (spec'd by [`ExtractionConfig::split_pages`]):
//!
//! * **whole-document** — one model call for the entire PDF. A reply that
//!   yields no salvageable JSON is fatal.
//! * **per-page** — the document is split into standalone single-page PDFs
//!   which are submitted strictly in sequence. A page whose reply cannot be
//!   parsed, or parses to zero or one record, contributes nothing and the
//!   run continues; one returned record is treated as a template echo rather
//!   than real data.

use crate::config::ExtractionConfig;
use crate::error::{PageError, Pdf2CsvError};
use crate::fields::{FieldSpec, Record};
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageOutcome};
use crate::pipeline::{csv, input, model, parse, split};
use crate::prompts::build_extraction_prompt;
use crate::provider::{DocumentPayload, ExtractionProvider, GeminiClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A page must yield at least this many records to count as real data; a
/// single record is assumed to be the model echoing the prompt's template.
const MIN_USABLE_RECORDS: usize = 2;

/// Extract structured records from a PDF file or URL and export them as CSV.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `fields` — Ordered field names defining the CSV columns
/// * `config` — Extraction configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some pages failed in per-page
/// mode (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(Pdf2CsvError)` only for fatal errors:
/// - File not found / not a valid PDF / unparseable PDF
/// - No provider configured
/// - Whole-document reply with no salvageable JSON
/// - Zero records extracted across the entire document
pub async fn extract(
    input_str: impl AsRef<str>,
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2CsvError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let bytes = input::resolve_input(input_str, config.download_timeout_secs).await?;
    extract_inner(&bytes, fields, config).await
}

/// Extract from PDF bytes already in memory.
///
/// This is the API to use when the document comes from an upload, a
/// database, or a network stream rather than a file on disk.
pub async fn extract_from_bytes(
    bytes: &[u8],
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2CsvError> {
    input::ensure_pdf_magic(bytes, "<bytes>")?;
    extract_inner(bytes, fields, config).await
}

/// Extract and write the CSV directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    fields: &FieldSpec,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, Pdf2CsvError> {
    let output = extract(input_str, fields, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Pdf2CsvError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, &output.csv)
        .await
        .map_err(|e| Pdf2CsvError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Pdf2CsvError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(input_str, fields, config))
}

/// Read PDF metadata without extracting content.
///
/// Does not require a provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2CsvError> {
    let bytes = input::resolve_input(input_str.as_ref(), 120).await?;
    split::extract_metadata(&bytes)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the provider: a pre-built one from the config wins, otherwise a
/// Gemini client is created from the environment.
pub(crate) fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn ExtractionProvider>, Pdf2CsvError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    Ok(Arc::new(GeminiClient::from_env(config.model.clone())?))
}

/// Resolve the prompt: caller override wins, otherwise built from the field list.
pub(crate) fn resolve_prompt(fields: &FieldSpec, config: &ExtractionConfig) -> String {
    config
        .prompt_override
        .clone()
        .unwrap_or_else(|| build_extraction_prompt(fields))
}

async fn extract_inner(
    bytes: &[u8],
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2CsvError> {
    let total_start = Instant::now();

    let metadata = split::extract_metadata(bytes)?;
    info!("PDF has {} pages", metadata.page_count);

    let provider = resolve_provider(config)?;
    let prompt = resolve_prompt(fields, config);

    let (records, pages, mut stats) = if config.split_pages {
        extract_per_page(bytes, fields, &prompt, &provider, &metadata, config).await?
    } else {
        extract_whole(bytes, fields, &prompt, &provider, config).await?
    };

    if records.is_empty() {
        let pages_processed = if config.split_pages { pages.len() } else { 1 };
        return Err(Pdf2CsvError::NoRecords { pages_processed });
    }

    let csv = csv::to_csv(&records, fields);

    stats.total_pages = metadata.page_count;
    stats.total_records = records.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} records, {}ms total",
        stats.total_records, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        csv,
        records,
        pages,
        metadata,
        stats,
    })
}

/// Whole-document path: one model call, salvage failure is fatal.
async fn extract_whole(
    bytes: &[u8],
    fields: &FieldSpec,
    prompt: &str,
    provider: &Arc<dyn ExtractionProvider>,
    config: &ExtractionConfig,
) -> Result<(Vec<Record>, Vec<PageOutcome>, ExtractionStats), Pdf2CsvError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(1);
        cb.on_page_start(1, 1);
    }

    let payload = DocumentPayload::from_pdf_bytes(bytes);
    let outcome = model::call_model(provider, None, prompt, &payload, config).await;

    if let Some(err) = outcome.error {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_error(1, 1, &err.to_string());
        }
        return Err(promote_page_error(err, config));
    }

    let value = parse::salvage_json(&outcome.text).ok_or_else(|| Pdf2CsvError::ResponseFormat {
        snippet: snippet(&outcome.text),
    })?;
    let records = parse::records_from_value(&value, fields);

    if let Some(ref cb) = config.progress_callback {
        cb.on_page_complete(1, 1, records.len());
        cb.on_extraction_complete(1, usize::from(!records.is_empty()));
    }

    let stats = ExtractionStats {
        contributing_pages: usize::from(!records.is_empty()),
        total_input_tokens: outcome.input_tokens as u64,
        total_output_tokens: outcome.output_tokens as u64,
        model_duration_ms: outcome.duration_ms,
        ..Default::default()
    };

    Ok((records, Vec::new(), stats))
}

/// Per-page path: split, submit sequentially, skip unusable pages.
async fn extract_per_page(
    bytes: &[u8],
    fields: &FieldSpec,
    prompt: &str,
    provider: &Arc<dyn ExtractionProvider>,
    metadata: &DocumentMetadata,
    config: &ExtractionConfig,
) -> Result<(Vec<Record>, Vec<PageOutcome>, ExtractionStats), Pdf2CsvError> {
    let page_indices = config.pages.to_indices(metadata.page_count);
    if page_indices.is_empty() {
        return Err(Pdf2CsvError::PageOutOfRange {
            page: 0,
            total: metadata.page_count,
        });
    }
    debug!("Selected {} pages for extraction", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(page_indices.len());
    }

    let split_start = Instant::now();
    let buffers = split::split_pages(bytes)?;
    let split_duration_ms = split_start.elapsed().as_millis() as u64;
    info!("Split {} pages in {}ms", buffers.len(), split_duration_ms);

    let model_start = Instant::now();
    let total = page_indices.len();
    let mut pages: Vec<PageOutcome> = Vec::with_capacity(total);
    for &idx in &page_indices {
        let outcome =
            process_page(provider, idx + 1, total, prompt, &buffers[idx], fields, config).await;
        pages.push(outcome);
    }
    let model_duration_ms = model_start.elapsed().as_millis() as u64;

    let failed = pages.iter().filter(|p| p.error.is_some()).count();
    if failed == pages.len() {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Pdf2CsvError::AllPagesFailed {
            total: pages.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    let contributing = pages.iter().filter(|p| p.contributed()).count();
    let skipped = pages.iter().filter(|p| p.skipped).count();
    let records: Vec<Record> = pages.iter().flat_map(|p| p.records.clone()).collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(total, contributing);
    }

    let stats = ExtractionStats {
        contributing_pages: contributing,
        skipped_pages: skipped,
        failed_pages: failed,
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        split_duration_ms,
        model_duration_ms,
        ..Default::default()
    };

    Ok((records, pages, stats))
}

/// Submit one page and interpret its reply. Shared with the streaming API.
pub(crate) async fn process_page(
    provider: &Arc<dyn ExtractionProvider>,
    page_num: usize,
    total: usize,
    prompt: &str,
    buffer: &[u8],
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> PageOutcome {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }

    let payload = DocumentPayload::from_pdf_bytes(buffer);
    let call = model::call_model(provider, Some(page_num), prompt, &payload, config).await;

    if let Some(err) = call.error {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_error(page_num, total, &err.to_string());
        }
        return PageOutcome {
            page_num,
            records: Vec::new(),
            skipped: false,
            input_tokens: call.input_tokens,
            output_tokens: call.output_tokens,
            duration_ms: call.duration_ms,
            retries: call.retries,
            error: Some(err),
        };
    }

    let records = parse::parse_records(&call.text, fields);
    let skipped = records.len() < MIN_USABLE_RECORDS;
    if skipped {
        debug!(
            "Page {}: {} record(s), treated as no usable data",
            page_num,
            records.len()
        );
    }
    let records = if skipped { Vec::new() } else { records };

    if let Some(ref cb) = config.progress_callback {
        cb.on_page_complete(page_num, total, records.len());
    }

    PageOutcome {
        page_num,
        records,
        skipped,
        input_tokens: call.input_tokens,
        output_tokens: call.output_tokens,
        duration_ms: call.duration_ms,
        retries: call.retries,
        error: None,
    }
}

/// Promote a whole-document page error to its fatal equivalent.
fn promote_page_error(err: PageError, config: &ExtractionConfig) -> Pdf2CsvError {
    match err {
        PageError::Timeout { .. } => Pdf2CsvError::ApiTimeout {
            elapsed_ms: config.api_timeout_secs * 1000,
        },
        PageError::ModelFailed { detail, .. } => Pdf2CsvError::Extraction { message: detail },
        PageError::SplitFailed { detail, .. } => Pdf2CsvError::DocumentParse { detail },
    }
}

/// First line of the reply, truncated, for error messages.
fn snippet(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or("");
    first_line.chars().take(80).collect()
}
