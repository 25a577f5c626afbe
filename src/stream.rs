//! Streaming extraction API: emit page outcomes as they complete.
//!
//! ## Why stream?
//!
//! Long documents take a model call per page, and per-page calls run
//! strictly in sequence. A stream-based API lets callers display partial
//! results immediately or persist records incrementally instead of waiting
//! for the whole run.
//!
//! Unlike the eager [`crate::convert::extract`] which returns only after the
//! last page, [`extract_stream`] yields one [`PageOutcome`] per selected
//! page, in document order. The zero-or-one-record skip policy is already
//! applied to each yielded outcome; merging, the empty-result check, and CSV
//! assembly stay with the caller.

use crate::config::ExtractionConfig;
use crate::convert::{process_page, resolve_prompt, resolve_provider};
use crate::error::Pdf2CsvError;
use crate::fields::FieldSpec;
use crate::output::PageOutcome;
use crate::pipeline::{input, split};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page outcomes, emitted in document order.
pub type PageOutcomeStream = Pin<Box<dyn Stream<Item = PageOutcome> + Send>>;

/// Extract a PDF page by page, streaming each outcome as it is ready.
///
/// Streaming always implies per-page mode; `config.split_pages` is ignored.
///
/// # Returns
/// - `Ok(PageOutcomeStream)` — one item per selected page
/// - `Err(Pdf2CsvError)` — fatal setup error (bad input, unparseable PDF,
///   no provider, empty page selection)
pub async fn extract_stream(
    input_str: impl AsRef<str>,
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<PageOutcomeStream, Pdf2CsvError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming extraction: {}", input_str);

    let bytes = input::resolve_input(input_str, config.download_timeout_secs).await?;
    extract_stream_from_bytes(&bytes, fields, config).await
}

/// Streaming variant of [`crate::convert::extract_from_bytes`].
pub async fn extract_stream_from_bytes(
    bytes: &[u8],
    fields: &FieldSpec,
    config: &ExtractionConfig,
) -> Result<PageOutcomeStream, Pdf2CsvError> {
    input::ensure_pdf_magic(bytes, "<bytes>")?;

    let metadata = split::extract_metadata(bytes)?;
    let page_indices = config.pages.to_indices(metadata.page_count);
    if page_indices.is_empty() {
        return Err(Pdf2CsvError::PageOutOfRange {
            page: 0,
            total: metadata.page_count,
        });
    }

    let provider = resolve_provider(config)?;
    let prompt = resolve_prompt(fields, config);
    let buffers = split::split_pages(bytes)?;

    let total = page_indices.len();
    let pages: Vec<(usize, Vec<u8>)> = page_indices
        .into_iter()
        .map(|idx| (idx + 1, buffers[idx].clone()))
        .collect();

    let fields = fields.clone();
    let config = config.clone();

    // `then` (not `buffer_unordered`) keeps the calls strictly sequential
    // and the outcomes in document order.
    let stream = stream::iter(pages).then(move |(page_num, buffer)| {
        let provider = Arc::clone(&provider);
        let prompt = prompt.clone();
        let fields = fields.clone();
        let config = config.clone();
        async move {
            process_page(&provider, page_num, total, &prompt, &buffer, &fields, &config).await
        }
    });

    Ok(Box::pin(stream))
}
