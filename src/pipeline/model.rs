//! Model interaction: drive one provider call with retry and backoff.
//!
//! This module is intentionally thin — prompt construction lives in
//! [`crate::prompts`] and reply handling in [`crate::pipeline::parse`], so
//! retry and error classification can change without touching either.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx errors from model APIs are transient and frequent.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) is used: with the
//! 500 ms default and 3 retries the wait sequence is 500 ms → 1 s → 2 s.
//! Permanent errors (authentication, unconfigured provider) are never
//! retried — the first occurrence is final.

use crate::config::ExtractionConfig;
use crate::error::{PageError, Pdf2CsvError};
use crate::provider::{DocumentPayload, ExtractionProvider, GenerationOptions};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// The result of one (retried) model call.
///
/// Always returned, never an `Err` — a failed call carries its [`PageError`]
/// so per-page mode can record it and keep going. Whole-document callers
/// promote `error` to a fatal [`Pdf2CsvError`] themselves.
#[derive(Debug)]
pub struct CallOutcome {
    /// Raw reply text; empty when `error` is set.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries consumed before success or give-up.
    pub retries: u8,
    pub error: Option<PageError>,
}

/// Submit one document payload to the model, retrying transient failures.
///
/// `page_num` is `Some` in per-page mode (1-indexed, used in logs and
/// errors) and `None` for a whole-document call.
pub async fn call_model(
    provider: &Arc<dyn ExtractionProvider>,
    page_num: Option<usize>,
    prompt: &str,
    payload: &DocumentPayload,
    config: &ExtractionConfig,
) -> CallOutcome {
    let start = Instant::now();
    let label = page_num.map_or_else(|| "document".to_string(), |n| format!("page {n}"));

    let options = GenerationOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout_secs: config.api_timeout_secs,
    };

    let mut last_err: Option<Pdf2CsvError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                config.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match provider.generate(prompt, payload, &options).await {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label, response.prompt_tokens, response.completion_tokens, duration
                );
                return CallOutcome {
                    text: response.text,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Err(e) => {
                let retryable = is_retryable(&e);
                warn!("{}: attempt {} failed — {}", label, attempt + 1, e);
                last_err = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let duration = start.elapsed();
    let page = page_num.unwrap_or(0);
    let error = match last_err {
        Some(Pdf2CsvError::ApiTimeout { .. }) => PageError::Timeout {
            page,
            secs: config.api_timeout_secs,
        },
        Some(e) => PageError::ModelFailed {
            page,
            retries: config.max_retries as u8,
            detail: e.to_string(),
        },
        None => PageError::ModelFailed {
            page,
            retries: config.max_retries as u8,
            detail: "Unknown error".to_string(),
        },
    };

    CallOutcome {
        text: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: duration.as_millis() as u64,
        retries: config.max_retries as u8,
        error: Some(error),
    }
}

/// The backoff doubling stops here; `max_retries` is caller-controlled and
/// an unbounded `2^n` overflows u64 past attempt 63.
const MAX_BACKOFF_EXP: u32 = 16;

/// Delay before retry `attempt` (1-indexed): `base_ms * 2^(attempt-1)`,
/// with the exponent capped and the multiplication saturating.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXP);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
}

/// Transient errors are retried; permanent ones surface immediately.
fn is_retryable(err: &Pdf2CsvError) -> bool {
    matches!(
        err,
        Pdf2CsvError::RateLimitExceeded { .. }
            | Pdf2CsvError::ApiTimeout { .. }
            | Pdf2CsvError::Extraction { .. }
    )
}
