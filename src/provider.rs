//! The provider seam: everything past this boundary is an opaque
//! bytes-plus-instructions → text function.
//!
//! The pipeline never assumes anything about what comes back — the
//! [salvage parser](crate::pipeline::parse) tolerates prose, fences, and
//! partial JSON. Keeping the provider behind a trait lets tests inject a
//! canned implementation and lets callers swap in middleware (caching,
//! rate-limiting) without the library knowing.

use crate::error::Pdf2CsvError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use tracing::{debug, warn};

/// A document ready for inline submission to a model API.
///
/// Holds the base64 payload and declared MIME type. Immutable once built;
/// one payload lives exactly as long as the extraction call it feeds.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    /// Base64-encoded document bytes.
    pub data: String,
    /// Declared MIME type, `application/pdf` for everything this crate sends.
    pub mime_type: String,
}

impl DocumentPayload {
    /// Encode raw PDF bytes for inline submission.
    pub fn from_pdf_bytes(bytes: &[u8]) -> Self {
        let data = STANDARD.encode(bytes);
        debug!("Encoded document → {} bytes base64", data.len());
        Self {
            data,
            mime_type: "application/pdf".to_string(),
        }
    }
}

/// Per-call generation knobs, derived from
/// [`crate::config::ExtractionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Per-call HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// The model's reply to one extraction call.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Raw generated text — may contain prose, fences, or partial JSON.
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Boundary trait for the external generative model.
///
/// Implementations must be `Send + Sync`; the pipeline shares one provider
/// across sequential page calls via `Arc`.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Send (prompt, document) to the model and return its raw reply.
    async fn generate(
        &self,
        prompt: &str,
        document: &DocumentPayload,
        options: &GenerationOptions,
    ) -> Result<ModelResponse, Pdf2CsvError>;
}

// ── Gemini ───────────────────────────────────────────────────────────────

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini provider using the `generateContent` REST endpoint.
///
/// The document travels inline as base64 with its MIME type declared as PDF,
/// so no upload step or file API is involved — one HTTP round trip per call.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, Pdf2CsvError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Pdf2CsvError::Internal(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Create a client from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, Pdf2CsvError> {
        let key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Pdf2CsvError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) in the environment.".to_string(),
            })?;
        Self::new(key, model)
    }

    /// Override the API base URL (used by tests against a local stub server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ExtractionProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        document: &DocumentPayload,
        options: &GenerationOptions,
    ) -> Result<ModelResponse, Pdf2CsvError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inlineData": {
                        "mimeType": document.mime_type,
                        "data": document.data,
                    }},
                ],
            }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_tokens,
            },
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(std::time::Duration::from_secs(options.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Pdf2CsvError::ApiTimeout {
                        elapsed_ms: options.timeout_secs * 1000,
                    }
                } else {
                    Pdf2CsvError::Extraction {
                        message: format!("request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let detail = response
                .text()
                .await
                .ok()
                .and_then(|t| api_error_message(&t))
                .unwrap_or_else(|| format!("HTTP {status}"));

            return Err(match status.as_u16() {
                401 | 403 => Pdf2CsvError::AuthError {
                    provider: "gemini".to_string(),
                    detail,
                },
                429 => Pdf2CsvError::RateLimitExceeded {
                    provider: "gemini".to_string(),
                    retry_after_secs: retry_after,
                },
                _ => Pdf2CsvError::Extraction {
                    message: format!("HTTP {status}: {detail}"),
                },
            });
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            Pdf2CsvError::Extraction {
                message: format!("response decode failed: {e}"),
            }
        })?;

        parse_generate_content(&payload)
    }
}

/// Extract the generated text and token counts from a `generateContent` reply.
fn parse_generate_content(payload: &serde_json::Value) -> Result<ModelResponse, Pdf2CsvError> {
    let text: String = payload
        .pointer("/candidates/0/content/parts")
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        // Safety blocks and empty candidate lists both land here; surface
        // whatever reason the API gave.
        let reason = payload
            .pointer("/promptFeedback/blockReason")
            .or_else(|| payload.pointer("/candidates/0/finishReason"))
            .and_then(|r| r.as_str())
            .unwrap_or("no candidates in response");
        warn!("Gemini returned no text: {reason}");
        return Err(Pdf2CsvError::Extraction {
            message: format!("model returned no text ({reason})"),
        });
    }

    let prompt_tokens = payload
        .pointer("/usageMetadata/promptTokenCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    let completion_tokens = payload
        .pointer("/usageMetadata/candidatesTokenCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;

    Ok(ModelResponse {
        text,
        prompt_tokens,
        completion_tokens,
    })
}

/// Pull the human-readable message out of a Gemini error body, if present.
fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .pointer("/error/message")?
        .as_str()
        .map(str::to_string)
}
