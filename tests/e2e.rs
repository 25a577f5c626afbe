//! End-to-end integration tests for pdf2csv.
//!
//! These tests build real multi-page PDFs in memory with lopdf and drive the
//! full pipeline against a scripted mock provider, so they run offline and
//! deterministically. The mock returns one canned reply per call, in call
//! order, which lets each test script exactly what "the model" says for each
//! page.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf2csv::{
    extract_from_bytes, extract_stream_from_bytes, extract_to_file, DocumentPayload,
    ExtractionConfig, ExtractionProvider, FieldSpec, GenerationOptions, ModelResponse, PageError,
    PageSelection, Pdf2CsvError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::StreamExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Build a minimal n-page PDF entirely in memory.
fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

/// One scripted reply: either generated text or a provider error.
enum Reply {
    Text(&'static str),
    Error(fn() -> Pdf2CsvError),
}

/// A provider returning pre-scripted replies in call order.
///
/// When the script runs out, the last reply is repeated; this keeps
/// whole-document and per-page tests from having to count calls exactly.
struct MockProvider {
    replies: Vec<Reply>,
    calls: AtomicUsize,
}

impl MockProvider {
    fn scripted(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            calls: AtomicUsize::new(0),
        })
    }

    fn always(text: &'static str) -> Arc<Self> {
        Self::scripted(vec![Reply::Text(text)])
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _prompt: &str,
        document: &DocumentPayload,
        _options: &GenerationOptions,
    ) -> Result<ModelResponse, Pdf2CsvError> {
        assert_eq!(document.mime_type, "application/pdf");
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(n)
            .or_else(|| self.replies.last())
            .expect("mock provider needs at least one reply");
        match reply {
            Reply::Text(text) => Ok(ModelResponse {
                text: text.to_string(),
                prompt_tokens: 100,
                completion_tokens: 20,
            }),
            Reply::Error(make) => Err(make()),
        }
    }
}

fn config_with(provider: Arc<MockProvider>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .provider(provider)
        .max_retries(0)
        .build()
        .expect("valid config")
}

fn fields(spec: &str) -> FieldSpec {
    FieldSpec::parse(spec).expect("valid field list")
}

// ── Whole-document mode ──────────────────────────────────────────────────────

#[tokio::test]
async fn whole_document_produces_bom_csv() {
    let pdf = sample_pdf(2);
    let provider = MockProvider::always(r#"[{"name":"Widget","price":"9.50"},{"name":"Bolt","price":"0.20"}]"#);
    let config = config_with(Arc::clone(&provider));

    let output = extract_from_bytes(&pdf, &fields("name,price"), &config)
        .await
        .expect("extraction succeeds");

    assert_eq!(provider.call_count(), 1, "whole-document mode = one call");
    assert_eq!(output.records.len(), 2);
    assert!(output.pages.is_empty(), "no per-page detail in whole mode");
    assert_eq!(
        output.csv,
        "\u{FEFF}\"name\",\"price\"\n\"Widget\",\"9.50\"\n\"Bolt\",\"0.20\""
    );
    assert_eq!(output.stats.total_records, 2);
    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.stats.total_input_tokens, 100);
}

#[tokio::test]
async fn fenced_reply_with_prose_is_salvaged() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::always(
        "Here is the data you asked for:\n```json\n[{\"sku\": \"A1\"}, {\"sku\": \"B2\"}]\n```\nLet me know if you need more.",
    );
    let config = config_with(provider);

    let output = extract_from_bytes(&pdf, &fields("sku, qty"), &config)
        .await
        .expect("salvage succeeds");

    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].get("sku"), Some("A1"));
    // Missing field → empty string, column still present
    assert_eq!(output.records[0].get("qty"), Some(""));
    assert_eq!(
        output.csv,
        "\u{FEFF}\"sku\",\"qty\"\n\"A1\",\"\"\n\"B2\",\"\""
    );
}

#[tokio::test]
async fn single_object_reply_wraps_to_one_record() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::always(r#"{"total": "42.00"}"#);
    let config = config_with(provider);

    let output = extract_from_bytes(&pdf, &fields("total"), &config)
        .await
        .expect("single object accepted in whole-document mode");

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].get("total"), Some("42.00"));
}

#[tokio::test]
async fn extra_keys_dropped_and_order_follows_field_spec() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::always(
        r#"[{"zebra":"ignored","b":"2","a":"1"},{"a":"3","b":"4","extra":"x"}]"#,
    );
    let config = config_with(provider);

    let output = extract_from_bytes(&pdf, &fields("a,b"), &config)
        .await
        .expect("extraction succeeds");

    assert_eq!(
        output.csv,
        "\u{FEFF}\"a\",\"b\"\n\"1\",\"2\"\n\"3\",\"4\""
    );
}

#[tokio::test]
async fn embedded_quotes_are_doubled() {
    let pdf = sample_pdf(1);
    let provider =
        MockProvider::always(r#"[{"desc":"5\" bolt"},{"desc":"plain"}]"#);
    let config = config_with(provider);

    let output = extract_from_bytes(&pdf, &fields("desc"), &config)
        .await
        .expect("extraction succeeds");

    assert_eq!(
        output.csv,
        "\u{FEFF}\"desc\"\n\"5\"\" bolt\"\n\"plain\""
    );
}

#[tokio::test]
async fn unsalvageable_reply_is_response_format_error() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::always("I could not find any structured data on this page.");
    let config = config_with(provider);

    let err = extract_from_bytes(&pdf, &fields("a"), &config)
        .await
        .expect_err("no JSON anywhere");

    assert!(matches!(err, Pdf2CsvError::ResponseFormat { .. }), "got: {err}");
}

#[tokio::test]
async fn empty_array_reply_is_no_records_error() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::always("[]");
    let config = config_with(provider);

    let err = extract_from_bytes(&pdf, &fields("a"), &config)
        .await
        .expect_err("parsed fine but zero records");

    assert!(matches!(err, Pdf2CsvError::NoRecords { .. }), "got: {err}");
}

#[tokio::test]
async fn provider_auth_failure_surfaces_as_extraction_error() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::scripted(vec![Reply::Error(|| Pdf2CsvError::AuthError {
        provider: "mock".to_string(),
        detail: "API key not valid".to_string(),
    })]);
    let config = config_with(provider);

    let err = extract_from_bytes(&pdf, &fields("a"), &config)
        .await
        .expect_err("auth failure is fatal");
    assert!(err.to_string().contains("API key not valid"), "got: {err}");
}

// ── Per-page mode ────────────────────────────────────────────────────────────

#[tokio::test]
async fn per_page_merges_records_in_document_order() {
    let pdf = sample_pdf(3);
    let provider = MockProvider::scripted(vec![
        Reply::Text(r#"[{"item":"p1-a"},{"item":"p1-b"}]"#),
        Reply::Text(r#"[{"item":"p2-a"},{"item":"p2-b"},{"item":"p2-c"}]"#),
        Reply::Text(r#"[{"item":"p3-a"},{"item":"p3-b"}]"#),
    ]);
    let config = ExtractionConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ExtractionProvider>)
        .split_pages(true)
        .max_retries(0)
        .build()
        .unwrap();

    let output = extract_from_bytes(&pdf, &fields("item"), &config)
        .await
        .expect("all pages succeed");

    assert_eq!(provider.call_count(), 3);
    assert_eq!(output.records.len(), 7);
    let items: Vec<&str> = output.records.iter().filter_map(|r| r.get("item")).collect();
    assert_eq!(
        items,
        vec!["p1-a", "p1-b", "p2-a", "p2-b", "p2-c", "p3-a", "p3-b"]
    );
    assert_eq!(output.pages.len(), 3);
    assert_eq!(output.stats.contributing_pages, 3);
    assert_eq!(output.stats.skipped_pages, 0);
}

#[tokio::test]
async fn single_record_page_is_skipped_as_template_echo() {
    let pdf = sample_pdf(3);
    let provider = MockProvider::scripted(vec![
        Reply::Text(r#"[{"item":"real-1"},{"item":"real-2"}]"#),
        // A lone record is assumed to be the model echoing the example
        Reply::Text(r#"[{"item":"echo"}]"#),
        Reply::Text(r#"[{"item":"real-3"},{"item":"real-4"}]"#),
    ]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .split_pages(true)
        .max_retries(0)
        .build()
        .unwrap();

    let output = extract_from_bytes(&pdf, &fields("item"), &config)
        .await
        .expect("run succeeds despite the skipped page");

    assert_eq!(output.records.len(), 4);
    assert!(output.pages[1].skipped);
    assert!(output.pages[1].records.is_empty());
    assert!(!output.pages[1].contributed());
    assert_eq!(output.stats.skipped_pages, 1);
    assert_eq!(output.stats.contributing_pages, 2);
}

#[tokio::test]
async fn page_failure_is_not_fatal_when_others_succeed() {
    let pdf = sample_pdf(2);
    let provider = MockProvider::scripted(vec![
        Reply::Error(|| Pdf2CsvError::Extraction {
            message: "model returned no text (SAFETY)".to_string(),
        }),
        Reply::Text(r#"[{"x":"1"},{"x":"2"}]"#),
    ]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .split_pages(true)
        .max_retries(0)
        .build()
        .unwrap();

    let output = extract_from_bytes(&pdf, &fields("x"), &config)
        .await
        .expect("one surviving page is enough");

    assert_eq!(output.records.len(), 2);
    assert!(matches!(
        output.pages[0].error,
        Some(PageError::ModelFailed { .. })
    ));
    assert_eq!(output.stats.failed_pages, 1);
}

#[tokio::test]
async fn all_pages_failing_is_fatal() {
    let pdf = sample_pdf(2);
    let provider = MockProvider::scripted(vec![Reply::Error(|| Pdf2CsvError::Extraction {
        message: "boom".to_string(),
    })]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .split_pages(true)
        .max_retries(0)
        .build()
        .unwrap();

    let err = extract_from_bytes(&pdf, &fields("x"), &config)
        .await
        .expect_err("every page failed");
    assert!(matches!(err, Pdf2CsvError::AllPagesFailed { total: 2, .. }), "got: {err}");
}

#[tokio::test]
async fn page_selection_limits_model_calls() {
    let pdf = sample_pdf(4);
    let provider = MockProvider::always(r#"[{"n":"1"},{"n":"2"}]"#);
    let config = ExtractionConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ExtractionProvider>)
        .split_pages(true)
        .pages(PageSelection::Range(2, 3))
        .max_retries(0)
        .build()
        .unwrap();

    let output = extract_from_bytes(&pdf, &fields("n"), &config)
        .await
        .expect("range extraction succeeds");

    assert_eq!(provider.call_count(), 2);
    assert_eq!(output.pages.len(), 2);
    assert_eq!(output.pages[0].page_num, 2);
    assert_eq!(output.pages[1].page_num, 3);
}

#[tokio::test]
async fn out_of_range_selection_is_fatal() {
    let pdf = sample_pdf(2);
    let provider = MockProvider::always("[]");
    let config = ExtractionConfig::builder()
        .provider(provider)
        .split_pages(true)
        .pages(PageSelection::Single(9))
        .max_retries(0)
        .build()
        .unwrap();

    let err = extract_from_bytes(&pdf, &fields("n"), &config)
        .await
        .expect_err("page 9 of 2");
    assert!(matches!(err, Pdf2CsvError::PageOutOfRange { total: 2, .. }), "got: {err}");
}

// ── Input validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_bytes_rejected_before_any_model_call() {
    let provider = MockProvider::always("[]");
    let config = config_with(Arc::clone(&provider));

    let err = extract_from_bytes(b"not a pdf at all", &fields("a"), &config)
        .await
        .expect_err("magic bytes wrong");

    assert!(matches!(err, Pdf2CsvError::NotAPdf { .. }), "got: {err}");
    assert_eq!(provider.call_count(), 0, "must fail before calling the model");
}

#[tokio::test]
async fn truncated_pdf_is_document_parse_error() {
    let provider = MockProvider::always("[]");
    let config = config_with(provider);

    let err = extract_from_bytes(b"%PDF-1.5 then nothing useful", &fields("a"), &config)
        .await
        .expect_err("header only");
    assert!(matches!(err, Pdf2CsvError::DocumentParse { .. }), "got: {err}");
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_to_file_writes_csv_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf_path = dir.path().join("input.pdf");
    std::fs::write(&pdf_path, sample_pdf(1)).expect("write pdf");
    let out_path = dir.path().join("out").join("result.csv");

    let provider = MockProvider::always(r#"[{"a":"1"},{"a":"2"}]"#);
    let config = config_with(provider);

    let stats = extract_to_file(
        pdf_path.to_str().unwrap(),
        &fields("a"),
        &out_path,
        &config,
    )
    .await
    .expect("file extraction succeeds");

    assert_eq!(stats.total_records, 2);
    let written = std::fs::read_to_string(&out_path).expect("csv exists");
    assert_eq!(written, "\u{FEFF}\"a\"\n\"1\"\n\"2\"");
    assert!(
        !out_path.with_extension("csv.tmp").exists(),
        "temp file must be renamed away"
    );
}

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let provider = MockProvider::always("[]");
    let config = config_with(provider);

    let err = pdf2csv::extract("/no/such/file.pdf", &fields("a"), &config)
        .await
        .expect_err("path does not exist");
    assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }), "got: {err}");
}

// ── Metadata inspection ──────────────────────────────────────────────────────

#[tokio::test]
async fn inspect_reads_metadata_without_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf_path = dir.path().join("doc.pdf");
    std::fs::write(&pdf_path, sample_pdf(3)).expect("write pdf");

    // No provider configured anywhere; inspect must not need one.
    let meta = pdf2csv::inspect(pdf_path.to_str().unwrap())
        .await
        .expect("inspect succeeds");

    assert_eq!(meta.page_count, 3);
    assert_eq!(meta.pdf_version, "1.5");
    assert!(!meta.is_encrypted);
}

// ── Streaming API ────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_outcomes_in_document_order() {
    let pdf = sample_pdf(3);
    let provider = MockProvider::scripted(vec![
        Reply::Text(r#"[{"v":"1a"},{"v":"1b"}]"#),
        Reply::Text(r#"[{"v":"2-echo"}]"#),
        Reply::Text(r#"[{"v":"3a"},{"v":"3b"}]"#),
    ]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .max_retries(0)
        .build()
        .unwrap();

    let mut stream = extract_stream_from_bytes(&pdf, &fields("v"), &config)
        .await
        .expect("stream setup succeeds");

    let mut outcomes = Vec::new();
    while let Some(outcome) = stream.next().await {
        outcomes.push(outcome);
    }

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].page_num, 1);
    assert_eq!(outcomes[1].page_num, 2);
    assert_eq!(outcomes[2].page_num, 3);
    assert_eq!(outcomes[0].records.len(), 2);
    // Skip policy already applied to streamed outcomes
    assert!(outcomes[1].skipped);
    assert!(outcomes[1].records.is_empty());
    assert_eq!(outcomes[2].records.len(), 2);
}

#[tokio::test]
async fn stream_rejects_non_pdf_up_front() {
    let provider = MockProvider::always("[]");
    let config = config_with(provider);

    let err = extract_stream_from_bytes(b"garbage", &fields("v"), &config)
        .await
        .err()
        .expect("bad magic");
    assert!(matches!(err, Pdf2CsvError::NotAPdf { .. }), "got: {err}");
}

// ── Retry behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_retried_then_succeeds() {
    let pdf = sample_pdf(1);
    let provider = MockProvider::scripted(vec![
        Reply::Error(|| Pdf2CsvError::Extraction {
            message: "HTTP 503: overloaded".to_string(),
        }),
        Reply::Text(r#"[{"a":"1"},{"a":"2"}]"#),
    ]);
    let config = ExtractionConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ExtractionProvider>)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let output = extract_from_bytes(&pdf, &fields("a"), &config)
        .await
        .expect("retry recovers");

    assert_eq!(provider.call_count(), 2);
    assert_eq!(output.records.len(), 2);
}
