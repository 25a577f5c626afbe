//! HTTP-layer tests for the Gemini provider against a local stub server.
//!
//! Each test binds a one-shot TCP listener that captures the raw request and
//! replies with a canned HTTP response, then points `GeminiClient` at it via
//! `with_base_url`. This covers endpoint assembly, the API-key header, the
//! request body shape, and the status-code → error mapping without any
//! network access.

use pdf2csv::{
    DocumentPayload, ExtractionProvider, GeminiClient, GenerationOptions, Pdf2CsvError,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

// ── Stub server ──────────────────────────────────────────────────────────────

/// Serve exactly one request: reply with the given status line, extra
/// headers (each terminated by `\r\n`), and body. Returns the base URL and a
/// handle yielding the raw request text.
fn one_shot_server(
    status_line: &'static str,
    extra_headers: &'static str,
    body: &'static str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream);
        let response = format!(
            "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write response");
        request
    });

    (format!("http://{addr}"), handle)
}

/// Read one HTTP request: headers, then content-length's worth of body.
fn read_request(stream: &mut std::net::TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf).expect("read request");
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);

        if let Some(headers_end) = find(&request, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..headers_end]);
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if request.len() >= headers_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&request).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Test fixtures ────────────────────────────────────────────────────────────

fn client(base_url: String) -> GeminiClient {
    GeminiClient::new("test-key", "gemini-2.0-flash")
        .expect("client builds")
        .with_base_url(base_url)
}

fn payload() -> DocumentPayload {
    DocumentPayload::from_pdf_bytes(b"%PDF-1.5 stub")
}

fn options() -> GenerationOptions {
    GenerationOptions {
        temperature: 0.1,
        max_tokens: 64,
        timeout_secs: 5,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_hits_generate_content_with_key_and_inline_pdf() {
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\":\"1\"}]"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":9,"candidatesTokenCount":4}}"#;
    let (base, server) = one_shot_server(
        "HTTP/1.1 200 OK",
        "content-type: application/json\r\n",
        body,
    );

    let response = client(base)
        .generate("extract the data", &payload(), &options())
        .await
        .expect("200 reply parses");

    assert_eq!(response.text, r#"[{"a":"1"}]"#);
    assert_eq!(response.prompt_tokens, 9);
    assert_eq!(response.completion_tokens, 4);

    let request = server.join().expect("server thread");
    let (head, request_body) = request.split_once("\r\n\r\n").expect("full request");
    assert!(
        head.starts_with("POST /gemini-2.0-flash:generateContent"),
        "got: {head}"
    );
    assert!(
        head.to_ascii_lowercase().contains("x-goog-api-key: test-key"),
        "missing API key header in: {head}"
    );
    assert!(request_body.contains(r#""mimeType":"application/pdf""#));
    assert!(request_body.contains("extract the data"));
}

#[tokio::test]
async fn http_401_maps_to_auth_error_with_api_detail() {
    let body = r#"{"error":{"code":401,"message":"API key not valid","status":"UNAUTHENTICATED"}}"#;
    let (base, server) = one_shot_server("HTTP/1.1 401 Unauthorized", "", body);

    let err = client(base)
        .generate("p", &payload(), &options())
        .await
        .expect_err("401 is an error");

    assert!(matches!(err, Pdf2CsvError::AuthError { .. }), "got: {err}");
    assert!(err.to_string().contains("API key not valid"), "got: {err}");
    server.join().expect("server thread");
}

#[tokio::test]
async fn http_403_also_maps_to_auth_error() {
    let (base, server) = one_shot_server(
        "HTTP/1.1 403 Forbidden",
        "",
        r#"{"error":{"message":"permission denied on project"}}"#,
    );

    let err = client(base)
        .generate("p", &payload(), &options())
        .await
        .expect_err("403 is an error");

    assert!(matches!(err, Pdf2CsvError::AuthError { .. }), "got: {err}");
    server.join().expect("server thread");
}

#[tokio::test]
async fn http_429_maps_to_rate_limit_with_retry_after() {
    let (base, server) = one_shot_server(
        "HTTP/1.1 429 Too Many Requests",
        "retry-after: 7\r\n",
        r#"{"error":{"message":"quota exceeded"}}"#,
    );

    let err = client(base)
        .generate("p", &payload(), &options())
        .await
        .expect_err("429 is an error");

    match err {
        Pdf2CsvError::RateLimitExceeded {
            retry_after_secs, ..
        } => assert_eq!(retry_after_secs, Some(7)),
        other => panic!("expected RateLimitExceeded, got {other}"),
    }
    server.join().expect("server thread");
}

#[tokio::test]
async fn http_500_maps_to_extraction_error_with_status() {
    let (base, server) = one_shot_server(
        "HTTP/1.1 500 Internal Server Error",
        "",
        "<html>gateway error</html>",
    );

    let err = client(base)
        .generate("p", &payload(), &options())
        .await
        .expect_err("500 is an error");

    assert!(matches!(err, Pdf2CsvError::Extraction { .. }), "got: {err}");
    // Non-JSON error body: the message falls back to the HTTP status
    assert!(err.to_string().contains("500"), "got: {err}");
    server.join().expect("server thread");
}
