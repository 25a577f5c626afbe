//! Input resolution: normalise a user-supplied path or URL to PDF bytes.
//!
//! The rest of the pipeline works on `&[u8]` — lopdf loads from memory and
//! the provider receives an inline base64 payload — so resolution means
//! "get me the bytes and prove they are a PDF". We validate the magic bytes
//! (`%PDF`) up front so callers get a meaningful error rather than a parser
//! failure three stages later.

use crate::error::Pdf2CsvError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to raw PDF bytes.
///
/// If the input is a URL, download it. If it is a local file, read it and
/// validate it exists and is readable. Either way the magic bytes are checked.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2CsvError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input)
    }
}

/// Verify the PDF magic bytes on an in-memory buffer.
///
/// `origin` names the source in the error message (path, URL, or `<bytes>`).
pub fn ensure_pdf_magic(bytes: &[u8], origin: &str) -> Result<(), Pdf2CsvError> {
    let mut magic = [0u8; 4];
    let len = bytes.len().min(4);
    magic[..len].copy_from_slice(&bytes[..len]);
    if &magic != b"%PDF" {
        return Err(Pdf2CsvError::NotAPdf {
            input: origin.to_string(),
            magic,
        });
    }
    Ok(())
}

/// Read a local file, validating existence, permissions, and magic bytes.
fn read_local(path_str: &str) -> Result<Vec<u8>, Pdf2CsvError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2CsvError::FileNotFound { path });
    }

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2CsvError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2CsvError::FileNotFound { path });
        }
    };

    ensure_pdf_magic(&bytes, path_str)?;
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Download a URL into memory and validate the magic bytes.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2CsvError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2CsvError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2CsvError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    ensure_pdf_magic(&bytes, url)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check_accepts_pdf_header() {
        assert!(ensure_pdf_magic(b"%PDF-1.7\n...", "<bytes>").is_ok());
    }

    #[test]
    fn magic_check_rejects_other_bytes() {
        let err = ensure_pdf_magic(b"<html>", "<bytes>").unwrap_err();
        assert!(matches!(err, Pdf2CsvError::NotAPdf { .. }));
        // Shorter than four bytes must not panic
        assert!(ensure_pdf_magic(b"%P", "<bytes>").is_err());
        assert!(ensure_pdf_magic(b"", "<bytes>").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }));
    }
}
