//! Page splitting and document metadata via lopdf.
//!
//! ## Why split at all?
//!
//! Whole-document extraction sends one big payload and gets one big reply;
//! on long documents the reply outgrows the token budget and truncates,
//! which turns into a salvage-parse failure for the entire run. Splitting
//! bounds the content per model call and isolates failures to single pages.
//!
//! Each buffer this module produces is a standalone, independently valid
//! single-page PDF: the full document is cloned, every other page is
//! deleted, and unreachable objects are pruned before serialising. The
//! clone-and-delete approach keeps shared resources (fonts, images) that the
//! surviving page actually references, at the cost of some redundancy across
//! buffers. Output order is document order; `output.len()` always equals the
//! source page count.

use crate::error::Pdf2CsvError;
use crate::output::DocumentMetadata;
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

fn load(bytes: &[u8]) -> Result<Document, Pdf2CsvError> {
    Document::load_mem(bytes).map_err(|e| Pdf2CsvError::DocumentParse {
        detail: e.to_string(),
    })
}

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<usize, Pdf2CsvError> {
    Ok(load(bytes)?.get_pages().len())
}

/// Split a PDF into one standalone single-page PDF byte buffer per page.
///
/// Buffers come back in document order. The input is never mutated.
pub fn split_pages(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Pdf2CsvError> {
    let doc = load(bytes)?;
    let total = doc.get_pages().len() as u32;
    let mut buffers = Vec::with_capacity(total as usize);

    for page in 1..=total {
        let mut single = doc.clone();
        let delete: Vec<u32> = (1..=total).filter(|&p| p != page).collect();
        if !delete.is_empty() {
            single.delete_pages(&delete);
        }
        single.prune_objects();
        single.renumber_objects();
        single.compress();

        let mut buf = Vec::new();
        single
            .save_to(&mut buf)
            .map_err(|e| Pdf2CsvError::DocumentParse {
                detail: format!("failed to serialise page {page}: {e}"),
            })?;
        debug!("Split page {}/{} → {} bytes", page, total, buf.len());
        buffers.push(buf);
    }

    Ok(buffers)
}

/// Read document metadata from the trailer Info dictionary.
///
/// No model call and no API key required.
pub fn extract_metadata(bytes: &[u8]) -> Result<DocumentMetadata, Pdf2CsvError> {
    let doc = load(bytes)?;
    let info = info_dictionary(&doc);

    Ok(DocumentMetadata {
        title: info.and_then(|d| info_string(d, b"Title")),
        author: info.and_then(|d| info_string(d, b"Author")),
        subject: info.and_then(|d| info_string(d, b"Subject")),
        creator: info.and_then(|d| info_string(d, b"Creator")),
        producer: info.and_then(|d| info_string(d, b"Producer")),
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        is_encrypted: doc.is_encrypted(),
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    match info {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let raw = dict.get(key).ok()?.as_str().ok()?;
    let text = decode_pdf_string(raw);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode a PDF text string: UTF-16BE when the BOM is present, otherwise
/// treated as UTF-8 with lossy replacement.
fn decode_pdf_string(raw: &[u8]) -> String {
    if raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}
