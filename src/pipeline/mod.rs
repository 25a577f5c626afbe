//! Pipeline stages for PDF-to-CSV extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a different model provider) without touching other
//! stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ model ──▶ parse ──▶ normalize ──▶ csv
//! (URL/path) (lopdf)  (Gemini)  (salvage)  (FieldSpec)   (BOM + quoting)
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to PDF bytes
//! 2. [`split`]     — optional: one standalone single-page PDF per source page
//! 3. [`model`]     — drive the provider call with retry/backoff; the only
//!    stage with network I/O
//! 4. [`parse`]     — salvage a JSON array from whatever text came back
//! 5. [`normalize`] — project each parsed object onto the field spec
//! 6. [`csv`]       — flatten normalised records into CSV text

pub mod csv;
pub mod input;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod split;
