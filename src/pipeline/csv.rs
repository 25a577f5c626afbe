//! Tabular export: flatten normalised records into CSV text.
//!
//! Output shape: a UTF-8 byte-order mark, then a quoted header row in field
//! order, then one quoted row per record, newline-joined. The BOM is what
//! makes spreadsheet tools (Excel in particular) detect the encoding
//! correctly for non-ASCII field values; without it Japanese and accented
//! text opens as mojibake.
//!
//! Every cell is double-quoted, and embedded double quotes are escaped by
//! doubling per RFC 4180. For quote-free values the output is byte-identical
//! with or without the escaping.

use crate::fields::{FieldSpec, Record};

/// Byte-order mark prepended to the CSV so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &str = "\u{FEFF}";

/// Flatten records into CSV text (header + one row per record).
///
/// Guarantees: data row count equals `records.len()`; every row has exactly
/// `fields.len()` columns, in field order. Records are assumed normalised;
/// a field absent from a record (never the case after
/// [`crate::pipeline::normalize`]) renders as an empty cell.
pub fn to_csv(records: &[Record], fields: &FieldSpec) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);

    let header: Vec<String> = fields.iter().map(quote).collect();
    lines.push(header.join(","));

    for record in records {
        let row: Vec<String> = fields
            .iter()
            .map(|f| quote(record.get(f).unwrap_or_default()))
            .collect();
        lines.push(row.join(","));
    }

    format!("{UTF8_BOM}{}", lines.join("\n"))
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
