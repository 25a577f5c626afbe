//! Record normalisation: project arbitrary JSON objects onto the field spec.
//!
//! The model's output is duck-typed JSON of unknown shape. Rather than
//! assuming it matches what the prompt asked for, every parsed object is
//! explicitly projected onto the known [`FieldSpec`]: requested keys are
//! copied (stringified), missing keys become empty strings, and extra keys
//! are dropped silently. The resulting [`Record`] always has exactly the
//! requested keys, which is what the CSV exporter relies on.

use crate::fields::{FieldSpec, Record};
use serde_json::Value;
use std::collections::BTreeMap;

/// Project a raw JSON value onto `fields`, producing a complete [`Record`].
///
/// Idempotent: normalising an already-normalised record (via
/// [`Record::to_json`]) is a no-op.
pub fn normalize(raw: &Value, fields: &FieldSpec) -> Record {
    let mut values = BTreeMap::new();
    for name in fields.iter() {
        let value = raw.get(name).map(stringify).unwrap_or_default();
        values.insert(name.to_string(), value);
    }
    Record::from_map(values)
}

/// Flatten a JSON value to its cell representation.
///
/// Strings are copied verbatim (no added quotes); null becomes the empty
/// string to honour the "missing data is an empty string, never null"
/// invariant; nested structures are kept as compact JSON rather than lost.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
