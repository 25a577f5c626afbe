//! Field specification and extracted-record types.
//!
//! A [`FieldSpec`] is the user's answer to "which columns do I want?": an
//! ordered list of field names, parsed once per extraction run and threaded
//! explicitly through the prompt builder, the normalizer, and the CSV
//! exporter. There is deliberately no shared mutable "current fields" state
//! anywhere in the crate — every stage receives the spec as a parameter.
//!
//! A [`Record`] is one flattened row of extracted data. After normalisation
//! its keys are exactly the names in the `FieldSpec` — no extras, no
//! omissions — with missing data represented as an empty string, never as an
//! absent key.

use crate::error::Pdf2CsvError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered list of field names to extract, defining CSV column order.
///
/// Built from free text (`"name, price\nquantity"`) or a pre-split list.
/// Order is significant; duplicate names are allowed and are not deduplicated
/// (the user asked for that column twice, they get it twice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpec {
    names: Vec<String>,
}

impl FieldSpec {
    /// Build a spec from an ordered list of names.
    ///
    /// Names are trimmed; empty entries are dropped. An empty result is an
    /// [`Pdf2CsvError::InvalidFields`] error — an empty spec would produce a
    /// prompt asking for nothing and a CSV with no columns.
    pub fn new<I, S>(names: I) -> Result<Self, Pdf2CsvError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.into().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(Pdf2CsvError::InvalidFields);
        }
        Ok(Self { names })
    }

    /// Parse a spec from free text, split on commas and newlines.
    ///
    /// This matches how users type field lists into a single text box:
    /// `"name, price"` and `"name\nprice\nquantity"` both work.
    pub fn parse(text: &str) -> Result<Self, Pdf2CsvError> {
        Self::new(text.split(['\n', ',']))
    }

    /// The field names, in user-supplied order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over field names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// One flattened row of extracted data.
///
/// Invariant (guaranteed by [`crate::pipeline::normalize`]): the key set is
/// exactly the field names of the `FieldSpec` the record was normalised
/// against. Values are always strings; "not found" is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, String>,
}

impl Record {
    pub(crate) fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Value for `field`, or `None` if the record was not normalised against
    /// a spec containing it.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Number of fields in this record.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// View the record as a JSON object (used by re-normalisation and tests).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }

    /// True if every value in the record is the empty string.
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.is_empty())
    }
}
