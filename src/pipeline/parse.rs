//! Salvage parsing: recover a JSON array from the model's free-form reply.
//!
//! The prompt asks for bare JSON, but the model is under no obligation to
//! comply: replies routinely arrive wrapped in ```` ```json ```` fences,
//! prefixed with "Sure, here you go:", or followed by a closing pleasantry.
//! Rather than a chain of ad hoc try/catch blocks, the salvage logic is an
//! explicit ordered list of strategies; the first one that produces a JSON
//! value wins, and exhaustion yields "no data" — never an error. Whether
//! "no data" is fatal is the caller's decision (it is in whole-document
//! mode; in per-page mode the page is simply skipped).

use crate::fields::{FieldSpec, Record};
use crate::pipeline::normalize::normalize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// One salvage strategy: reply text in, candidate JSON value out.
type Strategy = fn(&str) -> Option<Value>;

/// Strategies in the order they are attempted.
static STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("bracket-slice", parse_bracket_slice),
    ("brace-slice", parse_brace_slice),
];

/// Try each salvage strategy in order; first JSON array or object wins.
///
/// Returns `None` when no strategy recovers anything — the documented
/// "no data extracted" outcome.
pub fn salvage_json(raw: &str) -> Option<Value> {
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(raw) {
            if value.is_array() || value.is_object() {
                debug!("Salvaged JSON via {name} strategy");
                return Some(value);
            }
        }
    }
    debug!("No JSON could be salvaged from {} bytes of reply", raw.len());
    None
}

/// Coerce a salvaged JSON value into records, normalised onto `fields`.
///
/// A single object counts as a one-element array. Array elements that are
/// not objects (stray strings, numbers) are dropped.
pub fn records_from_value(value: &Value, fields: &FieldSpec) -> Vec<Record> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        obj @ Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter(|v| v.is_object())
        .map(|v| normalize(v, fields))
        .collect()
}

/// Full salvage: reply text → normalised records (empty on exhaustion).
pub fn parse_records(raw: &str, fields: &FieldSpec) -> Vec<Record> {
    match salvage_json(raw) {
        Some(value) => records_from_value(&value, fields),
        None => Vec::new(),
    }
}

// ── Strategy 1: direct parse after fence stripping ───────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

fn parse_direct(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let inner = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => trimmed,
    };
    serde_json::from_str(inner.trim()).ok()
}

// ── Strategy 2: first `[` … last `]` slice ───────────────────────────────

fn parse_bracket_slice(raw: &str) -> Option<Value> {
    slice_between(raw, '[', ']')
}

// ── Strategy 3: first `{` … last `}` slice ───────────────────────────────
//
// Catches single-object replies wrapped in prose, which the bracket slice
// misses entirely.

fn parse_brace_slice(raw: &str) -> Option<Value> {
    slice_between(raw, '{', '}')
}

fn slice_between(raw: &str, open: char, close: char) -> Option<Value> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}
