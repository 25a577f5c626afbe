//! Extraction prompts sent alongside the PDF payload.
//!
//! Centralising the prompt template here serves two purposes:
//!
//! 1. **Single source of truth** — changing the instructions (e.g. tightening
//!    the JSON-only rule) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the built prompt directly
//!    without spinning up a real model, making prompt regressions easy to
//!    catch.
//!
//! Callers can override the whole prompt via
//! [`crate::config::ExtractionConfig::prompt_override`]; the builder here is
//! used only when no override is provided.

use crate::fields::FieldSpec;

/// Build the extraction prompt for the given field specification.
///
/// Pure string templating: for a fixed spec the output is deterministic.
/// The prompt asks for exactly the shape the
/// [salvage parser](crate::pipeline::parse) expects in the best case — a bare
/// JSON array of flat objects — and the rules exist because models routinely
/// violate each of them:
///
/// * "array only" — models wrap single entities in a bare object
/// * "empty string for unknown" — models emit `null` or omit the key
/// * "no prose, no fences" — models add `Sure, here you go:` and ```` ```json ````
pub fn build_extraction_prompt(fields: &FieldSpec) -> String {
    let field_list: String = fields
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");

    let example_object: String = fields
        .iter()
        .map(|f| format!("    \"{f}\": \"value\""))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You are an AI assistant that extracts data from PDF documents.

Extract the following fields for every entry found in the document and
return the result as a JSON array. Do not include any explanatory text.
Output JSON only.

Fields to extract:
{field_list}

Output format:
[
  {{
{example_object}
  }}
]

Rules:
- Always wrap the result in a JSON array []
- Every array element must be an object with exactly the keys listed above
- Use an empty string ("") when a value cannot be found
- Do not include any extra text, markdown fences, or commentary
- The output must be complete, untruncated, and parseable as standalone JSON"#
    )
}
