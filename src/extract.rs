//! Result payload extraction.
//!
//! A succeeded AI-style job returns prose wrapping a structured block,
//! typically a fenced ```json code block with commentary around it. This
//! module pulls the structured text out, parses it, and reports parse
//! failures with the offending excerpt. Structural errors are not
//! transient: nothing here is retried.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractError;

/// Matches the first fenced code block, with or without a language tag.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("fence regex is valid")
});

const EXCERPT_LEN: usize = 120;

/// Parse the raw result of a completed job into a JSON value.
///
/// Accepts results that are already structured (objects/arrays pass
/// through untouched) as well as string results wrapped in prose and
/// fence markers.
pub fn extract_value(raw: &serde_json::Value) -> Result<serde_json::Value, ExtractError> {
    match raw {
        serde_json::Value::Null => Err(ExtractError::MissingResult),
        serde_json::Value::String(text) => parse_text(text),
        structured => Ok(structured.clone()),
    }
}

/// Like [`extract_value`], but requires the payload to be an array.
pub fn extract_items(raw: &serde_json::Value) -> Result<Vec<serde_json::Value>, ExtractError> {
    match extract_value(raw)? {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(ExtractError::MalformedPayload {
            reason: "expected a JSON array of items".to_string(),
            excerpt: excerpt(&other.to_string()),
        }),
    }
}

fn parse_text(text: &str) -> Result<serde_json::Value, ExtractError> {
    let candidate = strip_wrapping(text);

    serde_json::from_str(candidate).map_err(|e| ExtractError::MalformedPayload {
        reason: e.to_string(),
        excerpt: excerpt(text),
    })
}

/// Strip fence markers and surrounding prose from a raw text result.
///
/// Preference order: the first fenced block if one exists, otherwise the
/// span from the first opening brace/bracket to its matching closer.
fn strip_wrapping(text: &str) -> &str {
    if let Some(caps) = FENCE.captures(text) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim();
        }
    }

    let trimmed = text.trim();
    let start = trimmed.find(['[', '{']);
    let end = trimmed.rfind([']', '}']);
    match (start, end) {
        (Some(s), Some(e)) if s <= e => &trimmed[s..=e],
        _ => trimmed,
    }
}

fn excerpt(text: &str) -> String {
    let cut = text
        .char_indices()
        .nth(EXCERPT_LEN)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..cut].to_string()
}
