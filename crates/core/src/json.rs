//! Lenient JSON extraction from free-form model output.
//!
//! Models wrap their JSON in prose, code fences and scratch blocks. These
//! helpers locate the outermost span (the first opening bracket up to the
//! last closing bracket) and decode only that span.
//!
//! Known limitation: the span is found by scanning characters, not by
//! parsing. Literal brackets or braces in prose *outside* the payload (for
//! example an unclosed `{` in a sentence before the JSON) widen the span and
//! make decoding fail. Strip scratch blocks with [`strip_tags`] first to keep
//! this rare.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LenientJsonError {
    #[error("no JSON {0} found in response")]
    NotFound(&'static str),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The span from the first `[` to the last `]`, inclusive.
pub fn array_span(text: &str) -> Option<&str> {
    span(text, '[', ']')
}

/// The span from the first `{` to the last `}`, inclusive.
pub fn object_span(text: &str) -> Option<&str> {
    span(text, '{', '}')
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a JSON array, falling back to the whole (trimmed) text when no
/// bracketed span exists.
pub fn decode_array<T: DeserializeOwned>(text: &str) -> Result<T, LenientJsonError> {
    let trimmed = text.trim();
    let candidate = array_span(trimmed).unwrap_or(trimmed);
    Ok(serde_json::from_str(candidate)?)
}

/// Decode a JSON object. Unlike arrays there is no whole-text fallback: a
/// response without braces is reported as [`LenientJsonError::NotFound`].
pub fn decode_object<T: DeserializeOwned>(text: &str) -> Result<T, LenientJsonError> {
    let candidate = object_span(text.trim()).ok_or(LenientJsonError::NotFound("object"))?;
    Ok(serde_json::from_str(candidate)?)
}

/// Remove every `<tag>…</tag>` block for each of `tags`, then trim.
///
/// An opening tag without a matching close is left in place.
pub fn strip_tags(text: &str, tags: &[&str]) -> String {
    let mut out = text.to_string();
    for tag in tags {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        while let Some(start) = out.find(&open) {
            let Some(rel_end) = out[start..].find(&close) else {
                break;
            };
            let end = start + rel_end + close.len();
            out.replace_range(start..end, "");
        }
    }
    out.trim().to_string()
}
