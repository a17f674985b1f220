//! JSON recovery for vision-model responses
//!
//! Models wrap their JSON in prose, markdown fences, or both. These
//! helpers extract a parseable JSON value from whatever came back, with
//! exactly one fallback retry so worst-case work stays bounded.

use serde_json::Value;

use crate::error::{Error, Result};

/// Recover a JSON value from free-form model text.
///
/// 1. Strip a markdown code fence if the trimmed text starts with one and
///    a closing fence exists (a bare language-tag first line is dropped).
/// 2. Parse directly.
/// 3. On failure, retry once on the greedy first-`{` / last-`}` span of
///    the original text.
/// 4. Otherwise fail with [`Error::UnparsableOutput`] carrying the raw
///    text for diagnostics. This is a typed failure, never a panic.
pub fn recover_json(response: &str) -> Result<Value> {
    let candidate = strip_code_fence(response);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(parse_err) => {
            // One retry on a brace-delimited span, no recursion beyond it
            if let Some(span) = brace_span(response) {
                if let Ok(value) = serde_json::from_str(span) {
                    return Ok(value);
                }
            }
            Err(Error::UnparsableOutput {
                reason: parse_err.to_string(),
                raw: response.to_string(),
            })
        }
    }
}

/// Strip a surrounding markdown code fence, returning the inner segment.
/// Text without a complete fence comes back trimmed but otherwise intact.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let mut parts = trimmed.splitn(3, "```");
    let _before = parts.next();
    let Some(inner) = parts.next() else {
        return trimmed;
    };
    if parts.next().is_none() {
        // No closing fence; treat the text as-is
        return trimmed;
    }

    // Drop a language tag line like "json" sitting alone at the top
    if let Some((first_line, rest)) = inner.split_once('\n') {
        let tag = first_line.trim();
        if tag.is_empty() || tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return rest.trim();
        }
    }
    inner.trim()
}

/// Greedy first-`{` to last-`}` span.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
