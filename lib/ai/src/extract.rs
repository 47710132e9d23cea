//! Response extraction.
//!
//! Backends that are only asked for JSON often wrap it in markdown fences
//! or a sentence of prose. [`extract`] recovers the payload without any
//! knowledge of the network layer.

use crate::error::GenerationError;
use quizsmith_core::excerpt;
use serde_json::Value as JsonValue;

/// Characters of raw output kept in parse errors.
pub const ERROR_EXCERPT_CHARS: usize = 200;

/// Parses backend output into a JSON value.
///
/// Tries the whole (trimmed) text first, then each balanced top-level
/// object or array substring in order of appearance.
///
/// Scanning never descends into a span that failed to parse, and stops at
/// the first span that never closes, so truncated output is never returned
/// as one of its nested fragments.
///
/// # Errors
///
/// Returns [`GenerationError::Parse`] with a truncated copy of `raw` when no
/// JSON value can be recovered.
pub fn extract(raw: &str) -> Result<JsonValue, GenerationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::parse("backend returned no text", ""));
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let mut from = 0;
    while let Some(offset) = trimmed[from..].find(['{', '[']) {
        let start = from + offset;
        let Some(end) = balanced_end(&trimmed[start..]) else {
            return Err(GenerationError::parse(
                "JSON payload is truncated",
                excerpt(trimmed, ERROR_EXCERPT_CHARS),
            ));
        };
        if let Ok(value) = serde_json::from_str(&trimmed[start..start + end]) {
            return Ok(value);
        }
        from = start + end;
    }

    Err(GenerationError::parse(
        "no JSON object or array found",
        excerpt(trimmed, ERROR_EXCERPT_CHARS),
    ))
}

/// Returns the byte length of the bracketed span opening at `text[0]`, or
/// `None` if it never closes.
///
/// Brackets inside string literals are ignored.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
