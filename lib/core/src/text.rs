//! Text helpers for diagnostics.

/// Returns at most `max_chars` characters of `text`, appending an ellipsis
/// when anything was cut.
///
/// Raw backend output can be arbitrarily large; errors and log lines carry
/// only this excerpt.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
