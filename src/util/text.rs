//! Text helpers for log output.

/// Return at most `max_chars` characters of `text`, appending `...` when cut.
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}
