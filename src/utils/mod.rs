//! Utility functions and helpers.

pub mod log;

/// First non-empty line of `text`, trimmed.
pub fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Keep at most `max_chars` characters. `0` keeps everything.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Clean a raw cell value: trimmed, first non-empty line, length-capped.
pub fn clean_value(text: &str, max_len: usize) -> String {
    truncate_chars(first_line(text), max_len)
}

/// `None` for blank strings, trimmed text otherwise.
pub fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
