//! Small string helpers shared by the scraping and extraction stages.

/// Keep at most `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Replace every run of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten a string for log output, noting how much was cut.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        s.to_string()
    } else {
        format!("{kept}…(+{} bytes)", s.len() - kept.len())
    }
}

/// Whether a serde_json error means the input ended early, which for model
/// output usually means the token cap cut the answer off.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    matches!(e.classify(), serde_json::error::Category::Eof)
}
