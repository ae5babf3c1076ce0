use crate::chunking::truncate_chars;

pub const PREVIEW_CHARS: usize = 500;

/// Cosine distance as a similarity percentage.
///
/// Distances outside `[0, 1]` (opposite vectors, or a store that is not
/// using cosine) are clamped rather than shown as negative or >100%.
pub fn relevance_percent(distance: f32) -> f32 {
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}

/// First `max_chars` characters on a single line, with `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    let mut line = head.replace('\n', " ").trim().to_string();
    if head.len() < text.len() {
        line.push_str("...");
    }
    line
}
