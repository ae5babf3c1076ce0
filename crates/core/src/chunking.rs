use crate::error::IngestError;
use std::ops::Range;

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Splits `0..total` into consecutive ranges of `batch_size`; only the last may be shorter.
pub fn plan_batches(total: usize, batch_size: usize) -> Result<Vec<Range<usize>>, IngestError> {
    if batch_size == 0 {
        return Err(IngestError::InvalidArgument(
            "batch size must be at least 1".to_string(),
        ));
    }

    Ok((0..total)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(total))
        .collect())
}
