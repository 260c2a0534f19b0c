//! Line batching for lyric analysis.
//!
//! Lyrics are analyzed line by line, so chunking here is purely structural:
//! split on line breaks, trim, drop blank lines, then pack the surviving lines
//! into consecutive fixed-size batches. Order is always preserved.

/// Lines per model request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Trimmed, non-empty lines of `text` in input order.
pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `text` into ordered batches of at most `size` trimmed, non-empty lines.
///
/// Returns no batches when the text has no non-empty lines. A `size` of zero
/// is treated as one.
pub fn split_lines(text: &str, size: usize) -> Vec<Vec<String>> {
    let size = size.max(1);
    non_empty_lines(text)
        .chunks(size)
        .map(<[String]>::to_vec)
        .collect()
}
