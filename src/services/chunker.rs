//! Text chunking for document ingestion.
//!
//! Multi-line text is cut into overlapping windows of whole lines; windows that
//! are still too long are split on word boundaries. Single-line text is cut into
//! overlapping fixed-size character windows. All lengths count `char`s.

/// Lines per window used for ingestion.
pub const INGEST_MAX_LINES: usize = 100;
/// Maximum characters per chunk used for ingestion.
pub const INGEST_MAX_CHARS: usize = 1500;
/// Overlap (lines or characters) used for ingestion.
pub const INGEST_OVERLAP: usize = 50;

/// Split `text` into chunks.
///
/// `overlap` is measured in lines for multi-line text and in characters for
/// single-line text.
pub fn chunk(text: &str, max_lines: usize, max_chars: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);

    if text.contains('\n') {
        chunk_by_lines(text, max_lines.max(1), overlap, max_chars)
    } else {
        chunk_by_chars(text, max_chars, overlap)
    }
}

/// Shorthand for [`chunk`] with the ingestion parameters.
pub fn chunk_for_ingest(text: &str) -> Vec<String> {
    chunk(text, INGEST_MAX_LINES, INGEST_MAX_CHARS, INGEST_OVERLAP)
}

fn chunk_by_lines(text: &str, max_lines: usize, overlap: usize, max_chars: usize) -> Vec<String> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let step = max_lines.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let end = (i + max_lines).min(lines.len());
        let window = lines[i..end].join("\n");

        if window.chars().count() > max_chars {
            chunks.extend(split_by_max_chars(&window, max_chars));
        } else {
            chunks.push(window);
        }
        i += step;
    }
    chunks
}

fn chunk_by_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Split into pieces of at most `max_chars`, preferring to break at the last
/// space before the limit. Pieces are trimmed; blank pieces are dropped.
fn split_by_max_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut result = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());

        if end < chars.len() {
            // Last space at or before `end`, strictly after `start`.
            if let Some(space) = (start + 1..=end).rev().find(|&i| chars[i] == ' ') {
                end = space;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = trim_control(&piece);
        if !piece.is_empty() {
            result.push(piece.to_string());
        }
        start = end;
    }
    result
}

/// Trim leading and trailing spaces and ASCII control characters.
fn trim_control(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}
