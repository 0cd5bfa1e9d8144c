//! Whitespace normalization and sliding-window chunking.
//!
//! Text is normalized (runs of whitespace collapsed to a single space,
//! then trimmed) before a fixed-size character window slides across it,
//! advancing by `size - overlap` each step. Adjacent chunks therefore
//! share `overlap` characters so retrieval context spanning a window
//! boundary is not lost.

use crate::error::{Error, Result};

/// Collapse all whitespace runs to a single space and trim.
///
/// Idempotent: normalizing already-normalized text is a no-op.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows of `size` characters.
///
/// The input is normalized first. `overlap >= size` (or `size == 0`) is a
/// configuration error; the naive stride would stall or walk backwards.
/// Empty text yields an empty sequence; text shorter than `size` yields
/// exactly one chunk.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 {
        return Err(Error::Config("chunk size must be > 0".to_string()));
    }
    if overlap >= size {
        return Err(Error::Config(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }

    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    Ok(chunks)
}
