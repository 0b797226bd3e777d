use std::collections::BTreeMap;
use crate::error::{AccordError, Result};
use super::parsers::DocumentUnit;

/// A chunk of unit text with inherited metadata
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub tokens: usize,
    /// Byte range of `text` inside the source unit
    pub start: usize,
    pub end: usize,
    pub metadata: BTreeMap<String, String>,
}

/// Split units into overlapping, token-bounded chunks.
///
/// Output order follows input order: all chunks of unit 0 (front to back),
/// then unit 1, and so on. Every chunk estimates at most `size_tokens`
/// tokens, and consecutive chunks of one unit share up to
/// `overlap_tokens` worth of text.
///
/// Windows holding only whitespace are not emitted, so a whitespace run
/// longer than one window leaves a gap between two chunks. Everything
/// outside such gaps is covered.
pub fn split_units(
    units: &[DocumentUnit],
    size_tokens: usize,
    overlap_tokens: usize,
) -> Result<Vec<Chunk>> {
    if size_tokens == 0 || overlap_tokens >= size_tokens {
        return Err(AccordError::InvalidInput(format!(
            "chunk_overlap ({}) must be less than chunk_size ({})",
            overlap_tokens, size_tokens
        )));
    }

    let mut chunks = Vec::new();

    for unit in units {
        for (start, end) in chunk_spans(&unit.text, size_tokens, overlap_tokens)? {
            let text = unit.text[start..end].to_string();
            if text.trim().is_empty() {
                continue;
            }

            let tokens = estimate_tokens(&text);
            chunks.push(Chunk {
                text,
                tokens,
                start,
                end,
                metadata: unit.metadata.clone(),
            });
        }
    }

    Ok(chunks)
}

/// Byte spans of the chunks of one text
///
/// Uses character-based approximation: ~4 bytes per token. Breaks at the
/// last whitespace or sentence punctuation within the final 20% of the window
/// when one exists. Spans are never trimmed, so dropping each span's overlap
/// with its predecessor and concatenating gives the original text back.
fn chunk_spans(text: &str, size_tokens: usize, overlap_tokens: usize) -> Result<Vec<(usize, usize)>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let char_size = size_tokens * 4;
    let char_overlap = overlap_tokens * 4;

    // Previous char boundary at or before a byte position
    let floor_boundary = |byte_pos: usize| -> usize {
        if byte_pos >= text.len() {
            return text.len();
        }
        (0..=byte_pos).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
    };

    let mut spans = Vec::new();
    let mut start_byte = 0;

    while start_byte < text.len() {
        let mut end_byte = floor_boundary((start_byte + char_size).min(text.len()));
        if end_byte <= start_byte {
            // Window narrower than one character; take the character whole
            end_byte = text[start_byte..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start_byte + i)
                .unwrap_or(text.len());
        }

        let chunk_end_byte = if end_byte < text.len() {
            let search_start_byte = floor_boundary(end_byte.saturating_sub(char_size / 5)).max(start_byte);

            text.get(search_start_byte..end_byte)
                .and_then(|window| {
                    window
                        .char_indices()
                        .rev()
                        .find(|(_, c)| c.is_whitespace() || matches!(c, '.' | '!' | '?'))
                        .map(|(offset, c)| search_start_byte + offset + c.len_utf8())
                })
                .unwrap_or(end_byte)
        } else {
            end_byte
        };

        if text.get(start_byte..chunk_end_byte).is_none() {
            return Err(AccordError::InvalidInput(format!(
                "Failed to slice text at byte boundaries: start={}, end={}, len={}",
                start_byte, chunk_end_byte, text.len()
            )));
        }
        spans.push((start_byte, chunk_end_byte));

        if chunk_end_byte >= text.len() {
            break;
        }

        // Step back by the overlap, but always move forward
        let next_start = floor_boundary(chunk_end_byte.saturating_sub(char_overlap));
        start_byte = if next_start <= start_byte {
            chunk_end_byte
        } else {
            next_start
        };
    }

    Ok(spans)
}

/// Estimate token count from text
///
/// Uses approximation: 1 token ≈ 4 bytes, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}
