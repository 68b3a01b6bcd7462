//! Overlapping fixed-window text chunker.
//!
//! Documents are normalized (whitespace runs collapsed to single spaces,
//! ends trimmed) and split into windows of `size` characters advancing by
//! `size - overlap`, so consecutive chunks share `overlap` characters. The
//! final window may be shorter. Empty normalized text yields zero chunks.

use anyhow::Result;

use crate::models::Chunk;

/// Splits normalized document text into overlapping windows.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. Fails unless `0 < overlap < size`; an overlap at
    /// or above the window size would never advance.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            anyhow::bail!("chunk window size must be > 0");
        }
        if overlap >= size {
            anyhow::bail!(
                "chunk overlap ({}) must be < window size ({})",
                overlap,
                size
            );
        }
        Ok(Self { size, overlap })
    }

    /// Normalize then window a document body into [`Chunk`]s with
    /// contiguous indices starting at 0.
    pub fn chunk(&self, source: &str, title: &str, raw: &str) -> Vec<Chunk> {
        let text = normalize(raw);
        self.windows(&text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                source: source.to_string(),
                title: title.to_string(),
                index,
                text,
            })
            .collect()
    }

    /// Produce the window texts for already-normalized input.
    ///
    /// Windows are `[start, start + size)` over characters (not bytes, so
    /// multibyte text never splits inside a code point), advancing
    /// `start = end - overlap` until the text is covered.
    pub fn windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut out = Vec::new();

        if total == 0 {
            return out;
        }

        let mut start = 0usize;
        loop {
            let end = (start + self.size).min(total);
            out.push(chars[start..end].iter().collect());
            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        out
    }
}

/// Collapse all whitespace runs (including newlines) to single spaces and
/// trim the ends.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_space = true;
        } else {
            if in_space && !out.is_empty() {
                out.push(' ');
            }
            in_space = false;
            out.push(ch);
        }
    }
    out
}
