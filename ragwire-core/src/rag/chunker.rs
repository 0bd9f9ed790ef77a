//! Boundary-aware text chunking.
//!
//! Text is cut into windows of `chunk_size` characters that overlap by
//! `overlap` characters. A window that doesn't reach the end of the text is
//! shortened to end just after its last `.` or `\n`, as long as that boundary
//! lies past the middle of the window.
//!
//! All sizes count characters (Unicode scalar values), not bytes, so a
//! multi-byte character is never split.

use super::types::{Chunk, Document};
use crate::config::RagConfig;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ChunkerError {
    #[error("chunk_size must be greater than 0")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_OVERLAP: usize = 200;

fn is_boundary(c: char) -> bool {
    c == '.' || c == '\n'
}

/// Returns the byte ranges of each chunk window, untrimmed.
///
/// Texts of at most `chunk_size` characters come back as a single span. A
/// zero `chunk_size` yields no spans. An `overlap` of `chunk_size` or more
/// degrades to windows that start where the previous one ended.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<Range<usize>> {
    if chunk_size == 0 {
        return Vec::new();
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = offsets.len() - 1;

    if char_len <= chunk_size {
        return vec![0..text.len()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + chunk_size).min(char_len);

        if end < char_len {
            let break_point = (start..end).rev().find(|&i| is_boundary(chars[i]));
            if let Some(position) = break_point {
                if position - start > chunk_size / 2 {
                    end = position + 1;
                }
            }
        }

        spans.push(offsets[start]..offsets[end]);

        if end >= char_len {
            break;
        }

        // A snapped window can be shorter than the overlap; never move backwards.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    spans
}

/// Splits text into trimmed chunks.
///
/// Empty and whitespace-only text yields no chunks, and so do windows that
/// trim down to nothing.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    chunk_spans(text, chunk_size, overlap)
        .into_iter()
        .map(|span| text[span].trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Validated chunking settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge { chunk_size, overlap });
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self, ChunkerError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }

    /// Chunks a document. Every chunk carries the final chunk count.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let texts = self.split(&document.text);
        let total = texts.len();

        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                document_id: document.id.clone(),
                index,
                total,
                text,
                embedding: Vec::new(),
            })
            .collect()
    }
}
