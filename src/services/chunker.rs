//! Text chunking with overlap for embedding.

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkingConfig, Document};

/// Splits documents into bounded, order-preserving chunks.
///
/// Sizes are measured in chars. Consecutive chunks of one document share
/// exactly `overlap` chars, so dropping the first `overlap` chars of every
/// chunk but the first reconstructs the document.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chunk_chars: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_chunk_chars: usize, overlap: usize) -> Result<Self, ConfigError> {
        if max_chunk_chars == 0 || overlap >= max_chunk_chars {
            return Err(ConfigError::InvalidChunking {
                max: max_chunk_chars,
                overlap,
            });
        }
        Ok(Self {
            max_chunk_chars,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        Self::new(config.max_chunk_chars, config.overlap_chars)
    }

    /// Split documents in order. Chunk ids are assigned sequentially from 0.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut next_id = 0u64;

        for document in documents {
            for (chunk_index, (text, start_offset)) in
                self.split_text(&document.text).into_iter().enumerate()
            {
                chunks.push(Chunk::from_document(
                    document,
                    next_id,
                    text,
                    start_offset,
                    chunk_index as u32,
                ));
                next_id += 1;
            }
        }

        chunks
    }

    /// Split one text into `(chunk_text, start_offset)` pairs.
    fn split_text(&self, content: &str) -> Vec<(String, usize)> {
        let chars: Vec<char> = content.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 {
            return Vec::new();
        }

        if total_chars <= self.max_chunk_chars {
            return vec![(content.to_string(), 0)];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let target_end = (start + self.max_chunk_chars).min(total_chars);
            let end = self.find_break_point(&chars, start, target_end);

            chunks.push((chars[start..end].iter().collect(), start));

            if end >= total_chars {
                break;
            }
            // end > start + overlap, so this always advances
            start = end - self.overlap;
        }

        chunks
    }

    /// Find a natural break point at or before `target_end`.
    ///
    /// The returned position is always greater than `start + overlap`.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        if target_end >= chars.len() {
            return chars.len();
        }

        // Look for a natural break within the last 20% of the window
        let search_start = target_end
            .saturating_sub(self.max_chunk_chars / 5)
            .max(start + self.overlap + 1);
        if search_start >= target_end {
            return target_end;
        }

        // Priority: double newline > single newline > period+space > space
        let mut best_break = None;
        let mut last_newline = None;
        let mut last_sentence = None;
        let mut last_space = None;

        for pos in search_start..target_end {
            match chars[pos] {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        best_break = Some(pos + 1);
                    }
                    last_newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        last_sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    last_space = Some(pos + 1);
                }
                _ => {}
            }
        }

        best_break
            .or(last_newline)
            .or(last_sentence)
            .or(last_space)
            .unwrap_or(target_end)
    }
}
