// Sliding-window text chunker

use crate::domain::DomainError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 900;
pub const DEFAULT_CHUNK_OVERLAP: usize = 120;

/// Window size and overlap, in chars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// Requires `chunk_size > 0` and `overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, DomainError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(DomainError::InvalidChunkConfig {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// Split `text` into overlapping windows of at most `chunk_size` chars.
///
/// The input is trimmed first; each window is trimmed and dropped if empty.
/// Consecutive windows start `chunk_size - overlap` chars apart (at least 1),
/// so together they cover the whole trimmed input.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the string
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(len);
        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= len {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Whitespace-separated word count
pub fn token_count(chunk: &str) -> i32 {
    chunk.split_whitespace().count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello world", 900, 120), vec!["hello world"]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(chunk_text("", 900, 120).is_empty());
        assert!(chunk_text("  \n\t ", 900, 120).is_empty());
    }

    #[test]
    fn test_window_starts_advance_by_size_minus_overlap() {
        let text: String = (0..2200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&text, 500, 50);

        assert_eq!(chunks.len(), 5);
        for (i, chunk) in chunks.iter().enumerate() {
            let start = i * 450;
            let end = (start + 500).min(2200);
            assert_eq!(chunk, &text[start..end]);
        }
    }

    #[test]
    fn test_windows_cover_input_without_gaps() {
        let text = "lorem ipsum dolor sit amet ".repeat(97);
        let trimmed = text.trim();
        let (size, overlap) = (64, 16);
        let chunks = chunk_text(&text, size, overlap);

        // Replay window positions; no window is all whitespace here
        let chars: Vec<char> = trimmed.chars().collect();
        let mut covered = vec![false; chars.len()];
        let mut start = 0;
        for _ in &chunks {
            let end = (start + size).min(chars.len());
            covered[start..end].iter_mut().for_each(|c| *c = true);
            start = end - overlap;
        }
        assert!(covered.iter().all(|c| *c));
        assert!(chunks.iter().all(|c| c.chars().count() <= size));
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "한국어 텍스트 ".repeat(50);
        let chunks = chunk_text(&text, 7, 2);

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
        assert!(chunks[0].starts_with("한국어"));
    }

    #[test]
    fn test_zero_overlap_windows_are_disjoint() {
        assert_eq!(chunk_text("abcdefgh", 3, 0), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_chunk_config_validation() {
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(100, 100).is_err());
        assert_eq!(
            ChunkConfig::new(10, 20),
            Err(DomainError::InvalidChunkConfig {
                chunk_size: 10,
                overlap: 20
            })
        );
        let config = ChunkConfig::default();
        assert_eq!((config.chunk_size(), config.overlap()), (900, 120));
    }

    #[test]
    fn test_token_count_splits_on_whitespace() {
        assert_eq!(token_count("hello   world\nagain"), 3);
        assert_eq!(token_count(""), 0);
    }
}
