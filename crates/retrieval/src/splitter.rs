//! Text splitting for ingestion.
//!
//! Sizes are counted in characters, never bytes, so multi-byte text is
//! never cut inside a code point.

use std::collections::VecDeque;

use contractlens_config::{ChunkingStrategy, IngestionConfig};
use contractlens_core::error::RetrievalError;

/// Tried in order by the recursive strategy. The empty separator splits
/// into single characters and always applies.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: ChunkingStrategy,
}

impl TextSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        strategy: ChunkingStrategy,
    ) -> Result<Self, RetrievalError> {
        if chunk_size == 0 {
            return Err(RetrievalError::Config("chunk_size must be at least 1".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RetrievalError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, strategy })
    }

    pub fn from_config(config: &IngestionConfig) -> Result<Self, RetrievalError> {
        Self::new(config.chunk_size, config.chunk_overlap, config.strategy)
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self.strategy {
            ChunkingStrategy::Fixed => self.split_fixed(text),
            ChunkingStrategy::Recursive => self.split_recursive(text, &SEPARATORS),
        }
    }

    fn split_fixed(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            chunks.extend(self.split_recursive(piece, finer));
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying up to `chunk_overlap`
    /// trailing characters into the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if !window.is_empty() {
            push_joined(&mut chunks, &window);
        }
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let joined = joined.trim();
    if !joined.is_empty() {
        chunks.push(joined.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "1. Term. This Agreement begins on the Effective Date \
         and continues for two years.\n\n\
         2. Termination. Either party may terminate on ninety days written notice.\n\n\
         3. Confidentiality. Each party keeps the other's Confidential Information secret.";

    fn recursive(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(size, overlap, ChunkingStrategy::Recursive).unwrap()
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(TextSplitter::new(0, 0, ChunkingStrategy::Fixed).is_err());
        assert!(TextSplitter::new(100, 100, ChunkingStrategy::Fixed).is_err());
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(recursive(100, 10).split("  \n\n\t ").is_empty());
        let fixed = TextSplitter::new(10, 2, ChunkingStrategy::Fixed).unwrap();
        assert!(fixed.split("").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(
            recursive(1000, 100).split("  Governing law: Delaware. "),
            vec!["Governing law: Delaware."]
        );
    }

    #[test]
    fn fixed_windows_overlap() {
        let splitter = TextSplitter::new(4, 1, ChunkingStrategy::Fixed).unwrap();
        assert_eq!(splitter.split("abcdefghij"), vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn recursive_keeps_paragraphs_whole() {
        let chunks = recursive(100, 0).split(CONTRACT);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("1. Term."));
        assert!(chunks[1].starts_with("2. Termination."));
        assert!(chunks[2].ends_with("secret."));
    }

    #[test]
    fn recursive_respects_size_limit() {
        let splitter = recursive(40, 10);
        let chunks = splitter.split(CONTRACT);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn recursive_overlap_repeats_trailing_words() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = recursive(20, 8).split(text);
        assert!(chunks.len() >= 2);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(25);
        let chunks = recursive(10, 0).split(&text);
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn multibyte_text_is_safe() {
        let text = "Vertragsstrafe für Verzögerung: 5 % pro Woche — höchstens 20 %.";
        for strategy in [ChunkingStrategy::Fixed, ChunkingStrategy::Recursive] {
            let splitter = TextSplitter::new(12, 3, strategy).unwrap();
            for chunk in splitter.split(text) {
                assert!(chunk.chars().count() <= 12);
            }
        }
    }
}
