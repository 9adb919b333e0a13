//! Text preparation for indexing: sanitizing extracted text and splitting it
//! into overlapping chunks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Runs of three or more single characters separated by single spaces,
/// as produced by some PDF and OCR text layers ("H e l l o").
static SPACED_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\w ){2,}\w\b").expect("static regex"));

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("static regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits sanitized text into non-empty overlapping chunks. Chunk `i` of the
    /// returned vector is the chunk with index `i`.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size.saturating_sub(1));

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        if total_chars == 0 {
            return chunks;
        }

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                find_sentence_boundary(&chunk_text)
            } else {
                chunk_text
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Removes NUL bytes, repairs letter-spaced runs and trims.
pub fn sanitize_text(text: &str) -> String {
    let without_nul = text.replace('\0', " ");
    let repaired = fix_ocr_spacing(&without_nul);
    repaired.trim().to_string()
}

/// "T h e  q u i c k" becomes "The quick". Ordinary prose is left alone.
pub fn fix_ocr_spacing(text: &str) -> String {
    if !SPACED_LETTERS.is_match(text) {
        return text.to_string();
    }

    let joined = SPACED_LETTERS.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[0].replace(' ', "")
    });
    MULTI_SPACE.replace_all(&joined, " ").into_owned()
}

/// Cuts at the last sentence end in the final 20% of the chunk, if any.
fn find_sentence_boundary(text: &str) -> String {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let mut search_start = (text.len() * 80) / 100;
    while !text.is_char_boundary(search_start) {
        search_start += 1;
    }
    let search_text = &text[search_start..];

    let best = sentence_endings
        .iter()
        .filter_map(|ending| search_text.rfind(ending).map(|pos| pos + ending.len()))
        .max();

    match best {
        Some(offset) => text[..search_start + offset].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunker(100, 20).split("A single short paragraph.");
        assert_eq!(chunks, vec!["A single short paragraph.".to_string()]);
    }

    #[test]
    fn long_text_overlaps_and_covers_the_end() {
        let text = "This is a test sentence. ".repeat(40);
        let chunks = chunker(100, 20).split(&text);

        assert!(chunks.len() > 5);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(text.trim_end().ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = format!("{} End here. {}", "word ".repeat(17), "tail ".repeat(40));
        let chunks = chunker(100, 10).split(&text);
        assert!(chunks[0].ends_with("End here."));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "Café résumé naïve. ".repeat(30);
        let chunks = chunker(50, 10).split(&text);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunker(100, 20).split("").is_empty());
    }

    #[test]
    fn sanitize_strips_nul_and_repairs_letter_spacing() {
        assert_eq!(sanitize_text("  abc\0def  "), "abc def");
        assert_eq!(fix_ocr_spacing("T h e  q u i c k  fox"), "The quick fox");
        assert_eq!(fix_ocr_spacing("a normal sentence"), "a normal sentence");
    }
}
