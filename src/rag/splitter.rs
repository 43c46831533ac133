//! Character-window text splitter.
//!
//! Pages are cut into windows of at most `chunk_size` characters. A window
//! that does not reach the end of the page is shortened to the last preferred
//! separator (paragraph, line, then word break) found after the overlap
//! region. Consecutive chunks of a page share exactly `chunk_overlap`
//! characters, so a page can be rebuilt from its chunks and their offsets.

use serde::{Deserialize, Serialize};

use super::error::RagError;
use super::loader::SourceDocument;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Configuration for the text splitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub id: String,
    /// The text content
    pub text: String,
    /// Source file name
    pub source: String,
    /// 1-based page the chunk was cut from
    pub page: u32,
    /// Character offset within the page
    pub start_offset: usize,
    /// Position of the chunk within the whole document
    pub chunk_index: usize,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self, RagError> {
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split every page of `document`, numbering chunks in document order.
    pub fn split_document(&self, document: &SourceDocument) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            for (start_offset, text) in self.split_text(&page.text) {
                let chunk_index = chunks.len();
                chunks.push(TextChunk {
                    id: format!("chunk_{}", chunk_index),
                    text,
                    source: document.source.clone(),
                    page: page.page,
                    start_offset,
                    chunk_index,
                });
            }
        }
        chunks
    }

    /// Split text into `(start_offset, text)` spans.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut spans = Vec::new();

        if total_chars == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            let hard_end = (start + chunk_size).min(total_chars);
            let end = if hard_end == total_chars {
                total_chars
            } else {
                find_break(&chars, start, start + overlap + 1, hard_end).unwrap_or(hard_end)
            };

            spans.push((start, chars[start..end].iter().collect()));

            if end == total_chars {
                break;
            }
            // end > start + overlap, so the window always advances
            start = end - overlap;
        }

        spans
    }
}

/// End position just after the last preferred separator that lies inside
/// `chars[start..max_end]` and ends at or after `min_end`.
fn find_break(chars: &[char], start: usize, min_end: usize, max_end: usize) -> Option<usize> {
    for separator in SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        let mut end = max_end;
        while end >= min_end && end >= start + sep.len() {
            if chars[end - sep.len()..end] == sep[..] {
                return Some(end);
            }
            end -= 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::loader::PageText;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
        })
        .expect("valid splitter config")
    }

    fn rebuild(spans: &[(usize, String)], overlap: usize) -> String {
        let mut text = String::new();
        for (i, (_, chunk)) in spans.iter().enumerate() {
            if i == 0 {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().skip(overlap));
            }
        }
        text
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = TextSplitter::new(SplitterConfig {
            chunk_size: 50,
            chunk_overlap: 50,
        })
        .unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        assert!(TextSplitter::new(SplitterConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        })
        .is_err());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let spans = splitter(500, 50).split_text("Paris is the capital of France.");
        assert_eq!(spans, vec![(0, "Paris is the capital of France.".to_string())]);
    }

    #[test]
    fn chunks_respect_max_size_and_rebuild_the_text() {
        let text = "This is a test sentence with several words. ".repeat(60);
        let spans = splitter(500, 50).split_text(&text);

        assert!(spans.len() > 1);
        for (_, chunk) in &spans {
            assert!(chunk.chars().count() <= 500);
        }
        assert_eq!(rebuild(&spans, 50), text);
    }

    #[test]
    fn neighbours_overlap_by_exactly_the_configured_amount() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa ".repeat(30);
        let spans = splitter(120, 20).split_text(&text);

        for pair in spans.windows(2) {
            let (prev_start, prev) = &pair[0];
            let (next_start, next) = &pair[1];
            let prev_len = prev.chars().count();
            assert_eq!(*next_start, prev_start + prev_len - 20);

            let tail: String = prev.chars().skip(prev_len - 20).collect();
            let head: String = next.chars().take(20).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let text = format!("{first}\n\n{second}");
        let spans = splitter(100, 10).split_text(&text);

        assert_eq!(spans[0].1, format!("{first}\n\n"));
    }

    #[test]
    fn text_without_separators_is_cut_hard() {
        let text = "x".repeat(1050);
        let spans = splitter(500, 50).split_text(&text);

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].1.len(), 500);
        assert_eq!(spans[1].0, 450);
        assert_eq!(spans[2].0, 900);
        assert_eq!(spans[2].1.len(), 150);
        assert_eq!(rebuild(&spans, 50), text);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "日本語のテキストです。".repeat(40);
        let spans = splitter(100, 10).split_text(&text);

        for (_, chunk) in &spans {
            assert!(chunk.chars().count() <= 100);
        }
        assert_eq!(rebuild(&spans, 10), text);
    }

    #[test]
    fn document_chunks_are_numbered_in_page_order() {
        let document = SourceDocument {
            source: "book.pdf".to_string(),
            pages: vec![
                PageText {
                    page: 1,
                    text: "word ".repeat(30),
                },
                PageText {
                    page: 2,
                    text: "   ".to_string(),
                },
                PageText {
                    page: 3,
                    text: "Last page.".to_string(),
                },
            ],
        };

        let chunks = splitter(50, 5).split_document(&document);

        assert!(chunks.len() >= 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.id, format!("chunk_{i}"));
            assert_eq!(chunk.source, "book.pdf");
        }
        assert!(chunks.iter().all(|c| c.page != 2));
        let last = chunks.last().unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.text, "Last page.");
    }
}
