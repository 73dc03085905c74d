//! Text chunking with configurable size and overlap.

use ragpipe_core::config::ChunkingSettings;
use ragpipe_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use text_splitter::{ChunkConfig, TextSplitter};

/// A span of the source text, byte offsets included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Splits document content into retrievable spans.
pub trait Chunker: Send + Sync {
    /// Spans in document order. Empty or whitespace-only content yields none.
    fn chunk(&self, content: &str) -> AppResult<Vec<TextSpan>>;
}

/// Chunk id for the span at `position` of a document.
pub fn chunk_id(document_id: &str, position: usize) -> String {
    format!("{}-{}", document_id, position)
}

/// Character-capacity chunker on top of `text-splitter`.
///
/// Splits at the coarsest semantic boundary that fits (paragraphs, then
/// sentences, then words), so short documents become a single chunk.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunking settings: {}", e)))?;

        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> AppResult<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }
}

impl Chunker for TextChunker {
    fn chunk(&self, content: &str) -> AppResult<Vec<TextSpan>> {
        let spans: Vec<TextSpan> = self
            .splitter
            .chunk_indices(content)
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(start, text)| TextSpan {
                start,
                end: start + text.len(),
                text: text.to_string(),
            })
            .collect();

        tracing::debug!(
            "Text splitter created {} chunks from {} bytes",
            spans.len(),
            content.len()
        );

        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(512, 64).unwrap();
        let spans = chunker.chunk("The sky is blue.").unwrap();

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "The sky is blue.");
        assert_eq!((spans[0].start, spans[0].end), (0, 16));
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = TextChunker::new(512, 0).unwrap();
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("  \n\n ").unwrap().is_empty());
    }

    #[test]
    fn test_long_text_respects_capacity() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let text = "This is a test sentence. ".repeat(40);

        let spans = chunker.chunk(&text).unwrap();
        assert!(spans.len() > 1);
        for span in &spans {
            assert!(span.text.chars().count() <= 100);
            assert_eq!(&text[span.start..span.end], span.text);
        }
        assert!(spans.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_utf8_text() {
        let chunker = TextChunker::new(40, 0).unwrap();
        let text = "Gamedex é um aplicativo 🎮 com acentuação: ã, õ, ç. ".repeat(10);

        let spans = chunker.chunk(&text).unwrap();
        assert!(!spans.is_empty());
        for span in &spans {
            assert_eq!(&text[span.start..span.end], span.text);
        }
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(TextChunker::new(0, 0), Err(AppError::Config(_))));
        assert!(matches!(TextChunker::new(10, 10), Err(AppError::Config(_))));
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("D1", 0), "D1-0");
        assert_eq!(chunk_id("doc-abc", 12), "doc-abc-12");
    }
}
