//! Text chunking built on the `text-splitter` crate.
//!
//! Splits long text into chunks while preserving semantic boundaries. The
//! markdown-aware splitter keeps heading and fence boundaries intact and is
//! selected automatically for markdown MIME types; other text uses the
//! generic splitter.

use crate::error::{KreuzbergError, Result};
use crate::types::{Chunk, ChunkMetadata};
use serde::{Deserialize, Serialize};
use text_splitter::{Characters, ChunkCapacity, ChunkConfig, MarkdownSplitter, TextSplitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkerType {
    Text,
    Markdown,
}

impl ChunkerType {
    /// Splitter selection by output MIME type.
    pub fn for_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "text/markdown" | "text/x-markdown" => ChunkerType::Markdown,
            _ => ChunkerType::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingResult {
    pub chunks: Vec<Chunk>,
    pub chunk_count: usize,
}

pub struct ChunkingConfig {
    pub max_characters: usize,
    pub overlap: usize,
    pub trim: bool,
    pub chunker_type: ChunkerType,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_characters: 2000,
            overlap: 100,
            trim: true,
            chunker_type: ChunkerType::Text,
        }
    }
}

fn build_chunk_config(max_characters: usize, overlap: usize, trim: bool) -> Result<ChunkConfig<Characters>> {
    ChunkConfig::new(ChunkCapacity::new(max_characters))
        .with_overlap(overlap)
        .map(|config| config.with_trim(trim))
        .map_err(|e| KreuzbergError::validation(format!("Invalid chunking configuration: {e}")))
}

pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<ChunkingResult> {
    if text.is_empty() {
        return Ok(ChunkingResult {
            chunks: vec![],
            chunk_count: 0,
        });
    }

    let chunk_config = build_chunk_config(config.max_characters, config.overlap, config.trim)?;

    let text_chunks: Vec<&str> = match config.chunker_type {
        ChunkerType::Text => {
            let splitter = TextSplitter::new(chunk_config);
            splitter.chunks(text).collect()
        }
        ChunkerType::Markdown => {
            let splitter = MarkdownSplitter::new(chunk_config);
            splitter.chunks(text).collect()
        }
    };

    let total_chunks = text_chunks.len();
    let mut char_offset = 0;

    let chunks: Vec<Chunk> = text_chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk_text)| {
            let char_start = char_offset;
            let char_end = char_start + chunk_text.chars().count();
            char_offset = char_end;

            Chunk {
                content: chunk_text.to_string(),
                metadata: ChunkMetadata {
                    char_start,
                    char_end,
                    chunk_index: index,
                    total_chunks,
                },
            }
        })
        .collect();

    let chunk_count = chunks.len();

    Ok(ChunkingResult { chunks, chunk_count })
}

pub fn chunk_texts_batch(texts: &[&str], config: &ChunkingConfig) -> Result<Vec<ChunkingResult>> {
    texts.iter().map(|text| chunk_text(text, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_empty_text() {
        let config = ChunkingConfig::default();
        let result = chunk_text("", &config).unwrap();
        assert_eq!(result.chunk_count, 0);
    }

    #[test]
    fn test_chunk_short_text_single_chunk() {
        let config = ChunkingConfig {
            max_characters: 100,
            overlap: 10,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let text = "This is a short text.";
        let result = chunk_text(text, &config).unwrap();
        assert_eq!(result.chunk_count, 1);
        assert_eq!(result.chunks[0].content, text);
    }

    #[test]
    fn test_chunk_long_text_respects_limit() {
        let config = ChunkingConfig {
            max_characters: 20,
            overlap: 5,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let text = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let result = chunk_text(text, &config).unwrap();
        assert!(result.chunk_count >= 2);
        assert!(result.chunks.iter().all(|chunk| chunk.content.len() <= 20));
    }

    #[test]
    fn test_chunk_overlap_repeats_content() {
        let config = ChunkingConfig {
            max_characters: 20,
            overlap: 5,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        let result = chunk_text(text, &config).unwrap();
        assert!(result.chunk_count >= 2);

        let first_tail = &result.chunks[0].content[result.chunks[0].content.len().saturating_sub(5)..];
        assert!(result.chunks[1].content.starts_with(first_tail));
    }

    #[test]
    fn test_chunks_reconstruct_content() {
        let config = ChunkingConfig {
            max_characters: 40,
            overlap: 0,
            trim: false,
            chunker_type: ChunkerType::Text,
        };
        let text = "word ".repeat(50);
        let result = chunk_text(&text, &config).unwrap();

        let joined: String = result.chunks.iter().map(|c| c.content.as_str()).collect();
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&joined), normalize(&text));
    }

    #[test]
    fn test_markdown_preserves_fences() {
        let config = ChunkingConfig {
            max_characters: 100,
            overlap: 10,
            trim: true,
            chunker_type: ChunkerType::Markdown,
        };
        let markdown = "# Code Example\n\n```python\nprint('hello')\n```\n\nSome text after code.";
        let result = chunk_text(markdown, &config).unwrap();
        assert!(result.chunks.iter().any(|chunk| chunk.content.contains("```")));
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let config = ChunkingConfig {
            max_characters: 10,
            overlap: 20,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let result = chunk_text("Some text", &config);
        assert!(matches!(result, Err(KreuzbergError::Validation { .. })));
    }

    #[test]
    fn test_chunker_type_for_mime() {
        assert_eq!(ChunkerType::for_mime_type("text/markdown"), ChunkerType::Markdown);
        assert_eq!(ChunkerType::for_mime_type("text/x-markdown"), ChunkerType::Markdown);
        assert_eq!(ChunkerType::for_mime_type("text/plain"), ChunkerType::Text);
    }

    #[test]
    fn test_chunk_metadata_offsets() {
        let config = ChunkingConfig {
            max_characters: 30,
            overlap: 0,
            trim: false,
            chunker_type: ChunkerType::Text,
        };
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let result = chunk_text(text, &config).unwrap();

        for window in result.chunks.windows(2) {
            assert!(window[0].metadata.char_end <= window[1].metadata.char_start + 1);
        }
        assert!(result.chunks.iter().all(|c| c.metadata.total_chunks == result.chunk_count));
    }

    #[test]
    fn test_batch() {
        let config = ChunkingConfig {
            max_characters: 20,
            overlap: 5,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let texts = vec!["Short", "This is a longer text that should be split into chunks", ""];
        let results = chunk_texts_batch(&texts, &config).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk_count, 1);
        assert!(results[1].chunk_count > 1);
        assert_eq!(results[2].chunk_count, 0);
    }

    #[test]
    fn test_unicode_chunking() {
        let config = ChunkingConfig {
            max_characters: 30,
            overlap: 5,
            trim: true,
            chunker_type: ChunkerType::Text,
        };
        let text = "日本語のテキストです。これは長い文章で、複数のチャンクに分割されるべきです。";
        let result = chunk_text(text, &config).unwrap();
        assert!(result.chunk_count >= 1);
    }
}
