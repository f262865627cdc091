//! Plain text and Markdown extractors.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::extraction::text::parse_text;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, Metadata, TextMetadata};
use async_trait::async_trait;

/// Plain text extractor (.txt).
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text-extractor"
    }

    fn description(&self) -> &str {
        "Extracts content from plain text files"
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let text_result = parse_text(content, false)?;

        let mut result = ExtractionResult::new(text_result.content, "text/plain");
        result.metadata = Metadata {
            text: Some(TextMetadata {
                line_count: text_result.line_count,
                word_count: text_result.word_count,
                character_count: text_result.character_count,
                headers: None,
                links: None,
                code_blocks: None,
            }),
            ..Default::default()
        };
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/plain"]
    }
}

/// Markdown extractor (.md, .markdown).
///
/// Preserves markdown syntax and collects headers, links, and fenced code
/// blocks into metadata.
pub struct MarkdownExtractor;

impl MarkdownExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown-extractor"
    }

    fn description(&self) -> &str {
        "Extracts content from Markdown files with metadata parsing"
    }
}

#[async_trait]
impl DocumentExtractor for MarkdownExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let text_result = parse_text(content, true)?;

        let mut result = ExtractionResult::new(text_result.content, "text/markdown");
        result.metadata = Metadata {
            text: Some(TextMetadata {
                line_count: text_result.line_count,
                word_count: text_result.word_count,
                character_count: text_result.character_count,
                headers: text_result.headers,
                links: text_result.links,
                code_blocks: text_result.code_blocks,
            }),
            ..Default::default()
        };
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/markdown", "text/x-markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text_extractor() {
        let extractor = PlainTextExtractor::new();
        let config = ExtractionConfig::default();

        let result = extractor
            .extract_bytes(b"Line 1\nLine 2\nLine 3", "text/plain", &config)
            .await
            .unwrap();

        assert_eq!(result.mime_type, "text/plain");
        assert_eq!(result.content, "Line 1\nLine 2\nLine 3");

        let text_metadata = result.metadata.text.unwrap();
        assert_eq!(text_metadata.line_count, 3);
        assert_eq!(text_metadata.word_count, 6);
        assert_eq!(text_metadata.character_count, 20);
    }

    #[tokio::test]
    async fn test_markdown_extractor() {
        let extractor = MarkdownExtractor::new();
        let config = ExtractionConfig::default();
        let content = b"# Header\n\nThis is [a link](https://example.com).\n\n```python\nprint(\"hello\")\n```";

        let result = extractor.extract_bytes(content, "text/markdown", &config).await.unwrap();

        assert_eq!(result.mime_type, "text/markdown");
        assert!(result.content.contains("# Header"));

        let text_metadata = result.metadata.text.unwrap();
        assert_eq!(text_metadata.headers.unwrap(), vec!["Header"]);
        assert_eq!(
            text_metadata.links.unwrap(),
            vec![("a link".to_string(), "https://example.com".to_string())]
        );
        assert_eq!(
            text_metadata.code_blocks.unwrap(),
            vec![("python".to_string(), "print(\"hello\")".to_string())]
        );
    }

    #[test]
    fn test_plugin_interfaces() {
        let plain = PlainTextExtractor::new();
        assert_eq!(plain.name(), "plain-text-extractor");
        assert_eq!(plain.supported_mime_types(), &["text/plain"]);
        assert_eq!(plain.priority(), 50);

        let markdown = MarkdownExtractor::new();
        assert_eq!(markdown.name(), "markdown-extractor");
        assert_eq!(markdown.supported_mime_types(), &["text/markdown", "text/x-markdown"]);
    }
}
