//! Plain text and Markdown parsing.

use crate::Result;
use crate::text::safe_decode;
use crate::types::TextExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+?)\s*$").unwrap());
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]*)\)").unwrap());
static CODE_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap());

/// Decode text bytes and compute text metadata.
///
/// With `parse_markdown` set, headers, links, and fenced code blocks are
/// additionally collected.
pub fn parse_text(content: &[u8], parse_markdown: bool) -> Result<TextExtractionResult> {
    let text = safe_decode(content);

    let line_count = text.lines().count();
    let word_count = text.split_whitespace().count();
    let character_count = text.chars().count();

    let (headers, links, code_blocks) = if parse_markdown {
        let headers: Vec<String> = HEADER_PATTERN
            .captures_iter(&text)
            .map(|captures| captures[1].to_string())
            .collect();

        let links: Vec<(String, String)> = LINK_PATTERN
            .captures_iter(&text)
            .map(|captures| (captures[1].to_string(), captures[2].to_string()))
            .collect();

        let code_blocks: Vec<(String, String)> = CODE_BLOCK_PATTERN
            .captures_iter(&text)
            .map(|captures| (captures[1].to_string(), captures[2].trim_end().to_string()))
            .collect();

        (Some(headers), Some(links), Some(code_blocks))
    } else {
        (None, None, None)
    };

    Ok(TextExtractionResult {
        content: text,
        line_count,
        word_count,
        character_count,
        headers,
        links,
        code_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_counts() {
        let result = parse_text(b"Line 1\nLine 2\nLine 3", false).unwrap();
        assert_eq!(result.content, "Line 1\nLine 2\nLine 3");
        assert_eq!(result.line_count, 3);
        assert_eq!(result.word_count, 6);
        assert_eq!(result.character_count, 20);
        assert!(result.headers.is_none());
    }

    #[test]
    fn test_markdown_features() {
        let input = b"# T\n\n[L](http://x)\n\n```py\nx=1\n```";
        let result = parse_text(input, true).unwrap();

        assert_eq!(result.headers.unwrap(), vec!["T"]);
        assert_eq!(result.links.unwrap(), vec![("L".to_string(), "http://x".to_string())]);
        assert_eq!(result.code_blocks.unwrap(), vec![("py".to_string(), "x=1".to_string())]);
    }

    #[test]
    fn test_markdown_multiple_headers() {
        let input = b"# First\n\ntext\n\n## Second\n\n### Third  \n";
        let result = parse_text(input, true).unwrap();
        assert_eq!(result.headers.unwrap(), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_code_block_without_language() {
        let input = b"```\nraw\n```";
        let result = parse_text(input, true).unwrap();
        assert_eq!(result.code_blocks.unwrap(), vec![(String::new(), "raw".to_string())]);
    }

    #[test]
    fn test_empty_input() {
        let result = parse_text(b"", false).unwrap();
        assert_eq!(result.line_count, 0);
        assert_eq!(result.word_count, 0);
        assert_eq!(result.character_count, 0);
    }
}
