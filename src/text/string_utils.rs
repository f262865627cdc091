//! Byte-to-string decoding and whitespace normalization.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static MULTI_SPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\f\v\u{a0}]{2,}").unwrap());
static MULTI_NEWLINE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Decode document bytes to a string with charset auto-detection.
///
/// Valid UTF-8 passes through untouched. With the `quality` feature the
/// charset is sniffed with chardetng and decoded via encoding_rs; otherwise
/// invalid sequences are replaced.
pub fn safe_decode(content: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(content) {
        return text.to_string();
    }

    #[cfg(feature = "quality")]
    {
        use unicode_normalization::UnicodeNormalization;

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(content, true);
        let encoding = detector.guess(None, true);
        let (decoded, _, _) = encoding.decode(content);
        decoded.nfc().collect()
    }

    #[cfg(not(feature = "quality"))]
    {
        String::from_utf8_lossy(content).into_owned()
    }
}

/// Collapse runs of two or more spaces into one and trim line edges,
/// bounding consecutive blank lines to one.
pub fn normalize_spaces(text: &str) -> String {
    let collapsed: Cow<'_, str> = if MULTI_SPACE_PATTERN.is_match(text) {
        Cow::Owned(MULTI_SPACE_PATTERN.replace_all(text, " ").into_owned())
    } else {
        Cow::Borrowed(text)
    };

    let trimmed: String = collapsed
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    MULTI_NEWLINE_PATTERN.replace_all(&trimmed, "\n\n").trim().to_string()
}

/// Remove control characters that break downstream consumers, keeping
/// newlines, carriage returns, and tabs.
pub fn strip_control_characters(text: &str) -> String {
    if text
        .chars()
        .any(|c| matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}') && c != '\n' && c != '\r' && c != '\t')
    {
        text.chars()
            .filter(|c| !matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}') || matches!(c, '\n' | '\r' | '\t'))
            .collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_decode_utf8() {
        assert_eq!(safe_decode("héllo wörld".as_bytes()), "héllo wörld");
    }

    #[test]
    fn test_safe_decode_non_utf8() {
        // Latin-1 "café"
        let latin1 = b"caf\xe9";
        let decoded = safe_decode(latin1);
        assert!(!decoded.is_empty());
        assert!(decoded.starts_with("caf"));
    }

    #[test]
    fn test_normalize_spaces_collapses_runs() {
        assert_eq!(normalize_spaces("Hello    World"), "Hello World");
        assert_eq!(normalize_spaces("a  b\tc"), "a b\tc");
    }

    #[test]
    fn test_normalize_spaces_bounds_blank_lines() {
        assert_eq!(normalize_spaces("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_strip_control_characters() {
        assert_eq!(strip_control_characters("Hello\x00World\x01!"), "HelloWorld!");
        assert_eq!(strip_control_characters("keep\nthese\r\ttoo"), "keep\nthese\r\ttoo");
    }
}
