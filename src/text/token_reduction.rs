//! Token reduction: normalize text at a configurable aggressiveness level.
//!
//! Levels build on one another: `light` normalizes whitespace, `moderate`
//! strips filler punctuation and boilerplate, `aggressive` removes stopwords,
//! `maximum` additionally deduplicates repeated sentences. Markdown structure
//! and fenced code blocks can be preserved across all levels.

use crate::core::config::TokenReductionConfig;
use crate::error::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static REPEATED_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?,;:]){2,}").unwrap());
static PARENTHETICAL_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\((?:see|cf\.|e\.g\.|i\.e\.)[^)]*\)").unwrap());
static FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReductionLevel {
    Off,
    Light,
    Moderate,
    Aggressive,
    Maximum,
}

impl ReductionLevel {
    pub fn from_mode(mode: &str) -> Result<Self> {
        match mode {
            "off" => Ok(ReductionLevel::Off),
            "light" => Ok(ReductionLevel::Light),
            "moderate" => Ok(ReductionLevel::Moderate),
            "aggressive" => Ok(ReductionLevel::Aggressive),
            "maximum" => Ok(ReductionLevel::Maximum),
            other => Err(KreuzbergError::validation(format!("Unknown token reduction mode: {other}"))
                .with_context("mode", serde_json::json!(other))),
        }
    }
}

/// Reduction statistics reported alongside the reduced text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionStatistics {
    pub original_characters: usize,
    pub reduced_characters: usize,
    pub original_tokens: usize,
    pub reduced_tokens: usize,
    pub character_reduction_ratio: f64,
    pub token_reduction_ratio: f64,
}

pub struct TokenReducer {
    level: ReductionLevel,
    preserve_markdown: bool,
    preserve_code: bool,
    language: String,
}

impl TokenReducer {
    pub fn new(config: &TokenReductionConfig) -> Result<Self> {
        Ok(Self {
            level: ReductionLevel::from_mode(&config.mode)?,
            preserve_markdown: config.preserve_markdown,
            preserve_code: config.preserve_code,
            language: config.language.clone(),
        })
    }

    pub fn reduce(&self, text: &str) -> String {
        if self.level == ReductionLevel::Off || text.is_empty() {
            return text.to_string();
        }

        // Carve out fenced code blocks, reduce the rest, then reinsert.
        let (body, fences) = if self.preserve_code {
            extract_fences(text)
        } else {
            (text.to_string(), Vec::new())
        };

        let mut reduced = self.reduce_plain(&body);

        for (placeholder, fence) in &fences {
            reduced = reduced.replace(placeholder, fence);
        }

        reduced
    }

    fn reduce_plain(&self, text: &str) -> String {
        let mut result = normalize_whitespace(text);

        if self.level >= ReductionLevel::Moderate {
            result = strip_filler(&result);
        }

        if self.level >= ReductionLevel::Aggressive {
            result = self.strip_stopwords(&result);
        }

        if self.level >= ReductionLevel::Maximum {
            result = dedupe_sentences(&result);
        }

        result.trim().to_string()
    }

    fn strip_stopwords(&self, text: &str) -> String {
        let stopwords = crate::stopwords::stopwords_for(&self.language);
        if stopwords.is_empty() {
            return text.to_string();
        }

        text.lines()
            .map(|line| {
                if self.preserve_markdown && is_markdown_structure(line) {
                    return line.to_string();
                }

                line.split_whitespace()
                    .filter(|word| {
                        let bare: String = word
                            .chars()
                            .filter(|c| c.is_alphanumeric())
                            .collect::<String>()
                            .to_lowercase();
                        bare.is_empty() || !stopwords.contains(bare.as_str())
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_markdown_structure(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#')
        || trimmed.starts_with('|')
        || trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("> ")
        || trimmed.starts_with("```")
}

fn normalize_whitespace(text: &str) -> String {
    let spaced = MULTI_SPACE.replace_all(text, " ");
    MULTI_NEWLINE.replace_all(&spaced, "\n\n").into_owned()
}

fn strip_filler(text: &str) -> String {
    let no_filler = PARENTHETICAL_FILLER.replace_all(text, "");
    REPEATED_PUNCT.replace_all(&no_filler, "$1").into_owned()
}

fn dedupe_sentences(text: &str) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut output = Vec::new();

    for sentence in text.split_inclusive(['.', '!', '?']) {
        let normalized = sentence.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized) {
            output.push(sentence.trim());
        }
    }

    output.join(" ")
}

fn extract_fences(text: &str) -> (String, Vec<(String, String)>) {
    let mut fences = Vec::new();
    let mut body = text.to_string();

    for (index, found) in FENCE_PATTERN.find_iter(text).enumerate() {
        let placeholder = format!("\u{0}FENCE{index}\u{0}");
        body = body.replacen(found.as_str(), &placeholder, 1);
        fences.push((placeholder, found.as_str().to_string()));
    }

    (body, fences)
}

/// Reduce text per configuration.
pub fn reduce_tokens(text: &str, config: &TokenReductionConfig) -> Result<String> {
    let reducer = TokenReducer::new(config)?;
    Ok(reducer.reduce(text))
}

/// Character and token counts before/after, with reduction ratios.
pub fn get_reduction_statistics(original: &str, reduced: &str) -> ReductionStatistics {
    let original_characters = original.chars().count();
    let reduced_characters = reduced.chars().count();
    let original_tokens = original.split_whitespace().count();
    let reduced_tokens = reduced.split_whitespace().count();

    let character_reduction_ratio = if original_characters > 0 {
        1.0 - (reduced_characters as f64 / original_characters as f64)
    } else {
        0.0
    };

    let token_reduction_ratio = if original_tokens > 0 {
        1.0 - (reduced_tokens as f64 / original_tokens as f64)
    } else {
        0.0
    };

    ReductionStatistics {
        original_characters,
        reduced_characters,
        original_tokens,
        reduced_tokens,
        character_reduction_ratio,
        token_reduction_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> TokenReductionConfig {
        TokenReductionConfig {
            mode: mode.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_off_is_identity() {
        let text = "Exactly   this    text\n\n\n\nstays.";
        assert_eq!(reduce_tokens(text, &config("off")).unwrap(), text);
    }

    #[test]
    fn test_light_normalizes_whitespace() {
        let reduced = reduce_tokens("too    many   spaces\n\n\n\nhere", &config("light")).unwrap();
        assert_eq!(reduced, "too many spaces\n\nhere");
    }

    #[test]
    fn test_moderate_strips_filler() {
        let reduced = reduce_tokens("Important point (see appendix B)!!!", &config("moderate")).unwrap();
        assert!(!reduced.contains("appendix"));
        assert!(!reduced.contains("!!!"));
        assert!(reduced.contains("Important point"));
    }

    #[test]
    fn test_aggressive_removes_stopwords() {
        let reduced = reduce_tokens("the quick brown fox jumps over the lazy dog", &config("aggressive")).unwrap();
        assert!(!reduced.contains("the "));
        assert!(reduced.contains("quick"));
        assert!(reduced.contains("fox"));
    }

    #[test]
    fn test_maximum_dedupes_sentences() {
        let reduced = reduce_tokens(
            "Same sentence here. Same sentence here. Different sentence now.",
            &config("maximum"),
        )
        .unwrap();
        assert_eq!(reduced.matches("Same sentence here").count(), 1);
        assert!(reduced.contains("Different sentence now"));
    }

    #[test]
    fn test_code_fences_preserved() {
        let text = "Some the prose here\n```rust\nlet the_var = 1;\n```\nmore the prose";
        let reduced = reduce_tokens(text, &config("aggressive")).unwrap();
        assert!(reduced.contains("let the_var = 1;"));
    }

    #[test]
    fn test_markdown_structure_preserved() {
        let text = "# The Heading\n\nthe body text with the words";
        let reduced = reduce_tokens(text, &config("aggressive")).unwrap();
        assert!(reduced.contains("# The Heading"));
        assert!(!reduced.contains("the body"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(reduce_tokens("text", &config("turbo")).is_err());
    }

    #[test]
    fn test_statistics() {
        let original = "one two three four";
        let reduced = "one two";
        let stats = get_reduction_statistics(original, reduced);

        assert_eq!(stats.original_tokens, 4);
        assert_eq!(stats.reduced_tokens, 2);
        assert!((stats.token_reduction_ratio - 0.5).abs() < f64::EPSILON);
        assert!(stats.character_reduction_ratio > 0.0);
    }

    #[test]
    fn test_statistics_empty_original() {
        let stats = get_reduction_statistics("", "");
        assert_eq!(stats.character_reduction_ratio, 0.0);
        assert_eq!(stats.token_reduction_ratio, 0.0);
    }
}
