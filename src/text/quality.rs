//! Text quality scoring and cleanup.
//!
//! Scores extracted text on a 0.0-1.0 scale by penalizing OCR artifacts,
//! leaked script/style content, and navigation chrome, with a bonus for
//! sentence and paragraph structure.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

const OCR_PENALTY_WEIGHT: f64 = 0.3;
const SCRIPT_PENALTY_WEIGHT: f64 = 0.2;
const NAV_PENALTY_WEIGHT: f64 = 0.1;
const STRUCTURE_BONUS_WEIGHT: f64 = 0.2;
const METADATA_BONUS_WEIGHT: f64 = 0.1;

const MIN_TEXT_LENGTH: usize = 10;
const LARGE_TEXT_LENGTH: usize = 1000;

static SCATTERED_CHARS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]\s{2,}[a-zA-Z]\s{2,}[a-zA-Z]\b").unwrap());
static REPEATED_PUNCT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.]{3,}|[_]{3,}|[-]{4,}").unwrap());
static ISOLATED_PUNCT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s[.,;:!?]\s").unwrap());
static EXCESSIVE_WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{3,}").unwrap());

static SCRIPT_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static CSS_RULES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.[a-zA-Z][\w-]*\s*\{[^}]*\}").unwrap());

static NAV_WORDS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:Skip to main content|Back to top|Main navigation|Site navigation)\b").unwrap());
static PAGINATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:Page \d+ of \d+|Previous page|Next page)\b").unwrap());

static SENTENCE_DETECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+[A-Z]").unwrap());

#[inline]
fn sum_match_lengths(text: &str, pattern: &Regex) -> usize {
    pattern.find_iter(text).map(|m| m.len()).sum()
}

fn calculate_ocr_penalty(text: &str, total_chars: f64) -> f64 {
    let artifact_chars = sum_match_lengths(text, &SCATTERED_CHARS_PATTERN)
        + sum_match_lengths(text, &REPEATED_PUNCT_PATTERN)
        + sum_match_lengths(text, &ISOLATED_PUNCT_PATTERN)
        + sum_match_lengths(text, &EXCESSIVE_WHITESPACE_PATTERN);

    (artifact_chars as f64 / total_chars).min(1.0)
}

fn calculate_script_penalty(text: &str, total_chars: f64) -> f64 {
    let script_chars = sum_match_lengths(text, &SCRIPT_TAG_PATTERN)
        + sum_match_lengths(text, &STYLE_TAG_PATTERN)
        + sum_match_lengths(text, &CSS_RULES_PATTERN);

    (script_chars as f64 / total_chars).min(1.0)
}

fn calculate_navigation_penalty(text: &str, total_chars: f64) -> f64 {
    let nav_chars = sum_match_lengths(text, &NAV_WORDS_PATTERN) + sum_match_lengths(text, &PAGINATION_PATTERN);
    (nav_chars as f64 / total_chars).min(1.0)
}

fn calculate_structure_bonus(text: &str) -> f64 {
    let sentences = SENTENCE_DETECT.find_iter(text).count();
    let words = text.split_whitespace().count();

    if words == 0 {
        return 0.0;
    }

    let mut bonus: f64 = 0.0;
    if sentences > 0 {
        let words_per_sentence = words as f64 / (sentences + 1) as f64;
        if (10.0..=30.0).contains(&words_per_sentence) {
            bonus += 0.5;
        }
    }
    if text.contains("\n\n") {
        bonus += 0.5;
    }

    bonus.min(1.0)
}

/// Quality score in [0.0, 1.0] for extracted text.
pub fn calculate_quality_score(text: &str, metadata: Option<&HashMap<String, String>>) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    if text.len() < MIN_TEXT_LENGTH {
        return 0.1;
    }

    let total_chars = text.len() as f64;
    let mut score = 1.0;

    score -= calculate_ocr_penalty(text, total_chars) * OCR_PENALTY_WEIGHT;
    score += calculate_structure_bonus(text) * STRUCTURE_BONUS_WEIGHT;

    if text.len() > LARGE_TEXT_LENGTH {
        score -= calculate_script_penalty(text, total_chars) * SCRIPT_PENALTY_WEIGHT;
        score -= calculate_navigation_penalty(text, total_chars) * NAV_PENALTY_WEIGHT;
    }

    if let Some(metadata) = metadata {
        if !metadata.is_empty() {
            score += METADATA_BONUS_WEIGHT;
        }
    }

    score.clamp(0.0, 1.0)
}

/// Remove leaked script/style blocks and OCR whitespace artifacts.
pub fn clean_extracted_text(text: &str) -> String {
    let mut cleaned: Cow<'_, str> = Cow::Borrowed(text);

    for pattern in [&*SCRIPT_TAG_PATTERN, &*STYLE_TAG_PATTERN] {
        if pattern.is_match(&cleaned) {
            cleaned = Cow::Owned(pattern.replace_all(&cleaned, "").into_owned());
        }
    }

    if EXCESSIVE_WHITESPACE_PATTERN.is_match(&cleaned) {
        cleaned = Cow::Owned(EXCESSIVE_WHITESPACE_PATTERN.replace_all(&cleaned, "  ").into_owned());
    }

    cleaned.trim().to_string()
}
