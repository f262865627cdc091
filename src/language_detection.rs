//! Language detection built on whatlang.

use crate::core::config::LanguageDetectionConfig;
use crate::error::Result;

/// Detect languages in text according to the configuration.
///
/// Returns ISO 639-3 codes. With `detect_multiple` the text is probed
/// paragraph by paragraph and every language clearing the confidence
/// threshold is reported, primary language first.
pub fn detect_languages(text: &str, config: &LanguageDetectionConfig) -> Result<Option<Vec<String>>> {
    if !config.enabled || text.trim().is_empty() {
        return Ok(None);
    }

    let primary = match whatlang::detect(text) {
        Some(info) if info.confidence() >= config.min_confidence => Some(info.lang()),
        _ => None,
    };

    if !config.detect_multiple {
        return Ok(primary.map(|lang| vec![lang.code().to_string()]));
    }

    let mut detected: Vec<String> = Vec::new();
    if let Some(lang) = primary {
        detected.push(lang.code().to_string());
    }

    for paragraph in text.split("\n\n") {
        if paragraph.split_whitespace().count() < 5 {
            continue;
        }
        if let Some(info) = whatlang::detect(paragraph) {
            if info.confidence() >= config.min_confidence {
                let code = info.lang().code().to_string();
                if !detected.contains(&code) {
                    detected.push(code);
                }
            }
        }
    }

    if detected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(detected))
    }
}
