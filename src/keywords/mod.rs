//! Keyword extraction post-processor (YAKE and RAKE backends).

use crate::core::config::{ExtractionConfig, KeywordExtractionConfig};
use crate::error::{KreuzbergError, Result};
use crate::plugins::{Plugin, PostProcessor, ProcessingStage};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A ranked keyword; scores normalize to 0.0-1.0, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub score: f64,
    pub algorithm: String,
}

/// Extract keywords with the configured algorithm.
pub fn extract_keywords(text: &str, config: &KeywordExtractionConfig) -> Result<Vec<Keyword>> {
    match config.algorithm.as_str() {
        #[cfg(feature = "keywords-yake")]
        "yake" => extract_keywords_yake(text, config),
        #[cfg(feature = "keywords-rake")]
        "rake" => extract_keywords_rake(text, config),
        other => Err(KreuzbergError::validation(format!(
            "Unknown keyword extraction algorithm: {other}"
        ))
        .with_context("algorithm", serde_json::json!(other))),
    }
}

/// YAKE weighs term frequency, position, capitalization, and co-occurrence.
/// Lower raw scores are better; normalized here so higher is better.
#[cfg(feature = "keywords-yake")]
pub fn extract_keywords_yake(text: &str, config: &KeywordExtractionConfig) -> Result<Vec<Keyword>> {
    use yake_rust::{Config as YakeConfig, StopWords, get_n_best};

    let yake_config = YakeConfig::default();
    let stopwords = StopWords::predefined(&config.language).unwrap_or_default();

    let results = get_n_best(config.count, text, &stopwords, &yake_config);

    let mut keywords: Vec<Keyword> = results
        .into_iter()
        .map(|item| {
            let normalized = if item.score > 0.0 {
                (1.0 / (1.0 + item.score)).clamp(0.0, 1.0)
            } else {
                1.0
            };
            Keyword {
                text: item.keyword,
                score: normalized,
                algorithm: "yake".to_string(),
            }
        })
        .collect();

    keywords.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(keywords)
}

/// RAKE delimits candidate phrases on stopwords and scores by word
/// frequency and degree.
#[cfg(feature = "keywords-rake")]
pub fn extract_keywords_rake(text: &str, config: &KeywordExtractionConfig) -> Result<Vec<Keyword>> {
    use rake::{Rake, StopWords};

    let words: std::collections::HashSet<String> = crate::stopwords::stopwords_for(&config.language)
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    let rake = Rake::new(StopWords::from(words));

    let results = rake.run(text);
    let max_score = results
        .iter()
        .map(|k| k.score)
        .fold(0.0f64, f64::max)
        .max(f64::EPSILON);

    let keywords = results
        .into_iter()
        .take(config.count)
        .map(|item| Keyword {
            text: item.keyword,
            score: (item.score / max_score).clamp(0.0, 1.0),
            algorithm: "rake".to_string(),
        })
        .collect();

    Ok(keywords)
}

/// Post-processor that stores extracted keywords in
/// `metadata.additional["keywords"]`. Runs in the Middle stage and only when
/// `config.keywords` is set.
#[derive(Debug, Clone, Copy)]
pub struct KeywordExtractor;

impl Plugin for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword-extraction"
    }

    fn description(&self) -> &str {
        "Extracts ranked keywords from document content"
    }
}

#[async_trait]
impl PostProcessor for KeywordExtractor {
    async fn process(&self, result: &mut ExtractionResult, config: &ExtractionConfig) -> Result<()> {
        let Some(keyword_config) = &config.keywords else {
            return Ok(());
        };

        // Too little content for meaningful statistics.
        if result.content.split_whitespace().count() < 10 {
            return Ok(());
        }

        let keywords = extract_keywords(&result.content, keyword_config)?;

        result
            .metadata
            .additional
            .insert("keywords".to_string(), serde_json::to_value(&keywords)?);

        Ok(())
    }

    fn processing_stage(&self) -> ProcessingStage {
        ProcessingStage::Middle
    }

    fn should_process(&self, _result: &ExtractionResult, config: &ExtractionConfig) -> bool {
        config.keywords.is_some()
    }
}
