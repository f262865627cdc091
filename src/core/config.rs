//! Configuration loading and management.
//!
//! Extraction configuration can be built programmatically, loaded from a
//! `kreuzberg.toml`, or from a `[tool.kreuzberg]` table in a
//! `pyproject.toml`-style file. Discovery walks from a starting directory
//! toward the filesystem root. Legacy v3 flat keys are detected and rejected
//! with a `Validation` error naming every offending key.

use crate::{KreuzbergError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Flat keys from the v3 configuration format. Their presence anywhere at
/// the top level of a config table is a hard error.
const V3_FIELDS: &[&str] = &[
    "ocr_backend",
    "chunk_content",
    "extract_tables",
    "extract_keywords",
    "extract_entities",
    "auto_detect_language",
    "keyword_count",
];

/// Main extraction configuration.
///
/// Immutable for the duration of a call; hashed into cache keys via
/// [`ExtractionConfig::cache_key_material`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Enable caching of extraction results.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Enable quality post-processing.
    #[serde(default = "default_true")]
    pub enable_quality_processing: bool,

    /// Force OCR even for searchable PDFs.
    #[serde(default)]
    pub force_ocr: bool,

    /// OCR configuration (None = OCR disabled).
    #[serde(default)]
    pub ocr: Option<OcrConfig>,

    /// Vision table extraction (None = disabled).
    #[serde(default)]
    pub tables: Option<TableExtractionConfig>,

    /// Text chunking configuration (None = chunking disabled).
    #[serde(default)]
    pub chunking: Option<ChunkingConfig>,

    /// Image extraction configuration (None = no image extraction).
    #[serde(default)]
    pub images: Option<ImageExtractionConfig>,

    /// Entity extraction configuration, forwarded to post-processors.
    #[serde(default)]
    pub entities: Option<EntityExtractionConfig>,

    /// Keyword extraction configuration.
    #[serde(default)]
    pub keywords: Option<KeywordExtractionConfig>,

    /// Language detection configuration.
    #[serde(default)]
    pub language_detection: Option<LanguageDetectionConfig>,

    /// Token reduction configuration.
    #[serde(default)]
    pub token_reduction: Option<TokenReductionConfig>,

    /// HTML to Markdown conversion options.
    #[serde(default)]
    pub html_to_markdown: Option<HtmlToMarkdownConfig>,

    /// Post-processor selection.
    #[serde(default)]
    pub post_processors: Option<PostProcessorConfig>,

    /// PDF-specific options.
    #[serde(default)]
    pub pdf_options: Option<PdfConfig>,

    /// Target DPI for rasterization.
    #[serde(default = "default_target_dpi")]
    pub target_dpi: i32,

    /// Minimum DPI threshold.
    #[serde(default = "default_min_dpi")]
    pub min_dpi: i32,

    /// Maximum DPI threshold.
    #[serde(default = "default_max_dpi")]
    pub max_dpi: i32,

    /// Maximum rendered dimension (width or height) in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_image_dimension: i32,

    /// Automatically adjust DPI to fit the dimension budget.
    #[serde(default = "default_true")]
    pub auto_adjust_dpi: bool,

    /// Override for the ML-model cache directory.
    #[serde(default)]
    pub model_cache_dir: Option<String>,
}

/// OCR configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// OCR backend name: tesseract, easyocr, paddleocr, or user-registered.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Language code(s), `+`-joined for multi-language (e.g. "eng+deu").
    #[serde(default = "default_eng")]
    pub language: String,

    /// Page segmentation mode forwarded to the backend.
    #[serde(default = "default_psm")]
    pub psm: i32,

    /// Output format: text, markdown, hocr, tsv.
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Backend-specific parameters, passed through untouched.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            language: default_eng(),
            psm: default_psm(),
            output_format: default_output_format(),
            extra: HashMap::new(),
        }
    }
}

/// Vision table extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExtractionConfig {
    #[serde(default = "default_detection_model")]
    pub detection_model: String,

    #[serde(default = "default_structure_model")]
    pub structure_model: String,

    /// Detection boxes below this confidence are dropped.
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,

    /// Structure predictions below this confidence are dropped; spanning
    /// cells use 1.2x this value.
    #[serde(default = "default_structure_threshold")]
    pub structure_threshold: f64,

    /// IoU threshold for non-maximum suppression.
    #[serde(default = "default_nms_threshold")]
    pub nms_iou_threshold: f64,

    /// Skip the structure model and reconstruct the grid from OCR output.
    #[serde(default)]
    pub extract_from_ocr: bool,

    #[serde(default)]
    pub model_cache_dir: Option<String>,
}

impl Default for TableExtractionConfig {
    fn default() -> Self {
        Self {
            detection_model: default_detection_model(),
            structure_model: default_structure_model(),
            detection_threshold: default_detection_threshold(),
            structure_threshold: default_structure_threshold(),
            nms_iou_threshold: default_nms_threshold(),
            extract_from_ocr: false,
            model_cache_dir: None,
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub max_chars: usize,

    /// Overlap between chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub max_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_size(),
            max_overlap: default_chunk_overlap(),
        }
    }
}

/// Image extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageExtractionConfig {
    #[serde(default = "default_true")]
    pub extract_images: bool,

    /// Per-image byte cap; larger images are skipped with a memory-limit
    /// note in metadata.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Run OCR over extracted images.
    #[serde(default)]
    pub ocr_extracted_images: bool,

    /// Images smaller than this (width, height) are skipped for OCR.
    #[serde(default = "default_min_dimensions")]
    pub ocr_min_dimensions: (u32, u32),
}

impl Default for ImageExtractionConfig {
    fn default() -> Self {
        Self {
            extract_images: true,
            max_image_bytes: default_max_image_bytes(),
            ocr_extracted_images: false,
            ocr_min_dimensions: default_min_dimensions(),
        }
    }
}

/// Entity extraction configuration, consumed by post-processor plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionConfig {
    #[serde(default)]
    pub entity_types: Vec<String>,

    #[serde(default)]
    pub custom_patterns: HashMap<String, String>,
}

/// Keyword extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordExtractionConfig {
    /// Extraction algorithm: yake or rake.
    #[serde(default = "default_keyword_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_keyword_count")]
    pub count: usize,

    #[serde(default = "default_lang_en")]
    pub language: String,
}

impl Default for KeywordExtractionConfig {
    fn default() -> Self {
        Self {
            algorithm: default_keyword_algorithm(),
            count: default_keyword_count(),
            language: default_lang_en(),
        }
    }
}

/// Language detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum confidence threshold (0.0-1.0).
    #[serde(default = "default_confidence")]
    pub min_confidence: f64,

    /// Detect multiple languages in the document.
    #[serde(default)]
    pub detect_multiple: bool,
}

impl Default for LanguageDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: default_confidence(),
            detect_multiple: false,
        }
    }
}

/// Token reduction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReductionConfig {
    /// Reduction mode: off, light, moderate, aggressive, maximum.
    #[serde(default = "default_reduction_mode")]
    pub mode: String,

    /// Keep markdown headings, lists, and tables intact.
    #[serde(default = "default_true")]
    pub preserve_markdown: bool,

    /// Keep fenced code blocks intact.
    #[serde(default = "default_true")]
    pub preserve_code: bool,

    /// Stopword language for the aggressive modes.
    #[serde(default = "default_lang_en")]
    pub language: String,
}

impl Default for TokenReductionConfig {
    fn default() -> Self {
        Self {
            mode: default_reduction_mode(),
            preserve_markdown: true,
            preserve_code: true,
            language: default_lang_en(),
        }
    }
}

/// HTML to Markdown conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlToMarkdownConfig {
    /// Heading style: atx or setext.
    #[serde(default = "default_heading_style")]
    pub heading_style: String,

    #[serde(default = "default_true")]
    pub include_images: bool,

    #[serde(default)]
    pub wrap_width: Option<usize>,
}

impl Default for HtmlToMarkdownConfig {
    fn default() -> Self {
        Self {
            heading_style: default_heading_style(),
            include_images: true,
            wrap_width: None,
        }
    }
}

/// Post-processor selection at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Only run processors with these names.
    #[serde(default)]
    pub allow_list: Option<Vec<String>>,

    /// Never run processors with these names.
    #[serde(default)]
    pub deny_list: Option<Vec<String>>,
}

impl Default for PostProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_list: None,
            deny_list: None,
        }
    }
}

impl PostProcessorConfig {
    pub fn permits(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(deny) = &self.deny_list {
            if deny.iter().any(|n| n == name) {
                return false;
            }
        }
        if let Some(allow) = &self.allow_list {
            return allow.iter().any(|n| n == name);
        }
        true
    }
}

/// PDF-specific configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default)]
    pub extract_images: bool,

    /// Passwords to try when opening encrypted PDFs.
    #[serde(default)]
    pub passwords: Option<Vec<String>>,

    #[serde(default = "default_true")]
    pub extract_metadata: bool,
}

// Default value helpers
fn default_true() -> bool {
    true
}
fn default_backend() -> String {
    "tesseract".to_string()
}
fn default_eng() -> String {
    "eng".to_string()
}
fn default_psm() -> i32 {
    3
}
fn default_output_format() -> String {
    "markdown".to_string()
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_target_dpi() -> i32 {
    300
}
fn default_max_dimension() -> i32 {
    4096
}
fn default_min_dpi() -> i32 {
    72
}
fn default_max_dpi() -> i32 {
    600
}
fn default_reduction_mode() -> String {
    "off".to_string()
}
fn default_confidence() -> f64 {
    0.8
}
fn default_detection_model() -> String {
    "microsoft/table-transformer-detection".to_string()
}
fn default_structure_model() -> String {
    "microsoft/table-transformer-structure-recognition".to_string()
}
fn default_detection_threshold() -> f64 {
    0.7
}
fn default_structure_threshold() -> f64 {
    0.5
}
fn default_nms_threshold() -> f64 {
    0.5
}
fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_min_dimensions() -> (u32, u32) {
    (50, 50)
}
fn default_keyword_algorithm() -> String {
    "yake".to_string()
}
fn default_keyword_count() -> usize {
    10
}
fn default_lang_en() -> String {
    "en".to_string()
}
fn default_heading_style() -> String {
    "atx".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            enable_quality_processing: true,
            force_ocr: false,
            ocr: None,
            tables: None,
            chunking: None,
            images: None,
            entities: None,
            keywords: None,
            language_detection: None,
            token_reduction: None,
            html_to_markdown: None,
            post_processors: None,
            pdf_options: None,
            target_dpi: default_target_dpi(),
            min_dpi: default_min_dpi(),
            max_dpi: default_max_dpi(),
            max_image_dimension: default_max_dimension(),
            auto_adjust_dpi: true,
            model_cache_dir: None,
        }
    }
}

const REDUCTION_MODES: &[&str] = &["off", "light", "moderate", "aggressive", "maximum"];

impl ExtractionConfig {
    /// Validate cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.min_dpi < 1 || self.target_dpi < 1 || self.max_dpi < 1 {
            return Err(KreuzbergError::validation("DPI values must be at least 1")
                .with_context("min_dpi", serde_json::json!(self.min_dpi))
                .with_context("target_dpi", serde_json::json!(self.target_dpi))
                .with_context("max_dpi", serde_json::json!(self.max_dpi)));
        }

        if !(self.min_dpi <= self.target_dpi && self.target_dpi <= self.max_dpi) {
            return Err(
                KreuzbergError::validation("DPI bounds must satisfy min_dpi <= target_dpi <= max_dpi")
                    .with_context("min_dpi", serde_json::json!(self.min_dpi))
                    .with_context("target_dpi", serde_json::json!(self.target_dpi))
                    .with_context("max_dpi", serde_json::json!(self.max_dpi)),
            );
        }

        if self.max_image_dimension < 1 {
            return Err(KreuzbergError::validation("max_image_dimension must be at least 1")
                .with_context("max_image_dimension", serde_json::json!(self.max_image_dimension)));
        }

        if let Some(chunking) = &self.chunking {
            if chunking.max_chars == 0 {
                return Err(KreuzbergError::validation("chunking.max_chars must be positive"));
            }
            if chunking.max_overlap >= chunking.max_chars {
                return Err(
                    KreuzbergError::validation("chunking.max_overlap must be smaller than max_chars")
                        .with_context("max_chars", serde_json::json!(chunking.max_chars))
                        .with_context("max_overlap", serde_json::json!(chunking.max_overlap)),
                );
            }
        }

        if let Some(ocr) = &self.ocr {
            if !(0..=13).contains(&ocr.psm) {
                return Err(KreuzbergError::validation("ocr.psm must be in 0..=13")
                    .with_context("psm", serde_json::json!(ocr.psm)));
            }
        }

        if let Some(reduction) = &self.token_reduction {
            if !REDUCTION_MODES.contains(&reduction.mode.as_str()) {
                return Err(KreuzbergError::validation(format!(
                    "Unknown token reduction mode: {}",
                    reduction.mode
                ))
                .with_context("mode", serde_json::json!(reduction.mode)));
            }
        }

        Ok(())
    }

    /// Stable serialized form for cache keying. Identical logical configs
    /// yield identical strings across processes.
    pub fn cache_key_material(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Load configuration from a `kreuzberg.toml` file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            KreuzbergError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        let value: toml::Value = content.parse().map_err(|e| {
            KreuzbergError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e))
        })?;

        Self::from_toml_value(&value)
    }

    /// Load configuration from the `[tool.kreuzberg]` table of a
    /// `pyproject.toml`-style file. Returns Ok(None) when the table is absent.
    pub fn from_pyproject_file(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            KreuzbergError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        let value: toml::Value = content.parse().map_err(|e| {
            KreuzbergError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e))
        })?;

        match value.get("tool").and_then(|t| t.get("kreuzberg")) {
            Some(table) => Ok(Some(Self::from_toml_value(table)?)),
            None => Ok(None),
        }
    }

    /// Build a configuration from a parsed TOML table, rejecting v3 keys.
    pub fn from_toml_value(value: &toml::Value) -> Result<Self> {
        if let Some(table) = value.as_table() {
            let v3_found: Vec<&str> = V3_FIELDS.iter().copied().filter(|f| table.contains_key(*f)).collect();

            if !v3_found.is_empty() {
                return Err(KreuzbergError::validation(format!(
                    "V3 configuration format detected. The flat keys {v3_found:?} were replaced by \
                     structured tables in v4; see the migration guide."
                ))
                .with_context("v3_fields_found", serde_json::json!(v3_found)));
            }
        }

        let config: ExtractionConfig = value
            .clone()
            .try_into()
            .map_err(|e| KreuzbergError::validation(format!("Invalid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Discover configuration starting from `start_dir`, walking toward the
    /// root. `kreuzberg.toml` wins over a `pyproject.toml` table in the same
    /// directory.
    pub fn discover_from(start_dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let mut current = start_dir.as_ref().to_path_buf();

        loop {
            let kreuzberg_toml = current.join("kreuzberg.toml");
            if kreuzberg_toml.is_file() {
                return Ok(Some(Self::from_toml_file(kreuzberg_toml)?));
            }

            let pyproject = current.join("pyproject.toml");
            if pyproject.is_file() {
                if let Some(config) = Self::from_pyproject_file(pyproject)? {
                    return Ok(Some(config));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Discover configuration from the current working directory.
    pub fn discover() -> Result<Option<Self>> {
        let cwd: PathBuf = std::env::current_dir().map_err(KreuzbergError::Io)?;
        Self::discover_from(cwd)
    }
}
