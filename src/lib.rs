//! Kreuzberg - High-Performance Document Intelligence Library
//!
//! Kreuzberg is a Rust-first document extraction library with plugin
//! support. It converts PDFs, Office documents, emails, HTML, XML, images,
//! and spreadsheets into normalized text plus structured metadata.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kreuzberg::{ExtractionConfig, extract_file_sync};
//!
//! # fn main() -> kreuzberg::Result<()> {
//! let config = ExtractionConfig::default();
//! let result = extract_file_sync("document.pdf", None, &config)?;
//! println!("Extracted: {}", result.content);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core** (`core`): extraction orchestration, MIME detection, config
//!   loading, post-processing pipeline
//! - **Plugins** (`plugins`): extractor, OCR backend, post-processor, and
//!   validator registries
//! - **Extractors** (`extractors`): format-specific extraction
//! - **OCR** (`ocr`): DPI normalization and backend dispatch
//! - **Tables** (`tables`): vision table detection and structure recovery
//! - **Cache** (`cache`): content-addressed result caches with in-flight
//!   deduplication

pub mod cache;
#[cfg(feature = "chunking")]
pub mod chunking;
pub mod core;
pub mod error;
pub mod extraction;
pub mod extractors;
#[cfg(feature = "keywords")]
pub mod keywords;
#[cfg(feature = "language-detection")]
pub mod language_detection;
#[cfg(feature = "ocr")]
pub mod ocr;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod plugins;
pub mod stopwords;
#[cfg(feature = "tables")]
pub mod tables;
pub mod text;
pub mod types;
pub mod utils;

// Core exports
pub use crate::error::{ErrorContext, KreuzbergError, Result};
pub use crate::types::*;

// Main extraction API - async versions
pub use crate::core::extractor::{batch_extract_bytes, batch_extract_file, extract_bytes, extract_file};

// Main extraction API - sync versions
pub use crate::core::extractor::{
    batch_extract_bytes_sync,
    batch_extract_file_sync,
    extract_bytes_sync,
    extract_file_sync,
};

// Configuration
pub use crate::core::config::{
    ChunkingConfig,
    EntityExtractionConfig,
    ExtractionConfig,
    HtmlToMarkdownConfig,
    ImageExtractionConfig,
    KeywordExtractionConfig,
    LanguageDetectionConfig,
    OcrConfig,
    PdfConfig,
    PostProcessorConfig,
    TableExtractionConfig,
    TokenReductionConfig,
};

// MIME detection utilities
pub use crate::core::mime::{
    DOCX_MIME_TYPE,
    EXCEL_MIME_TYPE,
    HTML_MIME_TYPE,
    JSON_MIME_TYPE,
    MARKDOWN_MIME_TYPE,
    PDF_MIME_TYPE,
    PLAIN_TEXT_MIME_TYPE,
    POWER_POINT_MIME_TYPE,
    XML_MIME_TYPE,
    detect_mime_from_bytes,
    detect_mime_type,
    detect_or_validate,
    validate_mime_type,
};

// Cache management
pub use crate::cache::{clear_all_caches, generate_cache_key};

// OCR plugin surface
#[cfg(feature = "ocr")]
pub use crate::ocr::register_ocr_backend;

// Vision table plugin surface
#[cfg(feature = "tables")]
pub use crate::tables::{clear_table_caches, set_table_model_runtime};
