//! OCR backend plugin trait.

use crate::Result;
use crate::core::config::OcrConfig;
use crate::plugins::Plugin;
use crate::types::ExtractionResult;
use async_trait::async_trait;

/// Known built-in backends plus an opaque handle for user plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    Tesseract,
    EasyOcr,
    PaddleOcr,
    Custom(String),
}

impl OcrBackendType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "tesseract" => OcrBackendType::Tesseract,
            "easyocr" => OcrBackendType::EasyOcr,
            "paddleocr" => OcrBackendType::PaddleOcr,
            other => OcrBackendType::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::EasyOcr => "easyocr",
            OcrBackendType::PaddleOcr => "paddleocr",
            OcrBackendType::Custom(name) => name,
        }
    }
}

/// Trait for OCR backend plugins.
///
/// Backends may run out-of-process; the OCR pipeline owns the process
/// boundary and calls [`process_image_sync`](Self::process_image_sync) from
/// a blocking worker. The async form exists for backends that are natively
/// async (e.g. remote OCR services).
#[async_trait]
pub trait OcrBackend: Plugin {
    /// Run OCR over an encoded raster image (PNG/JPEG/TIFF bytes).
    fn process_image_sync(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult>;

    /// Async form; the default delegates to the sync implementation.
    async fn process_image(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
        self.process_image_sync(image_bytes, config)
    }

    /// Whether this backend supports a language code (e.g. "eng", "deu").
    fn supports_language(&self, language: &str) -> bool;
}
