//! Raster image extractor.
//!
//! Reads dimensions, format, and EXIF metadata; content comes from the OCR
//! pipeline when OCR is configured, otherwise the result carries metadata
//! only.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, ImageMetadata};
use async_trait::async_trait;
use std::collections::HashMap;

pub struct ImageExtractor;

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read_exif(content: &[u8]) -> HashMap<String, String> {
        let mut fields = HashMap::new();

        let exif_reader = exif::Reader::new();
        let mut cursor = std::io::Cursor::new(content);
        if let Ok(exif) = exif_reader.read_from_container(&mut cursor) {
            for field in exif.fields() {
                fields.insert(
                    field.tag.to_string(),
                    field.display_value().with_unit(&exif).to_string(),
                );
            }
        }

        fields
    }

    fn image_metadata(content: &[u8]) -> Result<ImageMetadata> {
        let image = image::load_from_memory(content)
            .map_err(|e| crate::KreuzbergError::parsing(format!("Failed to decode image: {e}")))?;

        let format = match infer::get(content) {
            Some(kind) => kind.extension().to_string(),
            None => "unknown".to_string(),
        };

        Ok(ImageMetadata {
            width: image.width(),
            height: image.height(),
            format,
            exif: Self::read_exif(content),
        })
    }
}

impl Plugin for ImageExtractor {
    fn name(&self) -> &str {
        "image-extractor"
    }

    fn description(&self) -> &str {
        "Extracts image metadata and OCR text from raster images"
    }
}

#[async_trait]
impl DocumentExtractor for ImageExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let image_metadata = Self::image_metadata(content)?;

        let mut result = if let Some(ocr_config) = &config.ocr {
            let processor = crate::ocr::OcrProcessor::new();
            processor.process_image(content, ocr_config, config).await?
        } else {
            ExtractionResult::new(String::new(), "text/plain")
        };

        result.metadata.image = Some(image_metadata);
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &[
            "image/bmp",
            "image/x-bmp",
            "image/x-ms-bmp",
            "image/gif",
            "image/jpeg",
            "image/pjpeg",
            "image/png",
            "image/tiff",
            "image/x-tiff",
            "image/webp",
        ]
    }
}
