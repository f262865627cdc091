//! PowerPoint (PPTX) extractor.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, Metadata};
use async_trait::async_trait;

pub struct PptxExtractor;

impl Default for PptxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PptxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PptxExtractor {
    fn name(&self) -> &str {
        "pptx-extractor"
    }

    fn description(&self) -> &str {
        "Extracts slides, notes, tables, and images from PPTX presentations"
    }
}

#[async_trait]
impl DocumentExtractor for PptxExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let extract_images = config.images.as_ref().is_some_and(|images| images.extract_images);

        let pptx = crate::extraction::pptx::extract_pptx_from_bytes(content, extract_images)?;

        let mut result = ExtractionResult::new(pptx.content, "text/markdown");
        result.metadata = Metadata {
            pptx: Some(pptx.metadata),
            ..Default::default()
        };
        result.images = pptx.images;

        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/vnd.openxmlformats-officedocument.presentationml.presentation"]
    }
}
