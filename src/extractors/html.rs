//! HTML extractor.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractedImage, ExtractionResult};
use async_trait::async_trait;

pub struct HtmlExtractor;

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for HtmlExtractor {
    fn name(&self) -> &str {
        "html-extractor"
    }

    fn description(&self) -> &str {
        "Converts HTML to Markdown with metadata and inline image extraction"
    }
}

#[async_trait]
impl DocumentExtractor for HtmlExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let html = crate::text::safe_decode(content);

        let extract_images = config.images.as_ref().is_some_and(|images| images.extract_images);
        let max_image_bytes = config
            .images
            .as_ref()
            .map(|images| images.max_image_bytes as u64)
            .unwrap_or(10 * 1024 * 1024);

        let extraction = crate::extraction::html::process_html(
            &html,
            config.html_to_markdown.as_ref(),
            extract_images,
            max_image_bytes,
        )?;

        let (html_metadata, markdown) = crate::extraction::html::parse_html_metadata(&extraction.markdown);

        let mut result = ExtractionResult::new(markdown, "text/markdown");
        result.metadata.html = html_metadata;

        for warning in extraction.warnings {
            tracing::debug!(warning = %warning, "HTML conversion warning");
        }

        result.images = extraction
            .images
            .into_iter()
            .map(|image| ExtractedImage {
                data: image.data,
                format: image.format,
                filename: image.filename,
                page_number: None,
                dimensions: image.dimensions,
                description: image.description,
            })
            .collect();

        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/html"]
    }
}
