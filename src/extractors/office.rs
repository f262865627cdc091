//! Word (DOCX) and legacy Office extractors.
//!
//! Legacy `.doc`/`.ppt` inputs are transcoded through headless LibreOffice
//! into their OOXML equivalents and delegated to the modern extractors.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::core::mime::{DOCX_MIME_TYPE, POWER_POINT_MIME_TYPE};
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;

/// DOCX extractor.
pub struct DocxExtractor;

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for DocxExtractor {
    fn name(&self) -> &str {
        "docx-extractor"
    }

    fn description(&self) -> &str {
        "Extracts text, headings, lists, and tables from Word documents"
    }
}

#[async_trait]
impl DocumentExtractor for DocxExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let extract_images = config.images.as_ref().is_some_and(|images| images.extract_images);

        let docx = crate::extraction::docx::extract_docx_from_bytes(content, extract_images)?;

        let mut result = ExtractionResult::new(docx.content, "text/markdown");
        result.metadata = docx.metadata;
        result.images = docx.images;

        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
    }
}

/// Legacy Office extractor: transcode then delegate.
pub struct LegacyOfficeExtractor;

impl Default for LegacyOfficeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyOfficeExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for LegacyOfficeExtractor {
    fn name(&self) -> &str {
        "legacy-office-extractor"
    }

    fn description(&self) -> &str {
        "Converts legacy .doc/.ppt via LibreOffice and delegates to the OOXML extractors"
    }
}

#[async_trait]
impl DocumentExtractor for LegacyOfficeExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        match mime_type {
            "application/msword" => {
                let converted = crate::extraction::libreoffice::convert_doc_to_docx(content).await?;
                DocxExtractor::new()
                    .extract_bytes(&converted.converted_bytes, DOCX_MIME_TYPE, config)
                    .await
            }
            "application/vnd.ms-powerpoint" => {
                let converted = crate::extraction::libreoffice::convert_ppt_to_pptx(content).await?;
                super::pptx::PptxExtractor::new()
                    .extract_bytes(&converted.converted_bytes, POWER_POINT_MIME_TYPE, config)
                    .await
            }
            other => Err(crate::KreuzbergError::validation(format!(
                "Not a legacy Office MIME type: {other}"
            ))),
        }
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/msword", "application/vnd.ms-powerpoint"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_interfaces() {
        let docx = DocxExtractor::new();
        assert_eq!(docx.name(), "docx-extractor");
        assert_eq!(
            docx.supported_mime_types(),
            &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
        );

        let legacy = LegacyOfficeExtractor::new();
        assert_eq!(legacy.name(), "legacy-office-extractor");
        assert_eq!(
            legacy.supported_mime_types(),
            &["application/msword", "application/vnd.ms-powerpoint"]
        );
    }

    #[tokio::test]
    async fn test_legacy_rejects_wrong_mime() {
        let extractor = LegacyOfficeExtractor::new();
        let config = ExtractionConfig::default();

        let result = extractor.extract_bytes(b"x", "text/plain", &config).await;
        assert!(matches!(result, Err(crate::KreuzbergError::Validation { .. })));
    }
}
