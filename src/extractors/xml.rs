//! XML and SVG extractor.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::extraction::xml::parse_xml;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, Metadata, XmlMetadata};
use async_trait::async_trait;

/// XML extractor with lenient parsing: malformed input still yields the
/// recovered text nodes.
pub struct XmlExtractor;

impl XmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for XmlExtractor {
    fn name(&self) -> &str {
        "xml-extractor"
    }

    fn description(&self) -> &str {
        "Extracts text content from XML files with element metadata"
    }
}

#[async_trait]
impl DocumentExtractor for XmlExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let xml_result = parse_xml(content, false)?;

        let mut result = ExtractionResult::new(xml_result.content, mime_type);
        result.metadata = Metadata {
            xml: Some(XmlMetadata {
                element_count: xml_result.element_count,
                unique_elements: xml_result.unique_elements,
            }),
            ..Default::default()
        };
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/xml", "text/xml", "image/svg+xml"]
    }
}
