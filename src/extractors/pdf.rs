//! PDF extractor.
//!
//! Per-page text-layer extraction with OCR fallback: pages without
//! extractable text are rasterized at the DPI solver's choice and routed
//! through the OCR pipeline. With `force_ocr`, every page is rasterized and
//! the OCR output replaces the text layer. Table extraction runs through the
//! vision pipeline when configured.

use crate::Result;
use crate::core::config::ExtractionConfig;
#[cfg(feature = "ocr")]
use crate::core::config::OcrConfig;
#[cfg(feature = "ocr")]
use crate::pdf::{PageRenderOptions, PdfRenderer};
use crate::pdf::PdfTextExtractor;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;

pub struct PdfExtractor;

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    #[cfg(feature = "ocr")]
    async fn ocr_page(
        pdf_bytes: &[u8],
        page_index: usize,
        ocr_config: &OcrConfig,
        config: &ExtractionConfig,
        password: Option<&str>,
    ) -> Result<String> {
        let mut encoded = Vec::new();
        {
            let renderer = PdfRenderer::new()?;
            let options = PageRenderOptions::from_config(config);
            let page_image = renderer.render_page_to_image(pdf_bytes, page_index, &options, password)?;

            page_image
                .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
                .map_err(|e| crate::KreuzbergError::parsing(format!("Failed to encode page raster: {e}")))?;
        }

        let processor = crate::ocr::OcrProcessor::new();
        let ocr_result = processor.process_image(&encoded, ocr_config, config).await?;
        Ok(ocr_result.content)
    }
}

impl Plugin for PdfExtractor {
    fn name(&self) -> &str {
        "pdf-extractor"
    }

    fn description(&self) -> &str {
        "Extracts text, metadata, and tables from PDF documents"
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let passwords: Vec<String> = config
            .pdf_options
            .as_ref()
            .and_then(|options| options.passwords.clone())
            .unwrap_or_default();
        let password_refs: Vec<&str> = passwords.iter().map(String::as_str).collect();
        let primary_password = password_refs.first().copied();

        let mut pages = {
            let text_extractor = PdfTextExtractor::new()?;
            text_extractor.extract_pages_with_passwords(content, &password_refs)?
        };

        let mut page_warnings: Vec<String> = Vec::new();

        // OCR pass: every page under force_ocr, otherwise only pages whose
        // text layer came back empty.
        let needs_ocr: Vec<usize> = if config.force_ocr {
            (0..pages.len()).collect()
        } else {
            pages
                .iter()
                .enumerate()
                .filter(|(_, text)| text.trim().is_empty())
                .map(|(index, _)| index)
                .collect()
        };

        if !needs_ocr.is_empty() {
            #[cfg(feature = "ocr")]
            {
                let ocr_config = config.ocr.clone().unwrap_or_default();

                for page_index in needs_ocr {
                    match Self::ocr_page(content, page_index, &ocr_config, config, primary_password).await {
                        Ok(ocr_text) => {
                            // Forced OCR replaces the text layer outright.
                            pages[page_index] = ocr_text;
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            tracing::warn!(page = page_index + 1, error = %e, "page OCR failed; continuing");
                            page_warnings.push(format!("page {}: {e}", page_index + 1));
                        }
                    }
                }
            }

            #[cfg(not(feature = "ocr"))]
            {
                let _ = primary_password;
                page_warnings.push(format!(
                    "{} page(s) need OCR but the ocr feature is not enabled",
                    needs_ocr.len()
                ));
            }
        }

        let mut result = ExtractionResult::new(pages.join("\n\n").trim().to_string(), "text/plain");

        let extract_metadata = config
            .pdf_options
            .as_ref()
            .map(|options| options.extract_metadata)
            .unwrap_or(true);

        if extract_metadata {
            match crate::pdf::extract_metadata_with_passwords(content, &password_refs) {
                Ok(pdf_metadata) => result.metadata.pdf = Some(pdf_metadata),
                Err(e) => {
                    tracing::warn!(error = %e, "PDF metadata extraction failed; continuing");
                    page_warnings.push(format!("metadata: {e}"));
                }
            }
        }

        #[cfg(feature = "tables")]
        if config.tables.is_some() {
            let table_bytes = content.to_vec();
            let table_config = config.clone();
            match tokio::task::spawn_blocking(move || {
                crate::tables::extract_tables_from_pdf(&table_bytes, &table_config)
            })
            .await
            {
                Ok(Ok(tables)) => result.tables = tables,
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => {
                    // Table extraction degrades gracefully; text extraction
                    // already succeeded.
                    tracing::warn!(error = %e, "table extraction failed; continuing");
                    result
                        .metadata
                        .additional
                        .insert("table_extraction_error".to_string(), serde_json::json!(e.to_string()));
                }
                Err(join_error) => {
                    return Err(crate::KreuzbergError::Other(format!(
                        "Table extraction task failed: {join_error}"
                    )));
                }
            }
        }

        if !page_warnings.is_empty() {
            result
                .metadata
                .additional
                .insert("page_warnings".to_string(), serde_json::json!(page_warnings));
        }

        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/pdf"]
    }
}
