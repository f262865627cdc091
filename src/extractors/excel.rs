//! Spreadsheet extractor built on calamine.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExcelMetadata, ExtractionResult, Metadata};
use async_trait::async_trait;
use std::path::Path;

/// Spreadsheet extractor.
///
/// Supports: .xlsx, .xlsm, .xlam, .xltm, .xls, .xla, .xlsb, .ods, .csv, .tsv
pub struct ExcelExtractor;

impl Default for ExcelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extension_for_mime(mime_type: &str) -> &'static str {
        match mime_type {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
            "application/vnd.ms-excel.sheet.macroEnabled.12" => ".xlsm",
            "application/vnd.ms-excel.addin.macroEnabled.12" => ".xlam",
            "application/vnd.ms-excel.template.macroEnabled.12" => ".xltm",
            "application/vnd.ms-excel" => ".xls",
            "application/vnd.ms-excel.sheet.binary.macroEnabled.12" => ".xlsb",
            "application/vnd.oasis.opendocument.spreadsheet" => ".ods",
            "text/csv" => ".csv",
            "text/tab-separated-values" => ".tsv",
            _ => ".xlsx",
        }
    }

    fn build_result(workbook: crate::types::ExcelWorkbook) -> ExtractionResult {
        let markdown = crate::extraction::excel::excel_to_markdown(&workbook);

        let sheet_names: Vec<String> = workbook.sheets.iter().map(|s| s.name.clone()).collect();

        let mut result = ExtractionResult::new(markdown, "text/markdown");
        result.metadata = Metadata {
            excel: Some(ExcelMetadata {
                sheet_count: workbook.sheets.len(),
                sheet_names,
            }),
            ..Default::default()
        };
        result
    }
}

impl Plugin for ExcelExtractor {
    fn name(&self) -> &str {
        "excel-extractor"
    }

    fn description(&self) -> &str {
        "Extracts spreadsheet content as per-sheet markdown tables"
    }
}

#[async_trait]
impl DocumentExtractor for ExcelExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let extension = Self::extension_for_mime(mime_type);
        let workbook = crate::extraction::excel::read_excel_bytes(content, extension)?;
        Ok(Self::build_result(workbook))
    }

    async fn extract_file(&self, path: &Path, mime_type: &str, _config: &ExtractionConfig) -> Result<ExtractionResult> {
        let workbook = match mime_type {
            "text/csv" | "text/tab-separated-values" => {
                let bytes = crate::core::io::read_file_async(path).await?;
                crate::extraction::excel::read_excel_bytes(&bytes, Self::extension_for_mime(mime_type))?
            }
            _ => crate::extraction::excel::read_excel_file(path)?,
        };
        Ok(Self::build_result(workbook))
    }

    fn supported_mime_types(&self) -> &[&str] {
        &[
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.ms-excel.sheet.macroEnabled.12",
            "application/vnd.ms-excel.addin.macroEnabled.12",
            "application/vnd.ms-excel.template.macroEnabled.12",
            "application/vnd.ms-excel",
            "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
            "application/vnd.oasis.opendocument.spreadsheet",
            "text/csv",
            "text/tab-separated-values",
        ]
    }
}
