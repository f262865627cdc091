//! Table structure recovery and cell text synthesis.

use super::algorithm::extract_table_dataframe;
use super::runtime::get_table_model_runtime;
use crate::core::config::{OcrConfig, TableExtractionConfig};
use crate::error::Result;
use crate::plugins::OcrBackend;
use crate::types::TableDataFrame;
use image::DynamicImage;
use std::sync::Arc;

pub struct TableFormatter {
    config: TableExtractionConfig,
    cell_ocr: Option<Arc<dyn OcrBackend>>,
}

impl TableFormatter {
    pub fn new(config: TableExtractionConfig) -> Self {
        // Cell text comes from the tesseract backend when present; without
        // it the grid still materializes with empty cells and the OCR
        // fallback path takes over.
        let cell_ocr = {
            let backend = crate::ocr::TesseractBackend::new();
            match crate::plugins::Plugin::initialize(&backend) {
                Ok(()) => Some(Arc::new(backend) as Arc<dyn OcrBackend>),
                Err(e) => {
                    tracing::debug!(error = %e, "cell OCR unavailable for table formatting");
                    None
                }
            }
        };

        Self { config, cell_ocr }
    }

    /// Recover the cell grid for a cropped table region.
    pub fn format_table(&self, table_image: &DynamicImage) -> Result<TableDataFrame> {
        let runtime = get_table_model_runtime()?;
        let predictions = runtime.recognize_structure(
            table_image,
            &self.config.structure_model,
            self.config.model_cache_dir.as_deref(),
        )?;

        let df = extract_table_dataframe(table_image, &predictions, &self.config, |crop| {
            self.read_cell_text(crop)
        });

        Ok(df)
    }

    fn read_cell_text(&self, crop: &DynamicImage) -> String {
        let Some(backend) = &self.cell_ocr else {
            return String::new();
        };

        // Tiny crops carry no text worth a subprocess round-trip.
        if crop.width() < 10 || crop.height() < 10 {
            return String::new();
        }

        let mut buffer = Vec::new();
        if crop
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .is_err()
        {
            return String::new();
        }

        let config = OcrConfig {
            output_format: "text".to_string(),
            // Single text line within a cell.
            psm: 7,
            extra: [("enable_table_detection".to_string(), serde_json::json!(false))]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        match backend.process_image_sync(&buffer, &config) {
            Ok(result) => result.content,
            Err(e) => {
                tracing::debug!(error = %e, "cell OCR failed");
                String::new()
            }
        }
    }

    pub fn config(&self) -> &TableExtractionConfig {
        &self.config
    }
}

/// Reconstruct a grid directly from whole-region OCR output, used when the
/// structure model is skipped (`extract_from_ocr`) or yields no content.
pub fn build_dataframe_from_ocr(table_image: &DynamicImage) -> TableDataFrame {
    let backend = crate::ocr::TesseractBackend::new();
    if crate::plugins::Plugin::initialize(&backend).is_err() {
        return TableDataFrame::default();
    }

    let mut buffer = Vec::new();
    if table_image
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .is_err()
    {
        return TableDataFrame::default();
    }

    let config = OcrConfig {
        output_format: "tsv".to_string(),
        ..Default::default()
    };

    let Ok(result) = backend.process_image_sync(&buffer, &config) else {
        return TableDataFrame::default();
    };

    let Ok(words) = crate::ocr::table::extract_words_from_tsv(&result.content, 30.0) else {
        return TableDataFrame::default();
    };

    let grid = crate::ocr::table::reconstruct_table(&words, 50, 0.5);
    if grid.is_empty() {
        return TableDataFrame::default();
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    TableDataFrame {
        columns: (0..width).map(|i| format!("Column_{i}")).collect(),
        rows: grid,
    }
}
