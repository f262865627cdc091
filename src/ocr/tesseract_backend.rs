//! Built-in OCR backend driving the tesseract CLI.
//!
//! The tesseract process wrapper is an external collaborator: this backend
//! shells out to `tesseract` with the configured language, PSM, and output
//! format, and reconstructs tables from TSV output when table detection is
//! enabled.

use crate::core::config::OcrConfig;
use crate::error::{KreuzbergError, Result};
use crate::plugins::{OcrBackend, Plugin};
use crate::types::{ExtractionResult, Metadata, OcrMetadata, TableData, TableDataFrame};
use crate::utils::TempFileGuard;
use once_cell::sync::OnceCell;
use std::process::Command;

const DEFAULT_TABLE_MIN_CONFIDENCE: f64 = 30.0;
const DEFAULT_TABLE_COLUMN_THRESHOLD: i32 = 50;
const DEFAULT_TABLE_ROW_THRESHOLD_RATIO: f64 = 0.5;

pub struct TesseractBackend {
    available_languages: OnceCell<Vec<String>>,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self {
            available_languages: OnceCell::new(),
        }
    }

    fn run_tesseract(&self, input_path: &std::path::Path, config: &OcrConfig, format_arg: Option<&str>) -> Result<String> {
        let mut command = Command::new("tesseract");
        command
            .arg(input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&config.language)
            .arg("--psm")
            .arg(config.psm.to_string());

        if let Some(format) = format_arg {
            command.arg(format);
        }

        let output = command
            .output()
            .map_err(|e| KreuzbergError::ocr(format!("Failed to execute tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KreuzbergError::ocr(format!(
                "tesseract exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ))
            .with_context("language", serde_json::json!(config.language))
            .with_context("psm", serde_json::json!(config.psm)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn languages(&self) -> &[String] {
        self.available_languages
            .get_or_init(|| {
                let output = Command::new("tesseract").arg("--list-langs").output();
                match output {
                    Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                        .lines()
                        .skip(1)
                        .map(|line| line.trim().to_string())
                        .filter(|line| !line.is_empty())
                        .collect(),
                    _ => Vec::new(),
                }
            })
            .as_slice()
    }

    fn extra_f64(config: &OcrConfig, key: &str, default: f64) -> f64 {
        config.extra.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    fn extra_bool(config: &OcrConfig, key: &str, default: bool) -> bool {
        config.extra.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn initialize(&self) -> Result<()> {
        let probe = Command::new("tesseract").arg("--version").output();
        match probe {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(KreuzbergError::missing_dependency(
                "Tesseract OCR is required for the built-in OCR backend. \
                 Install: macOS: 'brew install tesseract', Linux: 'apt install tesseract-ocr', \
                 Windows: 'winget install UB-Mannheim.TesseractOCR'",
            )
            .with_context("install_command", serde_json::json!("apt install tesseract-ocr"))),
        }
    }

    fn description(&self) -> &str {
        "OCR backend driving the tesseract CLI"
    }
}

#[async_trait::async_trait]
impl OcrBackend for TesseractBackend {
    fn process_image_sync(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
        let extension = match infer::get(image_bytes) {
            Some(kind) => kind.extension(),
            None => "png",
        };
        let input = TempFileGuard::create(extension, image_bytes)?;

        let enable_tables = Self::extra_bool(config, "enable_table_detection", true);

        let tsv_output = if enable_tables || config.output_format == "tsv" {
            Some(self.run_tesseract(input.path(), config, Some("tsv"))?)
        } else {
            None
        };

        let (raw_content, mime_type) = match config.output_format.as_str() {
            "text" => (self.run_tesseract(input.path(), config, None)?, "text/plain".to_string()),
            "markdown" => (
                self.run_tesseract(input.path(), config, None)?,
                "text/markdown".to_string(),
            ),
            "hocr" => (
                self.run_tesseract(input.path(), config, Some("hocr"))?,
                "text/html".to_string(),
            ),
            "tsv" => (
                tsv_output.clone().expect("TSV output fetched when output_format is tsv"),
                "text/plain".to_string(),
            ),
            other => {
                return Err(KreuzbergError::validation(format!(
                    "Unsupported OCR output format: {other}"
                )));
            }
        };

        let mut ocr_metadata = OcrMetadata {
            language: config.language.clone(),
            psm: config.psm,
            output_format: config.output_format.clone(),
            table_count: 0,
            table_rows: None,
            table_cols: None,
        };

        let mut tables = Vec::new();

        if enable_tables {
            if let Some(tsv) = &tsv_output {
                let min_confidence = Self::extra_f64(config, "table_min_confidence", DEFAULT_TABLE_MIN_CONFIDENCE);
                let column_threshold =
                    Self::extra_f64(config, "table_column_threshold", DEFAULT_TABLE_COLUMN_THRESHOLD as f64) as i32;
                let row_ratio =
                    Self::extra_f64(config, "table_row_threshold_ratio", DEFAULT_TABLE_ROW_THRESHOLD_RATIO);

                let words = super::table::extract_words_from_tsv(tsv, min_confidence)?;
                if !words.is_empty() {
                    let grid = super::table::reconstruct_table(&words, column_threshold, row_ratio);
                    // A single column is running text, not a table.
                    if !grid.is_empty() && grid[0].len() > 1 {
                        ocr_metadata.table_count = 1;
                        ocr_metadata.table_rows = Some(grid.len());
                        ocr_metadata.table_cols = Some(grid[0].len());

                        let markdown = super::table::table_to_markdown(&grid);
                        let columns = (0..grid[0].len()).map(|i| format!("Column_{i}")).collect();
                        tables.push(TableData {
                            cropped_image: None,
                            df: Some(TableDataFrame {
                                columns,
                                rows: grid,
                            }),
                            page_number: 1,
                            text: markdown,
                        });
                    }
                }
            }
        }

        let content = crate::text::strip_control_characters(&raw_content);

        Ok(ExtractionResult {
            content: content.trim_end().to_string(),
            mime_type,
            metadata: Metadata {
                ocr: Some(ocr_metadata),
                ..Default::default()
            },
            tables,
            chunks: Vec::new(),
            images: Vec::new(),
            image_ocr_results: Vec::new(),
            detected_languages: None,
        })
    }

    fn supports_language(&self, language: &str) -> bool {
        let languages = self.languages();
        if languages.is_empty() {
            // Probe failed; defer validation to the tesseract invocation.
            return true;
        }
        language.split('+').all(|lang| languages.iter().any(|l| l == lang))
    }
}
