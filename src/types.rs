use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// General extraction result used by the core extraction API.
///
/// This is the main result type returned by all extraction functions.
/// `mime_type` describes the output encoding (markdown for structured
/// formats, plain text for raw text), not the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: String,
    pub mime_type: String,
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableData>,

    /// Text chunks when chunking is enabled, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<String>,

    /// Images extracted from the document when image extraction is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ExtractedImage>,

    /// OCR results for extracted images, parallel to `images` where run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_ocr_results: Vec<ImageOcrResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_languages: Option<Vec<String>>,
}

impl ExtractionResult {
    /// Minimal result with empty metadata, used by extractors as a base.
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            metadata: Metadata::default(),
            tables: Vec::new(),
            chunks: Vec::new(),
            images: Vec::new(),
            image_ocr_results: Vec::new(),
            detected_languages: None,
        }
    }
}

/// Strongly-typed metadata for extraction results.
///
/// Format-specific blocks are absent rather than null when a format does not
/// apply. The flattened `additional` map carries open-ended fields written by
/// post-processors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel: Option<ExcelMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pptx: Option<PptxMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml: Option<XmlMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_preprocessing: Option<ImagePreprocessingMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMetadata>,

    /// Additional custom fields.
    ///
    /// Post-processors (keyword extraction, entity extraction, quality
    /// scoring, etc.) add arbitrary fields here. Entries are merged at the
    /// root level during serialization.
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub page_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

/// Excel/spreadsheet metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcelMetadata {
    pub sheet_count: usize,
    pub sheet_names: Vec<String>,
}

/// Email metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,

    pub to_emails: Vec<String>,
    pub cc_emails: Vec<String>,
    pub bcc_emails: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    pub attachments: Vec<String>,
}

/// PowerPoint presentation metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PptxMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub slide_count: usize,
    pub fonts: Vec<String>,
}

/// Archive (ZIP/TAR/7Z) metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub format: String,
    pub file_count: usize,
    pub file_list: Vec<String>,
    pub total_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<usize>,
}

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub exif: HashMap<String, String>,
}

/// XML metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlMetadata {
    pub element_count: usize,
    pub unique_elements: Vec<String>,
}

/// Text/Markdown metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetadata {
    pub line_count: usize,
    pub word_count: usize,
    pub character_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<(String, String)>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_blocks: Option<Vec<(String, String)>>,
}

/// HTML metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// OCR processing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrMetadata {
    pub language: String,
    pub psm: i32,
    pub output_format: String,
    pub table_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_cols: Option<usize>,
}

/// Image preprocessing report produced by DPI normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePreprocessingMetadata {
    pub original_dimensions: (u32, u32),
    pub original_dpi: (f64, f64),
    pub target_dpi: i32,
    pub scale_factor: f64,
    pub auto_adjusted: bool,
    pub final_dpi: i32,
    pub new_dimensions: Option<(u32, u32)>,
    pub resample_method: String,
    pub dimension_clamped: bool,
    pub skipped_resize: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_error: Option<String>,
}

/// Error metadata (for batch operations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_type: String,
    pub message: String,
}

/// A table recovered from a document page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// PNG-encoded crop of the table region, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cropped_image: Option<Vec<u8>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub df: Option<TableDataFrame>,

    /// 1-indexed page number.
    pub page_number: usize,

    /// Markdown rendering of the table.
    pub text: String,
}

/// Simple named-column frame holding recovered table cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDataFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableDataFrame {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// True when at least one cell carries non-whitespace content.
    pub fn has_content(&self) -> bool {
        self.rows.iter().flatten().any(|cell| !cell.trim().is_empty())
    }

    pub fn to_markdown(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(format!("| {} |", self.columns.join(" | ")));
        lines.push(format!(
            "| {} |",
            self.columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
        ));
        for row in &self.rows {
            lines.push(format!("| {} |", row.join(" | ")));
        }
        lines.join("\n")
    }
}

/// An image extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub data: Vec<u8>,
    pub format: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OCR output for a single extracted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOcrResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

/// Chunk produced by the chunking subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub char_start: usize,
    pub char_end: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcelWorkbook {
    pub sheets: Vec<ExcelSheet>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcelSheet {
    pub name: String,
    pub markdown: String,
    pub row_count: usize,
    pub col_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlExtractionResult {
    pub content: String,
    pub element_count: usize,
    pub unique_elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextExtractionResult {
    pub content: String,
    pub line_count: usize,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<(String, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_blocks: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailExtractionResult {
    pub subject: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub to_emails: Vec<String>,
    pub cc_emails: Vec<String>,
    pub bcc_emails: Vec<String>,
    pub date: Option<String>,
    pub message_id: Option<String>,
    pub plain_text: Option<String>,
    pub html_content: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<usize>,
    pub is_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PptxExtractionResult {
    pub content: String,
    pub metadata: PptxMetadata,
    pub slide_count: usize,
    pub images: Vec<ExtractedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibreOfficeConversionResult {
    pub converted_bytes: Vec<u8>,
    pub original_format: String,
    pub target_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_mb: f64,
    pub available_space_mb: f64,
    pub oldest_file_age_days: f64,
    pub newest_file_age_days: f64,
}
