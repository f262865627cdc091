//! OCR pipeline: DPI normalization, backend registry, caching, execution.

pub mod dpi;
pub mod processor;
pub mod table;
pub mod tesseract_backend;

pub use dpi::normalize_image_dpi;
pub use processor::{OcrProcessor, register_ocr_backend};
pub use tesseract_backend::TesseractBackend;
