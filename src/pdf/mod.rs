pub mod error;
pub mod metadata;
pub mod rendering;
pub mod text;

pub use error::PdfError;
pub use metadata::{extract_metadata, extract_metadata_with_password, extract_metadata_with_passwords};
pub use rendering::{PageRenderOptions, PdfRenderer, calculate_optimal_dpi};
pub use text::PdfTextExtractor;
