//! Built-in document extractors.
//!
//! All extractors implement the `DocumentExtractor` plugin trait and are
//! registered once, lazily, on the first extraction operation.

use crate::Result;
use crate::plugins::registry::get_document_extractor_registry;
use once_cell::sync::Lazy;
use std::sync::Arc;

#[cfg(feature = "archives")]
pub mod archive;
#[cfg(feature = "email")]
pub mod email;
#[cfg(feature = "excel")]
pub mod excel;
#[cfg(feature = "html")]
pub mod html;
#[cfg(feature = "ocr")]
pub mod image;
#[cfg(feature = "office")]
pub mod office;
#[cfg(feature = "pdf")]
pub mod pdf;
#[cfg(feature = "office")]
pub mod pptx;
pub mod text;
#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "archives")]
pub use archive::{TarExtractor, ZipExtractor};
#[cfg(feature = "email")]
pub use email::EmailExtractor;
#[cfg(feature = "excel")]
pub use excel::ExcelExtractor;
#[cfg(feature = "html")]
pub use html::HtmlExtractor;
#[cfg(feature = "ocr")]
pub use image::ImageExtractor;
#[cfg(feature = "office")]
pub use office::{DocxExtractor, LegacyOfficeExtractor};
#[cfg(feature = "pdf")]
pub use pdf::PdfExtractor;
#[cfg(feature = "office")]
pub use pptx::PptxExtractor;
pub use text::{MarkdownExtractor, PlainTextExtractor};
#[cfg(feature = "xml")]
pub use xml::XmlExtractor;

/// Lazy flag ensuring built-in registration happens exactly once.
static EXTRACTORS_INITIALIZED: Lazy<Result<()>> = Lazy::new(register_default_extractors);

/// Ensure built-in extractors are registered.
///
/// Called automatically on the first extraction operation; safe to call any
/// number of times.
pub fn ensure_initialized() -> Result<()> {
    EXTRACTORS_INITIALIZED
        .as_ref()
        .map(|_| ())
        .map_err(|e| crate::KreuzbergError::Plugin {
            message: format!("Failed to register default extractors: {e}"),
            plugin_name: "built-in-extractors".to_string(),
        })
}

/// Register all built-in extractors with the global registry.
pub fn register_default_extractors() -> Result<()> {
    let registry = get_document_extractor_registry();
    let mut registry = registry
        .write()
        .map_err(|e| crate::KreuzbergError::Other(format!("Extractor registry lock poisoned: {e}")))?;

    registry.register(Arc::new(PlainTextExtractor::new()))?;
    registry.register(Arc::new(MarkdownExtractor::new()))?;

    #[cfg(feature = "xml")]
    registry.register(Arc::new(XmlExtractor::new()))?;

    #[cfg(feature = "pdf")]
    registry.register(Arc::new(PdfExtractor::new()))?;

    #[cfg(feature = "excel")]
    registry.register(Arc::new(ExcelExtractor::new()))?;

    #[cfg(feature = "office")]
    {
        registry.register(Arc::new(PptxExtractor::new()))?;
        registry.register(Arc::new(DocxExtractor::new()))?;
        registry.register(Arc::new(LegacyOfficeExtractor::new()))?;
    }

    #[cfg(feature = "email")]
    registry.register(Arc::new(EmailExtractor::new()))?;

    #[cfg(feature = "html")]
    registry.register(Arc::new(HtmlExtractor::new()))?;

    #[cfg(feature = "ocr")]
    registry.register(Arc::new(ImageExtractor::new()))?;

    #[cfg(feature = "archives")]
    {
        registry.register(Arc::new(ZipExtractor::new()))?;
        registry.register(Arc::new(TarExtractor::new()))?;
    }

    // Built-in post-processors register alongside the extractors; a failure
    // here must not poison extraction itself.
    drop(registry);
    if let Err(e) = register_default_post_processors() {
        tracing::warn!(error = %e, "failed to register built-in post-processors");
    }

    Ok(())
}

/// Register built-in post-processors. Failures are logged by the caller and
/// never fail library initialization.
fn register_default_post_processors() -> Result<()> {
    #[cfg(feature = "keywords")]
    {
        let registry = crate::plugins::registry::get_post_processor_registry();
        let mut registry = registry
            .write()
            .map_err(|e| crate::KreuzbergError::Other(format!("Post-processor registry lock poisoned: {e}")))?;
        registry.register(Arc::new(crate::keywords::KeywordExtractor))?;
    }

    Ok(())
}
