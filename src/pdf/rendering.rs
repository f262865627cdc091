//! PDF page rasterization via pdfium.

use super::error::{PdfError, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};

const PDF_POINTS_PER_INCH: f64 = 72.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRenderOptions {
    pub target_dpi: i32,
    pub max_image_dimension: i32,
    pub auto_adjust_dpi: bool,
    pub min_dpi: i32,
    pub max_dpi: i32,
}

impl Default for PageRenderOptions {
    fn default() -> Self {
        Self {
            target_dpi: 300,
            max_image_dimension: 4096,
            auto_adjust_dpi: true,
            min_dpi: 72,
            max_dpi: 600,
        }
    }
}

impl PageRenderOptions {
    pub fn from_config(config: &crate::core::config::ExtractionConfig) -> Self {
        Self {
            target_dpi: config.target_dpi,
            max_image_dimension: config.max_image_dimension,
            auto_adjust_dpi: config.auto_adjust_dpi,
            min_dpi: config.min_dpi,
            max_dpi: config.max_dpi,
        }
    }
}

pub struct PdfRenderer {
    pdfium: Pdfium,
}

impl PdfRenderer {
    pub fn new() -> Result<Self> {
        // Downloaded library next to the binary wins; system library is the fallback.
        let binding = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::RenderingFailed(format!("Failed to initialize Pdfium: {e}")))?;

        Ok(Self {
            pdfium: Pdfium::new(binding),
        })
    }

    fn load_document<'a>(&'a self, pdf_bytes: &'a [u8], password: Option<&str>) -> Result<PdfDocument<'a>> {
        self.pdfium.load_pdf_from_byte_slice(pdf_bytes, password).map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("password") {
                if password.is_some() {
                    PdfError::InvalidPassword
                } else {
                    PdfError::PasswordRequired
                }
            } else {
                PdfError::InvalidPdf(message)
            }
        })
    }

    pub fn page_count(&self, pdf_bytes: &[u8], password: Option<&str>) -> Result<usize> {
        let document = self.load_document(pdf_bytes, password)?;
        Ok(document.pages().len() as usize)
    }

    /// (width, height) of a page in PDF points.
    pub fn page_dimensions(&self, pdf_bytes: &[u8], page_index: usize, password: Option<&str>) -> Result<(f64, f64)> {
        let document = self.load_document(pdf_bytes, password)?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|_| PdfError::PageNotFound(page_index))?;

        Ok((page.width().value as f64, page.height().value as f64))
    }

    /// Rasterize one page. The DPI solver bounds the output to the dimension
    /// budget; the clamp applies even with `auto_adjust_dpi` disabled.
    pub fn render_page_to_image(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        options: &PageRenderOptions,
        password: Option<&str>,
    ) -> Result<DynamicImage> {
        let document = self.load_document(pdf_bytes, password)?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|_| PdfError::PageNotFound(page_index))?;

        let width_points = page.width().value as f64;
        let height_points = page.height().value as f64;

        let dpi = calculate_optimal_dpi(
            width_points,
            height_points,
            options.target_dpi,
            options.max_image_dimension,
            options.min_dpi,
            options.max_dpi,
        );

        let scale = dpi as f64 / PDF_POINTS_PER_INCH;

        let config = PdfRenderConfig::new()
            .set_target_width(((width_points * scale) as i32).max(1))
            .set_target_height(((height_points * scale) as i32).max(1))
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::RenderingFailed(format!("Failed to render page: {e}")))?;

        Ok(DynamicImage::ImageRgb8(bitmap.as_image().into_rgb8()))
    }
}

/// DPI that keeps `max(width, height)` within the dimension budget, clamped
/// into `[min_dpi, max_dpi]`.
pub fn calculate_optimal_dpi(
    page_width: f64,
    page_height: f64,
    target_dpi: i32,
    max_dimension: i32,
    min_dpi: i32,
    max_dpi: i32,
) -> i32 {
    let width_inches = page_width / PDF_POINTS_PER_INCH;
    let height_inches = page_height / PDF_POINTS_PER_INCH;

    if width_inches <= 0.0 || height_inches <= 0.0 {
        return target_dpi.clamp(min_dpi, max_dpi);
    }

    let width_at_target = (width_inches * target_dpi as f64) as i32;
    let height_at_target = (height_inches * target_dpi as f64) as i32;

    if width_at_target <= max_dimension && height_at_target <= max_dimension {
        return target_dpi.clamp(min_dpi, max_dpi);
    }

    let width_limited_dpi = (max_dimension as f64 / width_inches) as i32;
    let height_limited_dpi = (max_dimension as f64 / height_inches) as i32;

    width_limited_dpi.min(height_limited_dpi).clamp(min_dpi, max_dpi)
}
