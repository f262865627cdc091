//! PDF text-layer extraction via pdfium.

use super::error::{PdfError, Result};
use pdfium_render::prelude::*;

pub struct PdfTextExtractor {
    pdfium: Pdfium,
}

impl PdfTextExtractor {
    pub fn new() -> Result<Self> {
        let binding = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::TextExtractionFailed(format!("Failed to initialize Pdfium: {e}")))?;

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

    /// Per-page text layers as a lazy-collected sequence, empty string for
    /// pages with no extractable text.
    pub fn extract_pages(&self, pdf_bytes: &[u8], password: Option<&str>) -> Result<Vec<String>> {
        let document = self.load_document(pdf_bytes, password)?;

        let mut pages_content = Vec::with_capacity(document.pages().len() as usize);

        for page in document.pages().iter() {
            match page.text() {
                Ok(text) => pages_content.push(text.all()),
                // A broken page yields no text; the caller records a warning.
                Err(e) => {
                    tracing::warn!(error = %e, "page text extraction failed");
                    pages_content.push(String::new());
                }
            }
        }

        Ok(pages_content)
    }

    pub fn extract_text(&self, pdf_bytes: &[u8], password: Option<&str>) -> Result<String> {
        Ok(self.extract_pages(pdf_bytes, password)?.join("\n"))
    }

    /// Try each password in turn, then no password.
    pub fn extract_pages_with_passwords(&self, pdf_bytes: &[u8], passwords: &[&str]) -> Result<Vec<String>> {
        let mut last_error = None;

        for password in passwords {
            match self.extract_pages(pdf_bytes, Some(password)) {
                Ok(pages) => return Ok(pages),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        self.extract_pages(pdf_bytes, None)
    }

    pub fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize> {
        let document = self.load_document(pdf_bytes, None)?;
        Ok(document.pages().len() as usize)
    }
}
