use std::fmt;

#[derive(Debug, Clone)]
pub enum PdfError {
    InvalidPdf(String),
    PasswordRequired,
    InvalidPassword,
    PageNotFound(usize),
    TextExtractionFailed(String),
    RenderingFailed(String),
    MetadataExtractionFailed(String),
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::InvalidPdf(msg) => write!(f, "Invalid PDF: {msg}"),
            PdfError::PasswordRequired => write!(f, "PDF is password-protected"),
            PdfError::InvalidPassword => write!(f, "Invalid password provided"),
            PdfError::PageNotFound(page) => write!(f, "Page {page} not found"),
            PdfError::TextExtractionFailed(msg) => write!(f, "Text extraction failed: {msg}"),
            PdfError::RenderingFailed(msg) => write!(f, "Page rendering failed: {msg}"),
            PdfError::MetadataExtractionFailed(msg) => write!(f, "Metadata extraction failed: {msg}"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<PdfError> for crate::KreuzbergError {
    fn from(err: PdfError) -> Self {
        crate::KreuzbergError::parsing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(PdfError::PasswordRequired.to_string(), "PDF is password-protected");
        assert_eq!(PdfError::PageNotFound(3).to_string(), "Page 3 not found");
    }

    #[test]
    fn test_conversion_to_parsing_error() {
        let err: crate::KreuzbergError = PdfError::InvalidPdf("truncated".to_string()).into();
        assert!(matches!(err, crate::KreuzbergError::Parsing { .. }));
    }
}
