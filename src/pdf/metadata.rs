//! PDF metadata extraction via lopdf.

use super::error::{PdfError, Result};
use crate::types::PdfMetadata;
use lopdf::{Document, Object};

pub fn extract_metadata(pdf_bytes: &[u8]) -> Result<PdfMetadata> {
    extract_metadata_with_password(pdf_bytes, None)
}

pub fn extract_metadata_with_password(pdf_bytes: &[u8], password: Option<&str>) -> Result<PdfMetadata> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| PdfError::MetadataExtractionFailed(format!("Failed to load PDF: {e}")))?;

    if doc.is_encrypted() {
        if let Some(pwd) = password {
            doc.decrypt(pwd).map_err(|_| PdfError::InvalidPassword)?;
        } else {
            return Err(PdfError::PasswordRequired);
        }
    }

    let mut metadata = PdfMetadata {
        page_count: doc.get_pages().len(),
        ..Default::default()
    };

    if let Ok(info_ref) = doc.trailer.get(b"Info").and_then(Object::as_reference) {
        if let Ok(info_dict) = doc.get_dictionary(info_ref) {
            extract_info_dictionary(info_dict, &mut metadata);
        }
    }

    Ok(metadata)
}

pub fn extract_metadata_with_passwords(pdf_bytes: &[u8], passwords: &[&str]) -> Result<PdfMetadata> {
    let mut last_error = None;

    for password in passwords {
        match extract_metadata_with_password(pdf_bytes, Some(password)) {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    if let Some(err) = last_error {
        return Err(err);
    }

    extract_metadata(pdf_bytes)
}

fn info_string(info_dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let object = info_dict.get(key).ok()?;
    decode_text_object(object).filter(|s| !s.trim().is_empty())
}

/// PDF Info strings are PDFDocEncoding or UTF-16BE with a BOM.
fn decode_text_object(object: &Object) -> Option<String> {
    let bytes = match object {
        Object::String(bytes, _) => bytes,
        _ => return None,
    };

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&utf16).ok();
    }

    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn extract_info_dictionary(info_dict: &lopdf::Dictionary, metadata: &mut PdfMetadata) {
    metadata.title = info_string(info_dict, b"Title");
    metadata.author = info_string(info_dict, b"Author");
    metadata.subject = info_string(info_dict, b"Subject");
    metadata.keywords = info_string(info_dict, b"Keywords");
    metadata.creator = info_string(info_dict, b"Creator");
    metadata.producer = info_string(info_dict, b"Producer");
    metadata.creation_date = info_string(info_dict, b"CreationDate");
    metadata.modification_date = info_string(info_dict, b"ModDate");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf_with_info() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(lopdf::dictionary! {
            "Title" => Object::string_literal("Test Document"),
            "Author" => Object::string_literal("Unit Test"),
            "Producer" => Object::string_literal("lopdf"),
        });

        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_extract_info_fields() {
        let pdf = minimal_pdf_with_info();
        let metadata = extract_metadata(&pdf).unwrap();

        assert_eq!(metadata.page_count, 1);
        assert_eq!(metadata.title.as_deref(), Some("Test Document"));
        assert_eq!(metadata.author.as_deref(), Some("Unit Test"));
        assert_eq!(metadata.producer.as_deref(), Some("lopdf"));
        assert!(metadata.subject.is_none());
    }

    #[test]
    fn test_invalid_pdf() {
        let result = extract_metadata(b"not a pdf at all");
        assert!(matches!(result, Err(PdfError::MetadataExtractionFailed(_))));
    }

    #[test]
    fn test_utf16_decoding() {
        // UTF-16BE with BOM spelling "Hi"
        let object = Object::String(vec![0xFE, 0xFF, 0x00, b'H', 0x00, b'i'], lopdf::StringFormat::Literal);
        assert_eq!(decode_text_object(&object).as_deref(), Some("Hi"));
    }

    #[test]
    fn test_passwords_fallback() {
        let pdf = minimal_pdf_with_info();
        let metadata = extract_metadata_with_passwords(&pdf, &[]).unwrap();
        assert_eq!(metadata.page_count, 1);
    }
}
