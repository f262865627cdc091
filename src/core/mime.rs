//! MIME type detection and validation.
//!
//! Maps (path, bytes, hint) to a canonical MIME type. Detection by extension
//! for paths, magic-number sniffing for byte buffers, and validation of
//! caller-supplied hints against the supported set. All functions here are
//! pure; memoization of buffer inferences happens in the cache layer.

use crate::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const HTML_MIME_TYPE: &str = "text/html";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const POWER_POINT_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const DOCX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const LEGACY_WORD_MIME_TYPE: &str = "application/msword";
pub const LEGACY_POWERPOINT_MIME_TYPE: &str = "application/vnd.ms-powerpoint";

pub const EML_MIME_TYPE: &str = "message/rfc822";
pub const MSG_MIME_TYPE: &str = "application/vnd.ms-outlook";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const XML_MIME_TYPE: &str = "application/xml";
pub const XML_TEXT_MIME_TYPE: &str = "text/xml";
pub const SVG_MIME_TYPE: &str = "image/svg+xml";

pub const EXCEL_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const EXCEL_BINARY_MIME_TYPE: &str = "application/vnd.ms-excel";
pub const EXCEL_MACRO_MIME_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";
pub const EXCEL_BINARY_2007_MIME_TYPE: &str = "application/vnd.ms-excel.sheet.binary.macroEnabled.12";
pub const EXCEL_ADDON_MIME_TYPE: &str = "application/vnd.ms-excel.addin.macroEnabled.12";
pub const EXCEL_TEMPLATE_MIME_TYPE: &str = "application/vnd.ms-excel.template.macroEnabled.12";
pub const OPENDOC_SPREADSHEET_MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// Extension to MIME type mapping.
static EXT_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("txt", PLAIN_TEXT_MIME_TYPE);
    m.insert("text", PLAIN_TEXT_MIME_TYPE);
    m.insert("md", MARKDOWN_MIME_TYPE);
    m.insert("markdown", MARKDOWN_MIME_TYPE);

    m.insert("pdf", PDF_MIME_TYPE);

    m.insert("html", HTML_MIME_TYPE);
    m.insert("htm", HTML_MIME_TYPE);

    m.insert("xlsx", EXCEL_MIME_TYPE);
    m.insert("xls", EXCEL_BINARY_MIME_TYPE);
    m.insert("xlsm", EXCEL_MACRO_MIME_TYPE);
    m.insert("xlsb", EXCEL_BINARY_2007_MIME_TYPE);
    m.insert("xlam", EXCEL_ADDON_MIME_TYPE);
    m.insert("xla", EXCEL_TEMPLATE_MIME_TYPE);
    m.insert("ods", OPENDOC_SPREADSHEET_MIME_TYPE);
    m.insert("csv", "text/csv");
    m.insert("tsv", "text/tab-separated-values");

    m.insert("pptx", POWER_POINT_MIME_TYPE);
    m.insert("ppt", LEGACY_POWERPOINT_MIME_TYPE);
    m.insert("docx", DOCX_MIME_TYPE);
    m.insert("doc", LEGACY_WORD_MIME_TYPE);

    m.insert("bmp", "image/bmp");
    m.insert("gif", "image/gif");
    m.insert("jpg", "image/jpeg");
    m.insert("jpeg", "image/jpeg");
    m.insert("png", "image/png");
    m.insert("tiff", "image/tiff");
    m.insert("tif", "image/tiff");
    m.insert("webp", "image/webp");
    m.insert("pnm", "image/x-portable-anymap");
    m.insert("pbm", "image/x-portable-bitmap");
    m.insert("pgm", "image/x-portable-graymap");
    m.insert("ppm", "image/x-portable-pixmap");

    m.insert("json", JSON_MIME_TYPE);
    m.insert("xml", XML_MIME_TYPE);
    m.insert("svg", SVG_MIME_TYPE);

    m.insert("eml", EML_MIME_TYPE);
    m.insert("msg", MSG_MIME_TYPE);

    m.insert("zip", "application/zip");
    m.insert("tar", "application/x-tar");
    m.insert("tgz", "application/x-tar");
    m.insert("7z", "application/x-7z-compressed");

    m
});

/// All MIME types the built-in extractors accept.
static SUPPORTED_MIME_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();

    set.insert(PLAIN_TEXT_MIME_TYPE);
    set.insert(MARKDOWN_MIME_TYPE);
    set.insert("text/x-markdown");

    set.insert("image/bmp");
    set.insert("image/gif");
    set.insert("image/jpeg");
    set.insert("image/pjpeg");
    set.insert("image/png");
    set.insert("image/tiff");
    set.insert("image/x-tiff");
    set.insert("image/webp");
    set.insert("image/x-bmp");
    set.insert("image/x-ms-bmp");
    set.insert("image/x-portable-anymap");
    set.insert("image/x-portable-bitmap");
    set.insert("image/x-portable-graymap");
    set.insert("image/x-portable-pixmap");

    set.insert(PDF_MIME_TYPE);

    set.insert(EXCEL_MIME_TYPE);
    set.insert(EXCEL_BINARY_MIME_TYPE);
    set.insert(EXCEL_MACRO_MIME_TYPE);
    set.insert(EXCEL_BINARY_2007_MIME_TYPE);
    set.insert(EXCEL_ADDON_MIME_TYPE);
    set.insert(EXCEL_TEMPLATE_MIME_TYPE);
    set.insert(OPENDOC_SPREADSHEET_MIME_TYPE);
    set.insert("text/csv");
    set.insert("text/tab-separated-values");

    set.insert(POWER_POINT_MIME_TYPE);
    set.insert(DOCX_MIME_TYPE);
    set.insert(LEGACY_WORD_MIME_TYPE);
    set.insert(LEGACY_POWERPOINT_MIME_TYPE);

    set.insert(HTML_MIME_TYPE);
    set.insert(EML_MIME_TYPE);
    set.insert(MSG_MIME_TYPE);
    set.insert(JSON_MIME_TYPE);
    set.insert(XML_MIME_TYPE);
    set.insert(XML_TEXT_MIME_TYPE);
    set.insert(SVG_MIME_TYPE);

    set.insert("application/zip");
    set.insert("application/x-zip-compressed");
    set.insert("application/x-tar");
    set.insert("application/tar");
    set.insert("application/x-gtar");
    set.insert("application/x-7z-compressed");

    set
});

/// Detect MIME type from a file path by extension.
///
/// Falls back to the `mime_guess` database when the extension is not in the
/// built-in table.
///
/// # Errors
///
/// Returns `KreuzbergError::Validation` if the file does not exist (when
/// `check_exists` is set) or the type cannot be determined.
pub fn detect_mime_type(path: impl AsRef<Path>, check_exists: bool) -> Result<String> {
    let path = path.as_ref();

    if check_exists && !path.exists() {
        return Err(KreuzbergError::validation(format!(
            "File does not exist: {}",
            path.display()
        )));
    }

    let extension = path.extension().and_then(|ext| ext.to_str()).map(|s| s.to_lowercase());

    if let Some(ext) = &extension {
        if let Some(mime_type) = EXT_TO_MIME.get(ext.as_str()) {
            return Ok((*mime_type).to_string());
        }
    }

    if let Some(guess) = mime_guess::from_path(path).first() {
        let mime = guess.to_string();
        if SUPPORTED_MIME_TYPES.contains(mime.as_str()) {
            return Ok(mime);
        }
    }

    Err(KreuzbergError::validation(format!(
        "Could not determine MIME type for: {}",
        path.display()
    ))
    .with_context("path", serde_json::json!(path.display().to_string())))
}

/// Detect MIME type from a byte buffer by magic-number sniffing.
///
/// Textual content that `infer` cannot classify falls back to a UTF-8
/// heuristic (plain text vs. markup).
pub fn detect_mime_from_bytes(content: &[u8]) -> Result<String> {
    if content.is_empty() {
        return Err(KreuzbergError::validation("Cannot detect MIME type of empty buffer"));
    }

    if let Some(kind) = infer::get(content) {
        let mime = kind.mime_type();
        // infer reports OOXML containers as plain zip; disambiguate by part names.
        if mime == "application/zip" {
            if let Some(ooxml) = sniff_ooxml(content) {
                return Ok(ooxml.to_string());
            }
        }
        return Ok(mime.to_string());
    }

    let head = &content[..content.len().min(4096)];
    if let Ok(text) = std::str::from_utf8(head) {
        let trimmed = text.trim_start();
        if trimmed.starts_with("<?xml") || trimmed.starts_with("<svg") {
            return Ok(XML_MIME_TYPE.to_string());
        }
        if trimmed.starts_with("<!DOCTYPE html") || trimmed.starts_with("<html") {
            return Ok(HTML_MIME_TYPE.to_string());
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Ok(JSON_MIME_TYPE.to_string());
        }
        return Ok(PLAIN_TEXT_MIME_TYPE.to_string());
    }

    Err(KreuzbergError::validation(
        "Could not determine MIME type from content".to_string(),
    ))
}

/// OOXML containers are ZIP files; the first local-file entries carry the
/// package part names in cleartext.
fn sniff_ooxml(content: &[u8]) -> Option<&'static str> {
    let window = &content[..content.len().min(8192)];
    let contains = |needle: &[u8]| window.windows(needle.len()).any(|w| w == needle);

    if contains(b"word/") {
        Some(DOCX_MIME_TYPE)
    } else if contains(b"ppt/") {
        Some(POWER_POINT_MIME_TYPE)
    } else if contains(b"xl/") {
        Some(EXCEL_MIME_TYPE)
    } else {
        None
    }
}

/// Validate a caller-supplied MIME type against the supported set.
///
/// Parameters after `;` are stripped before validation.
pub fn validate_mime_type(mime_type: &str) -> Result<String> {
    let canonical = mime_type.split(';').next().unwrap_or("").trim().to_lowercase();

    if canonical.is_empty() {
        return Err(KreuzbergError::validation("Empty MIME type"));
    }

    if SUPPORTED_MIME_TYPES.contains(canonical.as_str()) {
        return Ok(canonical);
    }

    Err(KreuzbergError::validation(format!("Unsupported MIME type: {mime_type}"))
        .with_context("mime_type", serde_json::json!(mime_type)))
}

/// Resolve the MIME type for an extraction request.
///
/// An explicit hint is validated; otherwise the path (when given) is
/// inspected by extension, and finally the buffer (when given) is sniffed.
pub fn detect_or_validate(path: Option<&Path>, content: Option<&[u8]>, hint: Option<&str>) -> Result<String> {
    if let Some(hint) = hint {
        return validate_mime_type(hint);
    }

    if let Some(path) = path {
        return detect_mime_type(path, false);
    }

    if let Some(content) = content {
        return detect_mime_from_bytes(content);
    }

    Err(KreuzbergError::validation(
        "MIME resolution requires a path, a buffer, or an explicit hint",
    ))
}

/// Whether the built-in extractor set supports a MIME type.
pub fn is_supported(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(mime_type)
}

/// All supported MIME types, for diagnostics.
pub fn supported_mime_types() -> Vec<&'static str> {
    SUPPORTED_MIME_TYPES.iter().copied().collect()
}
