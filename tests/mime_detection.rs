//! MIME resolution behavior across paths, buffers, and hints.

use kreuzberg::{KreuzbergError, detect_mime_from_bytes, detect_mime_type, detect_or_validate, validate_mime_type};
use std::path::Path;

#[test]
fn test_extension_detection() {
    let cases = [
        ("report.pdf", "application/pdf"),
        ("notes.txt", "text/plain"),
        ("readme.md", "text/markdown"),
        ("data.xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        ("deck.pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
        ("letter.docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        ("old.doc", "application/msword"),
        ("mail.eml", "message/rfc822"),
        ("page.html", "text/html"),
        ("image.png", "image/png"),
        ("diagram.svg", "image/svg+xml"),
        ("table.csv", "text/csv"),
        ("bundle.zip", "application/zip"),
    ];

    for (filename, expected) in cases {
        assert_eq!(
            detect_mime_type(filename, false).unwrap(),
            expected,
            "wrong MIME for {filename}"
        );
    }
}

#[test]
fn test_extension_case_insensitive() {
    assert_eq!(detect_mime_type("REPORT.PDF", false).unwrap(), "application/pdf");
}

#[test]
fn test_magic_number_sniffing() {
    assert_eq!(
        detect_mime_from_bytes(b"%PDF-1.7\nrest of file").unwrap(),
        "application/pdf"
    );
    assert_eq!(
        detect_mime_from_bytes(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap(),
        "image/png"
    );
    assert_eq!(detect_mime_from_bytes(b"ordinary text content").unwrap(), "text/plain");
}

#[test]
fn test_hint_validation() {
    assert_eq!(validate_mime_type("application/pdf").unwrap(), "application/pdf");
    assert_eq!(validate_mime_type("TEXT/PLAIN").unwrap(), "text/plain");
    assert_eq!(
        validate_mime_type("text/html; charset=utf-8").unwrap(),
        "text/html"
    );

    let err = validate_mime_type("application/x-nonsense").unwrap_err();
    assert!(matches!(err, KreuzbergError::Validation { .. }));
}

#[test]
fn test_hint_overrides_extension() {
    let mime = detect_or_validate(Some(Path::new("data.bin")), None, Some("text/plain")).unwrap();
    assert_eq!(mime, "text/plain");
}

#[test]
fn test_buffer_fallback_when_no_path() {
    let mime = detect_or_validate(None, Some(b"<?xml version=\"1.0\"?><r/>"), None).unwrap();
    assert_eq!(mime, "application/xml");
}

#[test]
fn test_unknown_input_is_validation_error() {
    assert!(matches!(
        detect_mime_type("mystery.zzz", false),
        Err(KreuzbergError::Validation { .. })
    ));
    assert!(matches!(
        detect_mime_from_bytes(&[]),
        Err(KreuzbergError::Validation { .. })
    ));
}
