//! Format-specific end-to-end scenarios (spreadsheets, presentations,
//! archives).

#![cfg(feature = "excel")]

use kreuzberg::{ExtractionConfig, extract_bytes};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

fn uncached() -> ExtractionConfig {
    ExtractionConfig {
        use_cache: false,
        ..Default::default()
    }
}

/// Minimal two-sheet workbook using inline strings.
fn build_xlsx() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#,
            )
            .unwrap();

        writer.start_file("_rels/.rels", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
            )
            .unwrap();

        writer.start_file("xl/workbook.xml", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="first_sheet" sheetId="1" r:id="rId1"/>
<sheet name="second_sheet" sheetId="2" r:id="rId2"/>
</sheets>
</workbook>"#,
            )
            .unwrap();

        writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
</Relationships>"#,
            )
            .unwrap();

        writer.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1">
<c r="A1" t="inlineStr"><is><t>Column 1</t></is></c>
<c r="B1" t="inlineStr"><is><t>Column 2</t></is></c>
</row>
<row r="2">
<c r="A2"><v>1</v></c>
<c r="B2"><v>2</v></c>
</row>
</sheetData>
</worksheet>"#,
            )
            .unwrap();

        writer.start_file("xl/worksheets/sheet2.xml", options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData/>
</worksheet>"#,
            )
            .unwrap();

        writer.finish().unwrap();
    }
    buffer.into_inner()
}

#[tokio::test]
async fn test_xlsx_two_sheets_scenario() {
    let xlsx = build_xlsx();

    let result = extract_bytes(
        &xlsx,
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        &uncached(),
    )
    .await
    .unwrap();

    assert!(result.content.contains("## first_sheet"), "content: {}", result.content);
    assert!(result.content.contains("## second_sheet"));
    assert!(result.content.contains("| Column 1 | Column 2 |"));
    assert!(result.content.contains("| --- | --- |"));
    assert!(result.content.contains("| 1 | 2 |"));

    assert_eq!(result.metadata.excel.unwrap().sheet_count, 2);
}

#[tokio::test]
async fn test_csv_scenario() {
    let result = extract_bytes(b"Name,Score\nAda,95\nGrace,99\n", Some("text/csv"), &uncached())
        .await
        .unwrap();

    assert_eq!(result.mime_type, "text/markdown");
    assert!(result.content.contains("| Name | Score |"));
    assert!(result.content.contains("| Ada | 95 |"));
    assert!(result.content.contains("| Grace | 99 |"));
}

#[cfg(feature = "office")]
#[tokio::test]
async fn test_pptx_slide_markers() {
    // Single-slide deck built the same way the PPTX parser reads it.
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();

        writer.start_file("ppt/slides/slide1.xml", options).unwrap();
        writer
            .write_all(
                br#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:sp><p:txBody><a:p><a:r><a:t>Slide body text</a:t></a:r></a:p></p:txBody></p:sp></p:sld>"#,
            )
            .unwrap();

        writer.start_file("ppt/notesSlides/notesSlide1.xml", options).unwrap();
        writer
            .write_all(
                br#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:sp><p:txBody><a:p><a:r><a:t>Speaker note</a:t></a:r></a:p></p:txBody></p:sp></p:notes>"#,
            )
            .unwrap();

        writer.finish().unwrap();
    }

    let result = extract_bytes(
        &buffer.into_inner(),
        Some("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
        &uncached(),
    )
    .await
    .unwrap();

    assert_eq!(result.mime_type, "text/markdown");
    assert!(result.content.contains("<!-- Slide number: 1 -->"));
    assert!(result.content.contains("Slide body text"));
    assert!(result.content.contains("### Notes:\nSpeaker note"));
    assert_eq!(result.metadata.pptx.unwrap().slide_count, 1);
}

#[cfg(feature = "office")]
#[tokio::test]
async fn test_docx_headings_and_tables() {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();

        writer.start_file("word/document.xml", options).unwrap();
        writer
            .write_all(
                br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Overview</w:t></w:r></w:p><w:p><w:r><w:t>Body paragraph.</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>Key</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Value</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body></w:document>"#,
            )
            .unwrap();

        writer.finish().unwrap();
    }

    let result = extract_bytes(
        &buffer.into_inner(),
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        &uncached(),
    )
    .await
    .unwrap();

    assert_eq!(result.mime_type, "text/markdown");
    assert!(result.content.contains("# Overview"));
    assert!(result.content.contains("Body paragraph."));
    assert!(result.content.contains("| Key | Value |"));
}

#[cfg(feature = "archives")]
#[tokio::test]
async fn test_zip_archive_listing() {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();
        writer.start_file("a.txt", options).unwrap();
        writer.write_all(b"alpha").unwrap();
        writer.start_file("b/c.txt", options).unwrap();
        writer.write_all(b"beta").unwrap();
        writer.finish().unwrap();
    }

    let result = extract_bytes(&buffer.into_inner(), Some("application/zip"), &uncached())
        .await
        .unwrap();

    let archive = result.metadata.archive.unwrap();
    assert_eq!(archive.file_count, 2);
    assert!(result.content.contains("- a.txt"));
    assert!(result.content.contains("- b/c.txt"));
}
