//! DOCX parsing over the raw OOXML container.
//!
//! Walks `word/document.xml`: heading styles become markdown headings,
//! numbered/bulleted paragraphs become list items, tables become GFM tables.

use crate::error::{KreuzbergError, Result};
use crate::types::{ExtractedImage, Metadata};
use std::io::{Cursor, Read};
use zip::ZipArchive;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

#[derive(Debug, Clone)]
pub struct DocxExtractionResult {
    pub content: String,
    pub metadata: Metadata,
    pub images: Vec<ExtractedImage>,
}

pub fn extract_docx_from_bytes(data: &[u8], extract_images: bool) -> Result<DocxExtractionResult> {
    let cursor = Cursor::new(data);
    let mut archive =
        ZipArchive::new(cursor).map_err(|e| KreuzbergError::parsing(format!("Failed to open DOCX container: {e}")))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")?;
    let content = render_document(&document_xml)?;

    let mut metadata = Metadata::default();
    apply_core_properties(&mut archive, &mut metadata);

    let images = if extract_images {
        collect_media(&mut archive)
    } else {
        Vec::new()
    };

    Ok(DocxExtractionResult {
        content,
        metadata,
        images,
    })
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| KreuzbergError::parsing(format!("Missing DOCX part {name}: {e}")))?;
    let mut buffer = String::new();
    entry
        .read_to_string(&mut buffer)
        .map_err(|e| KreuzbergError::parsing(format!("Failed to read DOCX part {name}: {e}")))?;
    Ok(buffer)
}

fn is_tag(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WORD_NS)
}

fn render_document(document_xml: &str) -> Result<String> {
    let document = roxmltree::Document::parse(document_xml)
        .map_err(|e| KreuzbergError::parsing(format!("Invalid DOCX document XML: {e}")))?;

    let body = document
        .descendants()
        .find(|n| is_tag(*n, "body"))
        .ok_or_else(|| KreuzbergError::parsing("DOCX document has no body"))?;

    let mut blocks: Vec<String> = Vec::new();

    for child in body.children().filter(|n| n.is_element()) {
        if is_tag(child, "p") {
            if let Some(rendered) = render_paragraph(child) {
                blocks.push(rendered);
            }
        } else if is_tag(child, "tbl") {
            blocks.push(render_table(child));
        }
    }

    Ok(blocks.join("\n\n").trim().to_string())
}

fn paragraph_text(paragraph: roxmltree::Node) -> String {
    paragraph
        .descendants()
        .filter(|n| is_tag(*n, "t"))
        .filter_map(|n| n.text())
        .collect()
}

fn render_paragraph(paragraph: roxmltree::Node) -> Option<String> {
    let text = paragraph_text(paragraph);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let style = paragraph
        .descendants()
        .find(|n| is_tag(*n, "pStyle"))
        .and_then(|n| n.attribute((WORD_NS, "val")));

    if let Some(style) = style {
        if let Some(level) = heading_level(style) {
            return Some(format!("{} {}", "#".repeat(level), text));
        }
    }

    let is_list_item = paragraph.descendants().any(|n| is_tag(n, "numPr"));
    if is_list_item {
        return Some(format!("- {text}"));
    }

    Some(text.to_string())
}

fn heading_level(style: &str) -> Option<usize> {
    let digits = style.strip_prefix("Heading").or_else(|| style.strip_prefix("heading"))?;
    let level: usize = digits.parse().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn render_table(table: roxmltree::Node) -> String {
    let rows: Vec<Vec<String>> = table
        .children()
        .filter(|n| is_tag(*n, "tr"))
        .map(|row| {
            row.children()
                .filter(|n| is_tag(*n, "tc"))
                .map(|cell| {
                    cell.descendants()
                        .filter(|n| is_tag(*n, "p"))
                        .map(paragraph_text)
                        .collect::<Vec<_>>()
                        .join(" ")
                        .trim()
                        .to_string()
                })
                .collect()
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = Vec::with_capacity(rows.len() + 1);

    for (index, row) in rows.iter().enumerate() {
        let mut padded = row.clone();
        padded.resize(width, String::new());
        lines.push(format!("| {} |", padded.join(" | ")));

        if index == 0 {
            lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
        }
    }

    lines.join("\n")
}

fn apply_core_properties<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, metadata: &mut Metadata) {
    let Ok(core_xml) = read_entry(archive, "docProps/core.xml") else {
        return;
    };
    let Ok(document) = roxmltree::Document::parse(&core_xml) else {
        return;
    };

    for node in document.descendants() {
        let value = node.text().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        match node.tag_name().name() {
            "title" => {
                if let Some(value) = value {
                    metadata.additional.insert("title".to_string(), serde_json::json!(value));
                }
            }
            "creator" => {
                if let Some(value) = value {
                    metadata.additional.insert("author".to_string(), serde_json::json!(value));
                }
            }
            "subject" => metadata.subject = value,
            "created" => metadata.date = value,
            _ => {}
        }
    }
}

fn collect_media<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Vec<ExtractedImage> {
    let media_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("word/media/"))
        .map(|name| name.to_string())
        .collect();

    let mut images = Vec::new();

    for name in media_names {
        let Ok(mut entry) = archive.by_name(&name) else {
            continue;
        };
        let mut data = Vec::new();
        if entry.read_to_end(&mut data).is_err() {
            continue;
        }

        let format = super::pptx::detect_image_format(&data);
        images.push(ExtractedImage {
            data,
            format,
            filename: name.rsplit('/').next().map(|s| s.to_string()),
            page_number: None,
            dimensions: None,
            description: None,
        });
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_docx(document_body: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();

            writer.start_file("word/document.xml", options).unwrap();
            writer
                .write_all(
                    format!(
                        r#"<w:document xmlns:w="{WORD_NS}"><w:body>{document_body}</w:body></w:document>"#
                    )
                    .as_bytes(),
                )
                .unwrap();

            writer.start_file("docProps/core.xml", options).unwrap();
            writer
                .write_all(
                    br#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Report</dc:title><dc:creator>Author A</dc:creator></cp:coreProperties>"#,
                )
                .unwrap();

            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    fn paragraph(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t>{text}</w:t></w:r></w:p>"#)
    }

    fn heading(level: usize, text: &str) -> String {
        format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    }

    #[test]
    fn test_paragraphs_and_headings() {
        let body = format!("{}{}", heading(1, "Introduction"), paragraph("Body text here."));
        let docx = build_docx(&body);

        let result = extract_docx_from_bytes(&docx, false).unwrap();
        assert!(result.content.contains("# Introduction"));
        assert!(result.content.contains("Body text here."));
    }

    #[test]
    fn test_heading_levels() {
        let body = format!("{}{}", heading(2, "Section"), heading(3, "Subsection"));
        let docx = build_docx(&body);

        let result = extract_docx_from_bytes(&docx, false).unwrap();
        assert!(result.content.contains("## Section"));
        assert!(result.content.contains("### Subsection"));
    }

    #[test]
    fn test_list_items() {
        let body = r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>First item</w:t></w:r></w:p>"#;
        let docx = build_docx(body);

        let result = extract_docx_from_bytes(&docx, false).unwrap();
        assert!(result.content.contains("- First item"));
    }

    #[test]
    fn test_table_markdown() {
        let body = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Age</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>Ada</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>36</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let docx = build_docx(body);

        let result = extract_docx_from_bytes(&docx, false).unwrap();
        assert!(result.content.contains("| Name | Age |"));
        assert!(result.content.contains("| --- | --- |"));
        assert!(result.content.contains("| Ada | 36 |"));
    }

    #[test]
    fn test_core_properties() {
        let docx = build_docx(&paragraph("x"));
        let result = extract_docx_from_bytes(&docx, false).unwrap();

        assert_eq!(
            result.metadata.additional.get("title").unwrap(),
            &serde_json::json!("Report")
        );
        assert_eq!(
            result.metadata.additional.get("author").unwrap(),
            &serde_json::json!("Author A")
        );
    }

    #[test]
    fn test_missing_document_part() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer.start_file("other.xml", SimpleFileOptions::default()).unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        assert!(extract_docx_from_bytes(&buffer.into_inner(), false).is_err());
    }

    #[test]
    fn test_not_a_zip() {
        assert!(extract_docx_from_bytes(b"plain bytes", false).is_err());
    }
}
