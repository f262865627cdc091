//! PPTX parsing over the raw OOXML container.
//!
//! Each slide is emitted as a `<!-- Slide number: N -->` marker followed by
//! its textual content; tables become HTML `<table>` blocks, speaker notes a
//! trailing `### Notes:` section. A missing notes part simply omits the
//! section.

use crate::error::{KreuzbergError, Result};
use crate::types::{ExtractedImage, PptxExtractionResult, PptxMetadata};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DRAWING_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PRESENTATION_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

pub fn extract_pptx_from_bytes(data: &[u8], extract_images: bool) -> Result<PptxExtractionResult> {
    let cursor = Cursor::new(data);
    let mut archive =
        ZipArchive::new(cursor).map_err(|e| KreuzbergError::parsing(format!("Failed to open PPTX container: {e}")))?;

    let slide_paths = sorted_slide_paths(&mut archive);
    if slide_paths.is_empty() {
        return Err(KreuzbergError::parsing("PPTX container has no slides"));
    }

    let mut content = String::new();
    let mut images = Vec::new();

    for (slide_number, slide_path) in &slide_paths {
        content.push_str(&format!("\n\n<!-- Slide number: {slide_number} -->\n"));

        match read_entry(&mut archive, slide_path) {
            Ok(slide_xml) => match render_slide(&slide_xml) {
                Ok(rendered) => content.push_str(&rendered),
                Err(e) => {
                    tracing::warn!(slide = slide_number, error = %e, "skipping unparseable slide");
                }
            },
            Err(e) => {
                tracing::warn!(slide = slide_number, error = %e, "missing slide part");
            }
        }

        if extract_images {
            for image in slide_images(&mut archive, slide_path, *slide_number) {
                content.push_str(&format!(
                    "\n![{}]({})\n",
                    image.filename.as_deref().unwrap_or("image"),
                    image.filename.as_deref().unwrap_or("image")
                ));
                images.push(image);
            }
        }

        let notes_path = notes_path_for(slide_path);
        if let Ok(notes_xml) = read_entry(&mut archive, &notes_path) {
            if let Ok(notes) = extract_text_runs(&notes_xml) {
                let notes = notes.trim();
                if !notes.is_empty() {
                    content.push_str("\n\n### Notes:\n");
                    content.push_str(notes);
                }
            }
        }
    }

    let mut metadata = extract_metadata(&mut archive);
    metadata.slide_count = slide_paths.len();

    Ok(PptxExtractionResult {
        content: content.trim().to_string(),
        slide_count: slide_paths.len(),
        metadata,
        images,
    })
}

fn sorted_slide_paths<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Vec<(usize, String)> {
    let mut slides: BTreeMap<usize, String> = BTreeMap::new();

    for name in archive.file_names() {
        if let Some(rest) = name.strip_prefix("ppt/slides/slide") {
            if let Some(number) = rest.strip_suffix(".xml").and_then(|n| n.parse::<usize>().ok()) {
                slides.insert(number, name.to_string());
            }
        }
    }

    slides.into_iter().collect()
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| KreuzbergError::parsing(format!("Missing PPTX part {name}: {e}")))?;
    let mut buffer = String::new();
    entry
        .read_to_string(&mut buffer)
        .map_err(|e| KreuzbergError::parsing(format!("Failed to read PPTX part {name}: {e}")))?;
    Ok(buffer)
}

fn read_entry_bytes<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| KreuzbergError::parsing(format!("Missing PPTX part {name}: {e}")))?;
    let mut buffer = Vec::new();
    entry
        .read_to_end(&mut buffer)
        .map_err(|e| KreuzbergError::parsing(format!("Failed to read PPTX part {name}: {e}")))?;
    Ok(buffer)
}

fn is_tag(node: roxmltree::Node, ns: &str, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
}

/// Render one slide: title shapes as headings, body text as paragraphs,
/// tables as HTML blocks, in document order.
fn render_slide(slide_xml: &str) -> Result<String> {
    let document = roxmltree::Document::parse(slide_xml)
        .map_err(|e| KreuzbergError::parsing(format!("Invalid slide XML: {e}")))?;

    let mut parts: Vec<String> = Vec::new();

    for node in document.descendants() {
        if is_tag(node, PRESENTATION_NS, "sp") {
            let text = shape_text(node);
            if text.is_empty() {
                continue;
            }
            if is_title_shape(node) {
                parts.push(format!("# {text}"));
            } else {
                parts.push(text);
            }
        } else if is_tag(node, DRAWING_NS, "tbl") {
            parts.push(render_table(node));
        }
    }

    Ok(parts.join("\n\n"))
}

fn is_title_shape(shape: roxmltree::Node) -> bool {
    shape
        .descendants()
        .filter(|n| is_tag(*n, PRESENTATION_NS, "ph"))
        .any(|ph| matches!(ph.attribute("type"), Some("title") | Some("ctrTitle")))
}

fn shape_text(shape: roxmltree::Node) -> String {
    let mut paragraphs = Vec::new();

    for paragraph in shape.descendants().filter(|n| is_tag(*n, DRAWING_NS, "p")) {
        let text: String = paragraph
            .descendants()
            .filter(|n| is_tag(*n, DRAWING_NS, "t"))
            .filter_map(|n| n.text())
            .collect();
        if !text.trim().is_empty() {
            paragraphs.push(text.trim().to_string());
        }
    }

    paragraphs.join("\n")
}

fn render_table(table: roxmltree::Node) -> String {
    let mut html = String::from("<table>");

    for (row_index, row) in table
        .descendants()
        .filter(|n| is_tag(*n, DRAWING_NS, "tr"))
        .enumerate()
    {
        html.push_str("<tr>");
        let cell_tag = if row_index == 0 { "th" } else { "td" };

        for cell in row.descendants().filter(|n| is_tag(*n, DRAWING_NS, "tc")) {
            let text: String = cell
                .descendants()
                .filter(|n| is_tag(*n, DRAWING_NS, "t"))
                .filter_map(|n| n.text())
                .collect::<Vec<_>>()
                .join(" ");
            html.push_str(&format!("<{cell_tag}>{}</{cell_tag}>", html_escape(text.trim())));
        }
        html.push_str("</tr>");
    }

    html.push_str("</table>");
    html
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// All `a:t` runs of a part, newline-joined per paragraph.
fn extract_text_runs(xml: &str) -> Result<String> {
    let document =
        roxmltree::Document::parse(xml).map_err(|e| KreuzbergError::parsing(format!("Invalid XML part: {e}")))?;

    let mut paragraphs = Vec::new();
    for paragraph in document.descendants().filter(|n| is_tag(*n, DRAWING_NS, "p")) {
        let text: String = paragraph
            .descendants()
            .filter(|n| is_tag(*n, DRAWING_NS, "t"))
            .filter_map(|n| n.text())
            .collect();
        if !text.trim().is_empty() {
            paragraphs.push(text.trim().to_string());
        }
    }

    Ok(paragraphs.join("\n"))
}

fn notes_path_for(slide_path: &str) -> String {
    slide_path
        .replace("ppt/slides/slide", "ppt/notesSlides/notesSlide")
        .to_string()
}

/// Images referenced by a slide's relationship part.
fn slide_images<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    slide_path: &str,
    slide_number: usize,
) -> Vec<ExtractedImage> {
    let file_name = match slide_path.rsplit('/').next() {
        Some(name) => name,
        None => return Vec::new(),
    };
    let rels_path = format!("ppt/slides/_rels/{file_name}.rels");

    let Ok(rels_xml) = read_entry(archive, &rels_path) else {
        return Vec::new();
    };
    let Ok(document) = roxmltree::Document::parse(&rels_xml) else {
        return Vec::new();
    };

    let mut images = Vec::new();

    for relationship in document.descendants().filter(|n| n.tag_name().name() == "Relationship") {
        let is_image = relationship
            .attribute("Type")
            .is_some_and(|t| t.ends_with("/image"));
        if !is_image {
            continue;
        }

        let Some(target) = relationship.attribute("Target") else {
            continue;
        };
        let full_path = target.replace("../", "ppt/");

        if let Ok(data) = read_entry_bytes(archive, &full_path) {
            let format = detect_image_format(&data);
            let filename = full_path.rsplit('/').next().map(|s| s.to_string());
            images.push(ExtractedImage {
                data,
                format,
                filename,
                page_number: Some(slide_number),
                dimensions: None,
                description: None,
            });
        }
    }

    images
}

pub fn detect_image_format(data: &[u8]) -> String {
    match infer::get(data) {
        Some(kind) => kind.extension().to_string(),
        None => "bin".to_string(),
    }
}

fn extract_metadata<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> PptxMetadata {
    let mut metadata = PptxMetadata::default();

    if let Ok(core_xml) = read_entry(archive, "docProps/core.xml") {
        if let Ok(document) = roxmltree::Document::parse(&core_xml) {
            for node in document.descendants() {
                match node.tag_name().name() {
                    "title" => metadata.title = node.text().map(|t| t.to_string()).filter(|t| !t.is_empty()),
                    "creator" => metadata.author = node.text().map(|t| t.to_string()).filter(|t| !t.is_empty()),
                    "description" => {
                        metadata.description = node.text().map(|t| t.to_string()).filter(|t| !t.is_empty())
                    }
                    _ => {}
                }
            }
        }
    }

    if let Ok(theme_xml) = read_entry(archive, "ppt/theme/theme1.xml") {
        if let Ok(document) = roxmltree::Document::parse(&theme_xml) {
            let mut fonts: Vec<String> = document
                .descendants()
                .filter_map(|n| n.attribute("typeface"))
                .filter(|f| !f.is_empty() && !f.starts_with('+'))
                .map(|f| f.to_string())
                .collect();
            fonts.sort();
            fonts.dedup();
            metadata.fonts = fonts;
        }
    }

    metadata
}
