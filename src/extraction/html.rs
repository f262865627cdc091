//! HTML to Markdown conversion via `html-to-markdown-rs`.
//!
//! Supports inline image extraction (data URLs) with a per-image byte cap
//! and parses the converter's YAML frontmatter into [`HtmlMetadata`].

use crate::core::config::HtmlToMarkdownConfig;
use crate::error::{KreuzbergError, Result};
use crate::types::HtmlMetadata;
use html_to_markdown_rs::{
    ConversionOptions, HeadingStyle, InlineImage, InlineImageConfig, InlineImageFormat, convert as convert_html,
    convert_with_inline_images,
};
use serde::{Deserialize, Serialize};

/// Result of HTML extraction with optional images and warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlExtractionResult {
    pub markdown: String,
    pub images: Vec<ExtractedInlineImage>,
    pub warnings: Vec<String>,
}

/// Extracted inline image with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedInlineImage {
    pub data: Vec<u8>,
    pub format: String,
    pub filename: Option<String>,
    pub description: Option<String>,
    pub dimensions: Option<(u32, u32)>,
}

fn conversion_options(config: Option<&HtmlToMarkdownConfig>) -> ConversionOptions {
    let mut options = ConversionOptions {
        extract_metadata: true,
        hocr_spatial_tables: false,
        ..Default::default()
    };

    if let Some(config) = config {
        if config.heading_style == "setext" {
            options.heading_style = HeadingStyle::Underlined;
        } else {
            options.heading_style = HeadingStyle::Atx;
        }
    }

    options
}

fn inline_image_format_to_str(format: &InlineImageFormat) -> String {
    match format {
        InlineImageFormat::Png => "png".to_string(),
        InlineImageFormat::Jpeg => "jpeg".to_string(),
        InlineImageFormat::Gif => "gif".to_string(),
        InlineImageFormat::Bmp => "bmp".to_string(),
        InlineImageFormat::Webp => "webp".to_string(),
        InlineImageFormat::Svg => "svg".to_string(),
        InlineImageFormat::Other(custom) => {
            let trimmed = custom.trim().to_ascii_lowercase();
            let candidate = trimmed
                .split(['+', ';'])
                .next()
                .unwrap_or("")
                .rsplit('/')
                .next()
                .unwrap_or("")
                .trim_start_matches("x-");

            if candidate.is_empty() {
                "bin".to_string()
            } else {
                candidate.to_string()
            }
        }
    }
}

fn inline_image_to_extracted(image: InlineImage) -> ExtractedInlineImage {
    ExtractedInlineImage {
        data: image.data,
        format: inline_image_format_to_str(&image.format),
        filename: image.filename,
        description: image.description,
        dimensions: image.dimensions,
    }
}

/// Convert HTML to markdown with optional conversion options.
pub fn convert_html_to_markdown(html: &str, config: Option<&HtmlToMarkdownConfig>) -> Result<String> {
    convert_html(html, Some(conversion_options(config)))
        .map_err(|e| KreuzbergError::parsing(format!("Failed to convert HTML to Markdown: {e}")))
}

/// Convert HTML with optional inline image extraction.
///
/// Images above `max_image_bytes` are skipped by the converter and surfaced
/// as warnings.
pub fn process_html(
    html: &str,
    config: Option<&HtmlToMarkdownConfig>,
    extract_images: bool,
    max_image_bytes: u64,
) -> Result<HtmlExtractionResult> {
    let options = conversion_options(config);

    if extract_images {
        let mut image_config = InlineImageConfig::new(max_image_bytes);
        image_config.filename_prefix = Some("inline-image".to_string());

        let extraction = convert_with_inline_images(html, Some(options), image_config, None)
            .map_err(|e| KreuzbergError::parsing(format!("Failed to convert HTML to Markdown with images: {e}")))?;

        Ok(HtmlExtractionResult {
            markdown: extraction.markdown,
            images: extraction.inline_images.into_iter().map(inline_image_to_extracted).collect(),
            warnings: extraction.warnings.into_iter().map(|w| w.message).collect(),
        })
    } else {
        let markdown = convert_html(html, Some(options))
            .map_err(|e| KreuzbergError::parsing(format!("Failed to convert HTML to Markdown: {e}")))?;

        Ok(HtmlExtractionResult {
            markdown,
            images: Vec::new(),
            warnings: Vec::new(),
        })
    }
}

/// Split the converter's YAML frontmatter off the markdown and pick the HTML
/// metadata fields out of it.
pub fn parse_html_metadata(markdown: &str) -> (Option<HtmlMetadata>, String) {
    let Some(after_opening) = markdown.strip_prefix("---\n") else {
        return (None, markdown.to_string());
    };

    let Some(end) = after_opening.find("\n---\n") else {
        return (None, markdown.to_string());
    };

    let frontmatter = &after_opening[..end];
    let content = after_opening[end + 5..].to_string();

    let mut metadata = HtmlMetadata::default();
    let mut any = false;

    for line in frontmatter.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }

        match key.trim() {
            "title" => {
                metadata.title = Some(value.to_string());
                any = true;
            }
            "meta-description" => {
                metadata.description = Some(value.to_string());
                any = true;
            }
            "meta-keywords" => {
                metadata.keywords = Some(value.to_string());
                any = true;
            }
            "meta-author" => {
                metadata.author = Some(value.to_string());
                any = true;
            }
            _ => {}
        }
    }

    (if any { Some(metadata) } else { None }, content)
}
