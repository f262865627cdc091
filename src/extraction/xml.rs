//! Lenient XML text extraction.
//!
//! Malformed XML still yields whatever text nodes were recovered before the
//! parse broke down. Element attributes are discarded; whitespace runs are
//! collapsed.

use crate::Result;
use crate::types::XmlExtractionResult;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::BTreeSet;

/// Extract text content and element statistics from XML bytes.
pub fn parse_xml(content: &[u8], preserve_whitespace: bool) -> Result<XmlExtractionResult> {
    let mut reader = Reader::from_reader(content);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut texts: Vec<String> = Vec::new();
    let mut element_count = 0usize;
    let mut unique_elements: BTreeSet<String> = BTreeSet::new();
    let mut buffer = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                element_count += 1;
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                unique_elements.insert(name);
            }
            Ok(Event::Text(text)) => {
                let decoded = String::from_utf8_lossy(text.as_ref());
                let piece = if preserve_whitespace {
                    decoded.into_owned()
                } else {
                    decoded.trim().to_string()
                };
                if !piece.is_empty() {
                    texts.push(piece);
                }
            }
            Ok(Event::CData(cdata)) => {
                let piece = String::from_utf8_lossy(&cdata).trim().to_string();
                if !piece.is_empty() {
                    texts.push(piece);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            // Malformed input: keep whatever was recovered so far.
            Err(e) => {
                tracing::debug!(error = %e, "lenient XML parse stopped early");
                break;
            }
        }
        buffer.clear();
    }

    let joined = texts.join(" ");
    let content = if preserve_whitespace {
        joined
    } else {
        crate::text::normalize_spaces(&joined)
    };

    Ok(XmlExtractionResult {
        content,
        element_count,
        unique_elements: unique_elements.into_iter().collect(),
    })
}
