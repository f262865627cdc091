//! Archive extractors for ZIP and TAR containers.
//!
//! Archives are listed rather than recursed: the result carries the file
//! inventory in `metadata.archive` and a text listing as content.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ArchiveMetadata, ExtractionResult, Metadata};
use async_trait::async_trait;
use std::io::{Cursor, Read};

fn render_listing(metadata: &ArchiveMetadata) -> String {
    let mut output = format!(
        "{} Archive ({} files, {} bytes)\n\nFiles:\n",
        metadata.format, metadata.file_count, metadata.total_size
    );
    for path in &metadata.file_list {
        output.push_str(&format!("- {path}\n"));
    }
    output
}

fn archive_result(metadata: ArchiveMetadata, mime_type: &str) -> ExtractionResult {
    let mut result = ExtractionResult::new(render_listing(&metadata), mime_type);
    result.metadata = Metadata {
        archive: Some(metadata),
        ..Default::default()
    };
    result
}

/// ZIP archive extractor.
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZipExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ZipExtractor {
    fn name(&self) -> &str {
        "zip-extractor"
    }

    fn description(&self) -> &str {
        "Lists file inventories of ZIP archives"
    }
}

#[async_trait]
impl DocumentExtractor for ZipExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let mut archive = zip::ZipArchive::new(Cursor::new(content))
            .map_err(|e| crate::KreuzbergError::parsing(format!("Failed to open ZIP archive: {e}")))?;

        let mut file_list = Vec::new();
        let mut total_size = 0usize;
        let mut compressed_size = 0usize;

        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| crate::KreuzbergError::parsing(format!("Failed to read ZIP entry: {e}")))?;

            if entry.is_dir() {
                continue;
            }

            total_size += entry.size() as usize;
            compressed_size += entry.compressed_size() as usize;
            file_list.push(entry.name().to_string());
        }

        let metadata = ArchiveMetadata {
            format: "ZIP".to_string(),
            file_count: file_list.len(),
            file_list,
            total_size,
            compressed_size: Some(compressed_size),
        };

        Ok(archive_result(metadata, mime_type))
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/zip", "application/x-zip-compressed"]
    }
}

/// TAR archive extractor.
pub struct TarExtractor;

impl TarExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TarExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TarExtractor {
    fn name(&self) -> &str {
        "tar-extractor"
    }

    fn description(&self) -> &str {
        "Lists file inventories of TAR archives"
    }
}

#[async_trait]
impl DocumentExtractor for TarExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let mut archive = tar::Archive::new(Cursor::new(content));

        let mut file_list = Vec::new();
        let mut total_size = 0usize;

        let entries = archive
            .entries()
            .map_err(|e| crate::KreuzbergError::parsing(format!("Failed to read TAR archive: {e}")))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| crate::KreuzbergError::parsing(format!("Failed to read TAR entry: {e}")))?;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "<invalid path>".to_string());
            let size = entry.header().size().unwrap_or(0) as usize;

            // Entries must be consumed to advance the stream.
            let mut sink = Vec::new();
            let _ = entry.read_to_end(&mut sink);

            total_size += size;
            file_list.push(path);
        }

        let metadata = ArchiveMetadata {
            format: "TAR".to_string(),
            file_count: file_list.len(),
            file_list,
            total_size,
            compressed_size: None,
        };

        Ok(archive_result(metadata, mime_type))
    }

    fn supported_mime_types(&self) -> &[&str] {
        &[
            "application/x-tar",
            "application/tar",
            "application/x-gtar",
        ]
    }
}
