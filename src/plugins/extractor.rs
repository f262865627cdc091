//! Document extractor plugin trait.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::Plugin;
use crate::types::ExtractionResult;
use async_trait::async_trait;
use std::path::Path;

/// Trait for document extractor plugins.
///
/// Implement this to add support for new document formats or override
/// built-in extraction behavior.
///
/// # Priority System
///
/// When multiple extractors support the same MIME type, the registry selects
/// the highest priority:
///
/// - 0-25: fallback extractors
/// - 26-49: alternative extractors
/// - 50: built-in default
/// - 51-100: overrides and specialized extractors
#[async_trait]
pub trait DocumentExtractor: Plugin {
    /// Extract content from a byte buffer.
    ///
    /// # Errors
    ///
    /// - `KreuzbergError::Parsing` for unrecoverable format faults
    /// - `KreuzbergError::Validation` for invalid input
    /// - `KreuzbergError::MissingDependency` when an optional subsystem is
    ///   required but unavailable
    /// - `KreuzbergError::Io` for I/O failures (always bubbles up)
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult>;

    /// Extract content from a file.
    ///
    /// Default implementation reads the file and delegates to
    /// [`extract_bytes`](Self::extract_bytes). Override for formats that
    /// benefit from path-based access.
    async fn extract_file(&self, path: &Path, mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
        let bytes = crate::core::io::read_file_async(path).await?;
        self.extract_bytes(&bytes, mime_type, config).await
    }

    /// MIME types this extractor supports. Exact types or `type/*` prefixes.
    fn supported_mime_types(&self) -> &[&str];

    /// Selection priority; higher wins.
    fn priority(&self) -> i32 {
        50
    }

    /// Finer-grained gate than MIME matching; defaults to accepting.
    fn can_handle(&self, _path: &Path, _mime_type: &str) -> bool {
        true
    }
}
