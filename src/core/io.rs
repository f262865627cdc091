//! Filesystem helpers shared by the extraction entry points.

use crate::{KreuzbergError, Result};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Validate that a path exists and is a regular file.
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(KreuzbergError::validation(format!(
            "File does not exist: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(KreuzbergError::validation(format!(
            "Path is not a regular file: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Read a file asynchronously. I/O failures bubble up as fatal errors.
pub async fn read_file_async(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

/// (size, mtime_ns) pair identifying a source file version.
///
/// Cache entries record this at write time; a mismatch at read time marks
/// the entry stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStat {
    pub size: u64,
    pub mtime_ns: u128,
}

impl SourceStat {
    pub fn for_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mtime_ns = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        Ok(Self {
            size: metadata.len(),
            mtime_ns,
        })
    }
}
