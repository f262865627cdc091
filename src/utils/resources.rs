//! Scoped resource guards with release on every exit path.
//!
//! Guards release their resource on drop (success, error, cancellation
//! alike); release failures are logged and never propagate. PDF documents,
//! pages, and bitmaps are scoped by pdfium-render's own ownership model and
//! need no extra wrapper here.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// A temporary file removed on drop.
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    /// Create a uniquely-named temp file with the given extension and
    /// content.
    pub fn create(extension: &str, content: &[u8]) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("kreuzberg_{}.{extension}", uuid::Uuid::new_v4()));
        std::fs::write(&path, content)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

/// A temporary directory removed recursively on drop.
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    pub fn create(prefix: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{prefix}_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp directory");
            }
        }
    }
}
