//! Table-model inference runtime boundary.
//!
//! The detection and structure models run in an external ML inference
//! runtime. The core consumes it through [`TableModelRuntime`]; when no
//! runtime is installed, table extraction fails with a
//! `MissingDependencyError` naming the package while the rest of extraction
//! continues.

use super::types::{BboxPredictions, TablePredictions};
use crate::error::{KreuzbergError, Result};
use image::DynamicImage;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

/// Inference interface consumed by the vision table pipeline.
pub trait TableModelRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate the detection model on a full page image.
    fn detect(&self, image: &DynamicImage, model: &str, cache_dir: Option<&str>) -> Result<BboxPredictions>;

    /// Evaluate the structure model on a cropped table region.
    fn recognize_structure(
        &self,
        image: &DynamicImage,
        model: &str,
        cache_dir: Option<&str>,
    ) -> Result<TablePredictions>;
}

impl std::fmt::Debug for dyn TableModelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableModelRuntime").field("name", &self.name()).finish()
    }
}

static RUNTIME: Lazy<RwLock<Option<Arc<dyn TableModelRuntime>>>> = Lazy::new(|| RwLock::new(None));

/// Install the inference runtime. Replaces any previous installation.
pub fn set_table_model_runtime(runtime: Arc<dyn TableModelRuntime>) {
    let mut slot = RUNTIME.write().expect("table runtime lock poisoned");
    if slot.is_some() {
        tracing::warn!(runtime = %runtime.name(), "replacing previously installed table model runtime");
    }
    *slot = Some(runtime);
}

/// Remove the installed runtime (mainly for tests).
pub fn clear_table_model_runtime() {
    let mut slot = RUNTIME.write().expect("table runtime lock poisoned");
    *slot = None;
}

pub fn get_table_model_runtime() -> Result<Arc<dyn TableModelRuntime>> {
    let slot = RUNTIME.read().expect("table runtime lock poisoned");
    slot.clone().ok_or_else(|| {
        KreuzbergError::missing_dependency(
            "Vision table extraction requires a table-model inference runtime. \
             Install the 'kreuzberg-vision' package and register its runtime with \
             set_table_model_runtime(), or enable extract_from_ocr to reconstruct \
             tables from OCR output instead.",
        )
        .with_context("package", serde_json::json!("kreuzberg-vision"))
        .with_context("install_command", serde_json::json!("cargo add kreuzberg-vision"))
    })
}

pub fn has_table_model_runtime() -> bool {
    RUNTIME.read().expect("table runtime lock poisoned").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct NullRuntime;

    impl TableModelRuntime for NullRuntime {
        fn name(&self) -> &str {
            "null"
        }

        fn detect(&self, _image: &DynamicImage, _model: &str, _cache_dir: Option<&str>) -> Result<BboxPredictions> {
            Ok(BboxPredictions::default())
        }

        fn recognize_structure(
            &self,
            _image: &DynamicImage,
            _model: &str,
            _cache_dir: Option<&str>,
        ) -> Result<TablePredictions> {
            Ok(TablePredictions::default())
        }
    }

    #[test]
    #[serial]
    fn test_missing_runtime_error_names_package() {
        clear_table_model_runtime();

        let err = get_table_model_runtime().unwrap_err();
        assert!(matches!(err, KreuzbergError::MissingDependency { .. }));
        let context = err.context().unwrap();
        assert_eq!(context.get("package").unwrap(), "kreuzberg-vision");
        assert!(context.contains_key("install_command"));
    }

    #[test]
    #[serial]
    fn test_install_and_clear() {
        set_table_model_runtime(Arc::new(NullRuntime));
        assert!(has_table_model_runtime());
        assert_eq!(get_table_model_runtime().unwrap().name(), "null");

        clear_table_model_runtime();
        assert!(!has_table_model_runtime());
    }
}
