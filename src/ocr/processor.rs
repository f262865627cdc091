//! OCR pipeline: DPI normalization, backend dispatch, caching, execution.
//!
//! Steps per image: normalize DPI into the configured envelope, look up the
//! OCR cache (with in-flight deduplication), dispatch to the configured
//! backend on a pool worker, then merge the preprocessing report into the
//! backend's result.

use crate::cache::{fast_hash, generate_cache_key, get_ocr_cache};
use crate::core::config::{ExtractionConfig, OcrConfig};
use crate::error::{KreuzbergError, Result};
use crate::ocr::dpi::normalize_image_dpi;
use crate::plugins::OcrBackend;
use crate::plugins::registry::get_ocr_backend_registry;
use crate::types::{ExtractionResult, ImagePreprocessingMetadata};
use std::sync::Arc;

pub struct OcrProcessor;

impl OcrProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Run OCR over encoded image bytes.
    pub async fn process_image(
        &self,
        image_bytes: &[u8],
        ocr_config: &OcrConfig,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let prepared = prepare_image(image_bytes, config)?;
        let cache_key = ocr_cache_key(ocr_config, config, &prepared.encoded);

        let mut ticket_guard = TicketGuard::disabled();

        if config.use_cache {
            if let Some(hit) = read_cached(&cache_key)? {
                return Ok(hit);
            }

            loop {
                match get_ocr_cache().begin_processing(&cache_key) {
                    crate::cache::TicketAttempt::Owner(_) => {
                        ticket_guard = TicketGuard::owned(&cache_key);
                        if let Some(hit) = read_cached(&cache_key)? {
                            return Ok(hit);
                        }
                        break;
                    }
                    crate::cache::TicketAttempt::Waiter(_) => {
                        let key = cache_key.clone();
                        tokio::task::spawn_blocking(move || get_ocr_cache().wait_for(&key))
                            .await
                            .map_err(|e| KreuzbergError::Other(format!("Ticket wait task failed: {e}")))?;

                        if let Some(hit) = read_cached(&cache_key)? {
                            return Ok(hit);
                        }
                    }
                }
            }
        }

        let backend = resolve_backend(&ocr_config.backend)?;

        let task_bytes = prepared.encoded.clone();
        let task_config = ocr_config.clone();
        let task_backend = Arc::clone(&backend);

        let mut result = crate::utils::global_pool()
            .submit_task(move || task_backend.process_image_sync(&task_bytes, &task_config), 512.0)
            .await?;

        merge_preprocessing(&mut result, prepared.preprocessing);

        if config.use_cache {
            store_cached(&cache_key, &result);
        }

        drop(ticket_guard);

        Ok(result)
    }

    /// Synchronous form of [`process_image`](Self::process_image).
    pub fn process_image_sync(
        &self,
        image_bytes: &[u8],
        ocr_config: &OcrConfig,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let prepared = prepare_image(image_bytes, config)?;
        let cache_key = ocr_cache_key(ocr_config, config, &prepared.encoded);

        let mut ticket_guard = TicketGuard::disabled();

        if config.use_cache {
            if let Some(hit) = read_cached(&cache_key)? {
                return Ok(hit);
            }

            loop {
                match get_ocr_cache().begin_processing(&cache_key) {
                    crate::cache::TicketAttempt::Owner(_) => {
                        ticket_guard = TicketGuard::owned(&cache_key);
                        if let Some(hit) = read_cached(&cache_key)? {
                            return Ok(hit);
                        }
                        break;
                    }
                    crate::cache::TicketAttempt::Waiter(_) => {
                        get_ocr_cache().wait_for(&cache_key);
                        if let Some(hit) = read_cached(&cache_key)? {
                            return Ok(hit);
                        }
                    }
                }
            }
        }

        let backend = resolve_backend(&ocr_config.backend)?;
        let mut result = backend.process_image_sync(&prepared.encoded, ocr_config)?;

        merge_preprocessing(&mut result, prepared.preprocessing);

        if config.use_cache {
            store_cached(&cache_key, &result);
        }

        drop(ticket_guard);

        Ok(result)
    }
}

impl Default for OcrProcessor {
    fn default() -> Self {
        Self::new()
    }
}

struct PreparedImage {
    encoded: Vec<u8>,
    preprocessing: ImagePreprocessingMetadata,
}

fn prepare_image(image_bytes: &[u8], config: &ExtractionConfig) -> Result<PreparedImage> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| KreuzbergError::ocr(format!("Failed to decode image: {e}")))?;

    let (normalized, preprocessing) = normalize_image_dpi(&image, None, config)?;

    let encoded = if preprocessing.skipped_resize {
        image_bytes.to_vec()
    } else {
        let mut buffer = Vec::new();
        normalized
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .map_err(|e| KreuzbergError::ocr(format!("Failed to encode normalized image: {e}")))?;
        buffer
    };

    Ok(PreparedImage { encoded, preprocessing })
}

fn ocr_cache_key(ocr_config: &OcrConfig, config: &ExtractionConfig, image_bytes: &[u8]) -> String {
    let config_material = serde_json::to_string(ocr_config).unwrap_or_default();
    let config_hash = format!("{:016x}", fast_hash(config_material.as_bytes()));
    let dpi_material = format!(
        "{}:{}:{}:{}:{}",
        config.target_dpi, config.min_dpi, config.max_dpi, config.max_image_dimension, config.auto_adjust_dpi
    );
    let image_hash = format!("{:016x}", fast_hash(image_bytes));

    generate_cache_key(&[
        ("ocr_backend", ocr_config.backend.as_str()),
        ("ocr_config", config_hash.as_str()),
        ("dpi", dpi_material.as_str()),
        ("image_hash", image_hash.as_str()),
    ])
}

fn read_cached(cache_key: &str) -> Result<Option<ExtractionResult>> {
    let Some(bytes) = get_ocr_cache().get(cache_key, None)? else {
        return Ok(None);
    };

    match rmp_serde::from_slice(&bytes) {
        Ok(result) => Ok(Some(result)),
        Err(e) => {
            tracing::warn!(key = %cache_key, error = %e, "corrupt OCR cache entry; treating as miss");
            Ok(None)
        }
    }
}

fn store_cached(cache_key: &str, result: &ExtractionResult) {
    match rmp_serde::to_vec_named(result) {
        Ok(bytes) => {
            if let Err(e) = get_ocr_cache().set(cache_key, &bytes, None) {
                tracing::warn!(key = %cache_key, error = %e, "failed to store OCR cache entry");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to serialize OCR result for cache"),
    }
}

fn merge_preprocessing(result: &mut ExtractionResult, preprocessing: ImagePreprocessingMetadata) {
    result.metadata.image_preprocessing = Some(preprocessing);
}

/// Completes the in-flight ticket on every exit path.
struct TicketGuard {
    key: Option<String>,
}

impl TicketGuard {
    fn owned(cache_key: &str) -> Self {
        Self {
            key: Some(cache_key.to_string()),
        }
    }

    fn disabled() -> Self {
        Self { key: None }
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            get_ocr_cache().mark_complete(&key);
        }
    }
}

/// Resolve a backend by name, lazily registering the built-in tesseract
/// backend on first use.
fn resolve_backend(name: &str) -> Result<Arc<dyn OcrBackend>> {
    let registry = get_ocr_backend_registry();

    {
        let read = registry
            .read()
            .map_err(|e| KreuzbergError::Other(format!("OCR backend registry lock poisoned: {e}")))?;
        if let Ok(backend) = read.get(name) {
            return Ok(backend);
        }
    }

    if name == "tesseract" {
        let mut write = registry
            .write()
            .map_err(|e| KreuzbergError::Other(format!("OCR backend registry lock poisoned: {e}")))?;
        // Registration may have raced with another thread.
        if let Ok(backend) = write.get(name) {
            return Ok(backend);
        }
        write
            .register(Arc::new(super::tesseract_backend::TesseractBackend::new()))
            .map_err(|e| match e {
                KreuzbergError::MissingDependency { .. } => e,
                other => KreuzbergError::missing_dependency(format!(
                    "OCR backend 'tesseract' failed to initialize: {other}. Install: 'apt install tesseract-ocr'"
                )),
            })?;
        return write.get(name);
    }

    Err(KreuzbergError::missing_dependency(format!(
        "OCR backend '{name}' is not registered. Register it with register_ocr_backend() \
         or install the corresponding plugin package."
    ))
    .with_context("backend", serde_json::json!(name)))
}

/// Register a custom OCR backend. Idempotent under a repeated name: the new
/// registration replaces the old with a warning.
pub fn register_ocr_backend(backend: Arc<dyn OcrBackend>) -> Result<()> {
    let registry = get_ocr_backend_registry();
    let mut write = registry
        .write()
        .map_err(|e| KreuzbergError::Other(format!("OCR backend registry lock poisoned: {e}")))?;
    write.register(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Plugin;
    use serial_test::serial;

    struct EchoBackend {
        name: &'static str,
    }

    impl Plugin for EchoBackend {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait::async_trait]
    impl OcrBackend for EchoBackend {
        fn process_image_sync(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
            let mut result = ExtractionResult::new(format!("ocr:{}:{}", self.name, image_bytes.len()), "text/plain");
            result.metadata.ocr = Some(crate::types::OcrMetadata {
                language: config.language.clone(),
                psm: config.psm,
                output_format: config.output_format.clone(),
                table_count: 0,
                table_rows: None,
                table_cols: None,
            });
            Ok(result)
        }

        fn supports_language(&self, _language: &str) -> bool {
            true
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::new_rgb8(width, height);
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_backend_missing_dependency() {
        let processor = OcrProcessor::new();
        let config = ExtractionConfig {
            use_cache: false,
            ..Default::default()
        };
        let ocr_config = OcrConfig {
            backend: "no-such-backend".to_string(),
            ..Default::default()
        };

        let result = processor.process_image(&png_bytes(10, 10), &ocr_config, &config).await;
        assert!(matches!(result, Err(KreuzbergError::MissingDependency { .. })));
    }

    #[tokio::test]
    #[serial]
    async fn test_custom_backend_dispatch_and_merge() {
        register_ocr_backend(Arc::new(EchoBackend { name: "echo" })).unwrap();

        let processor = OcrProcessor::new();
        let config = ExtractionConfig {
            use_cache: false,
            ..Default::default()
        };
        let ocr_config = OcrConfig {
            backend: "echo".to_string(),
            ..Default::default()
        };

        let result = processor.process_image(&png_bytes(32, 32), &ocr_config, &config).await.unwrap();

        assert!(result.content.starts_with("ocr:echo:"));
        // Step 1's preprocessing report is merged into the backend result.
        let preprocessing = result.metadata.image_preprocessing.unwrap();
        assert_eq!(preprocessing.original_dimensions, (32, 32));
        assert!(result.metadata.ocr.is_some());
    }

    #[test]
    #[serial]
    fn test_repeated_registration_last_wins() {
        register_ocr_backend(Arc::new(EchoBackend { name: "dup" })).unwrap();
        register_ocr_backend(Arc::new(EchoBackend { name: "dup" })).unwrap();

        let registry = get_ocr_backend_registry();
        let read = registry.read().unwrap();
        assert_eq!(read.list().iter().filter(|n| n.as_str() == "dup").count(), 1);
    }

    #[test]
    #[serial]
    fn test_sync_path_invalid_image() {
        let processor = OcrProcessor::new();
        let config = ExtractionConfig {
            use_cache: false,
            ..Default::default()
        };
        let ocr_config = OcrConfig::default();

        let result = processor.process_image_sync(b"not an image", &ocr_config, &config);
        assert!(matches!(result, Err(KreuzbergError::Ocr { .. })));
    }

    #[test]
    fn test_cache_key_sensitivity() {
        let config = ExtractionConfig::default();
        let ocr_a = OcrConfig::default();
        let ocr_b = OcrConfig {
            language: "deu".to_string(),
            ..Default::default()
        };

        let image = png_bytes(8, 8);
        let key_a = ocr_cache_key(&ocr_a, &config, &image);
        let key_b = ocr_cache_key(&ocr_b, &config, &image);
        let key_a_again = ocr_cache_key(&ocr_a, &config, &image);

        assert_eq!(key_a, key_a_again);
        assert_ne!(key_a, key_b);
    }
}
