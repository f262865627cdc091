//! Main extraction entry points.
//!
//! Orchestrates the pipeline for every call: MIME resolution, cache lookup
//! with in-flight deduplication, extractor dispatch, post-processing, and
//! cache storage. Every public operation has an async form and a sync twin
//! that runs on a shared global runtime.

use crate::cache::{generate_cache_key, get_document_cache, get_mime_cache};
use crate::core::config::ExtractionConfig;
use crate::core::io::SourceStat;
use crate::plugins::DocumentExtractor;
use crate::types::{ErrorMetadata, ExtractionResult};
use crate::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global Tokio runtime backing the synchronous wrappers.
///
/// Lazily initialized on first use and shared across all sync calls; one
/// runtime per process instead of one per call.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime")
});

/// Bumped on every registry mutation; thread-local memos re-validate
/// against it so stale dispatch decisions never survive a mutation.
static EXTRACTOR_CACHE_GENERATION: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static EXTRACTOR_CACHE: RefCell<(u64, HashMap<String, Arc<dyn DocumentExtractor>>)> =
        RefCell::new((0, HashMap::new()));
}

/// Invalidate every thread's extractor memo. Called by the registry on
/// register, replace, and remove.
pub fn invalidate_extractor_cache() {
    EXTRACTOR_CACHE_GENERATION.fetch_add(1, Ordering::SeqCst);
}

/// Get an extractor through the per-thread memo, falling back to a registry
/// read on miss or after invalidation.
fn get_extractor_cached(mime_type: &str) -> Result<Arc<dyn DocumentExtractor>> {
    let generation = EXTRACTOR_CACHE_GENERATION.load(Ordering::SeqCst);

    let cached = EXTRACTOR_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.0 != generation {
            cache.0 = generation;
            cache.1.clear();
        }
        cache.1.get(mime_type).cloned()
    });

    if let Some(extractor) = cached {
        return Ok(extractor);
    }

    let extractor = {
        let registry = crate::plugins::registry::get_document_extractor_registry();
        let registry_read = registry
            .read()
            .map_err(|e| KreuzbergError::Other(format!("Extractor registry lock poisoned: {e}")))?;
        registry_read.get(mime_type)?
    };

    EXTRACTOR_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.0 == generation {
            cache.1.insert(mime_type.to_string(), Arc::clone(&extractor));
        }
    });

    Ok(extractor)
}

fn document_cache_key(path: &Path, stat: &SourceStat, mime_type: &str, config: &ExtractionConfig) -> String {
    let canonical = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string();
    let size = stat.size.to_string();
    let mtime = stat.mtime_ns.to_string();
    let config_material = config.cache_key_material();

    generate_cache_key(&[
        ("path", canonical.as_str()),
        ("size", size.as_str()),
        ("mtime_ns", mtime.as_str()),
        ("mime", mime_type),
        ("config", config_material.as_str()),
    ])
}

fn read_cached_result(cache_key: &str, source: &Path) -> Result<Option<ExtractionResult>> {
    let Some(bytes) = get_document_cache().get(cache_key, Some(source))? else {
        return Ok(None);
    };

    match rmp_serde::from_slice(&bytes) {
        Ok(result) => Ok(Some(result)),
        Err(e) => {
            tracing::warn!(key = %cache_key, error = %e, "corrupt document cache entry; treating as miss");
            Ok(None)
        }
    }
}

/// Completes the document-cache ticket on every exit path, including
/// cancellation of the owning future.
struct TicketGuard {
    key: Option<String>,
}

impl TicketGuard {
    /// Wrap an already-claimed ticket; completion fires on drop.
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
            get_document_cache().mark_complete(&key);
        }
    }
}

/// Extract content from a file.
///
/// Steps: validate the path, resolve the MIME type, consult the document
/// cache (converging concurrent callers on one compute via the ticket
/// table), dispatch to the extractor, run the post-processing pipeline, and
/// store the result.
///
/// # Errors
///
/// `KreuzbergError::Validation` for a missing file or bad MIME hint,
/// `KreuzbergError::UnsupportedFormat` for unknown types,
/// `KreuzbergError::Io` for I/O faults (always bubbles up).
pub async fn extract_file(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    use crate::core::{io, mime};

    let path = path.as_ref();

    io::validate_file_exists(path)?;
    config.validate()?;

    let detected_mime = mime::detect_or_validate(Some(path), None, mime_type)?;

    crate::extractors::ensure_initialized()?;

    let mut ticket_guard = TicketGuard::disabled();
    let mut cache_key = None;

    if config.use_cache {
        let stat = SourceStat::for_path(path)?;
        let key = document_cache_key(path, &stat, &detected_mime, config);

        if let Some(hit) = read_cached_result(&key, path)? {
            return Ok(hit);
        }

        // Converge concurrent callers on a single compute: the first caller
        // claims the ticket, everyone else blocks on its completion edge and
        // re-reads the store. A waiter whose owner failed to produce an
        // entry loops around and claims the ticket itself.
        loop {
            match get_document_cache().begin_processing(&key) {
                crate::cache::TicketAttempt::Owner(_) => {
                    ticket_guard = TicketGuard::owned(&key);
                    // A previous compute may have finished between the first
                    // read and this claim.
                    if let Some(hit) = read_cached_result(&key, path)? {
                        return Ok(hit);
                    }
                    break;
                }
                crate::cache::TicketAttempt::Waiter(_) => {
                    let wait_key = key.clone();
                    tokio::task::spawn_blocking(move || get_document_cache().wait_for(&wait_key))
                        .await
                        .map_err(|e| KreuzbergError::Other(format!("Ticket wait task failed: {e}")))?;

                    if let Some(hit) = read_cached_result(&key, path)? {
                        return Ok(hit);
                    }
                }
            }
        }

        cache_key = Some(key);
    }

    let extractor = get_extractor_cached(&detected_mime)?;

    let mut result = extractor.extract_file(path, &detected_mime, config).await?;
    result = crate::core::pipeline::run_pipeline(result, config).await?;

    if let Some(key) = &cache_key {
        match rmp_serde::to_vec_named(&result) {
            Ok(bytes) => {
                if let Err(e) = get_document_cache().set(key, &bytes, Some(path)) {
                    tracing::warn!(key = %key, error = %e, "failed to store document cache entry");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize result for cache"),
        }
    }

    drop(ticket_guard);

    Ok(result)
}

/// Extract content from a byte buffer.
///
/// When no MIME type is supplied, the buffer is sniffed; sniff results are
/// memoized in the MIME cache keyed by a prefix digest.
pub async fn extract_bytes(
    content: &[u8],
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    use crate::core::mime;

    config.validate()?;

    let validated_mime = match mime_type {
        Some(hint) => mime::validate_mime_type(hint)?,
        None => resolve_mime_cached(content)?,
    };

    crate::extractors::ensure_initialized()?;

    let extractor = get_extractor_cached(&validated_mime)?;

    let mut result = extractor.extract_bytes(content, &validated_mime, config).await?;
    result = crate::core::pipeline::run_pipeline(result, config).await?;

    Ok(result)
}

/// Buffer MIME sniffing with on-disk memoization.
fn resolve_mime_cached(content: &[u8]) -> Result<String> {
    use crate::core::mime;

    let prefix = &content[..content.len().min(1024)];
    let digest = format!("{:016x}", crate::cache::fast_hash(prefix));
    let length = content.len().to_string();
    let key = generate_cache_key(&[("mime_prefix", digest.as_str()), ("len", length.as_str())]);

    if let Ok(Some(bytes)) = get_mime_cache().get(&key, None) {
        if let Ok(cached) = String::from_utf8(bytes) {
            if mime::is_supported(&cached) {
                return Ok(cached);
            }
        }
    }

    let detected = mime::detect_mime_from_bytes(content)?;
    let _ = get_mime_cache().set(&key, detected.as_bytes(), None);
    Ok(detected)
}

fn error_result(error: &KreuzbergError) -> ExtractionResult {
    let mut result = ExtractionResult::new(String::new(), "text/plain");
    result.metadata.error = Some(ErrorMetadata {
        error_type: error.kind().to_string(),
        message: error.to_string(),
    });
    result
}

/// Extract multiple files concurrently.
///
/// Output order matches input order regardless of completion order.
/// Per-item failures become results with `metadata.error` populated; fatal
/// errors fail the whole batch.
pub async fn batch_extract_file(
    paths: Vec<impl AsRef<Path>>,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractionResult>> {
    use tokio::task::JoinSet;

    if paths.is_empty() {
        return Ok(vec![]);
    }

    let config = Arc::new(config.clone());
    let mut tasks = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let path_buf = path.as_ref().to_path_buf();
        let task_config = Arc::clone(&config);

        tasks.spawn(async move {
            let result = extract_file(&path_buf, None, &task_config).await;
            (index, result)
        });
    }

    let mut results: Vec<Option<ExtractionResult>> = (0..tasks.len()).map(|_| None).collect();

    while let Some(task_result) = tasks.join_next().await {
        match task_result {
            Ok((index, Ok(result))) => results[index] = Some(result),
            Ok((index, Err(e))) => {
                if e.is_fatal() {
                    return Err(e);
                }
                results[index] = Some(error_result(&e));
            }
            Err(join_error) => {
                return Err(KreuzbergError::Other(format!("Batch task panicked: {join_error}")));
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}

/// Extract multiple byte buffers concurrently; same ordering and failure
/// semantics as [`batch_extract_file`].
pub async fn batch_extract_bytes(
    contents: Vec<(&[u8], &str)>,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractionResult>> {
    use tokio::task::JoinSet;

    if contents.is_empty() {
        return Ok(vec![]);
    }

    let config = Arc::new(config.clone());
    let owned: Vec<(Vec<u8>, String)> = contents
        .into_iter()
        .map(|(bytes, mime)| (bytes.to_vec(), mime.to_string()))
        .collect();

    let mut tasks = JoinSet::new();

    for (index, (bytes, mime)) in owned.into_iter().enumerate() {
        let task_config = Arc::clone(&config);

        tasks.spawn(async move {
            let result = extract_bytes(&bytes, Some(&mime), &task_config).await;
            (index, result)
        });
    }

    let mut results: Vec<Option<ExtractionResult>> = (0..tasks.len()).map(|_| None).collect();

    while let Some(task_result) = tasks.join_next().await {
        match task_result {
            Ok((index, Ok(result))) => results[index] = Some(result),
            Ok((index, Err(e))) => {
                if e.is_fatal() {
                    return Err(e);
                }
                results[index] = Some(error_result(&e));
            }
            Err(join_error) => {
                return Err(KreuzbergError::Other(format!("Batch task panicked: {join_error}")));
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}

/// Synchronous wrapper for [`extract_file`], running on the shared global
/// runtime.
pub fn extract_file_sync(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_file(path, mime_type, config))
}

/// Synchronous wrapper for [`extract_bytes`].
pub fn extract_bytes_sync(
    content: &[u8],
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_bytes(content, mime_type, config))
}

/// Synchronous wrapper for [`batch_extract_file`].
pub fn batch_extract_file_sync(
    paths: Vec<impl AsRef<Path>>,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractionResult>> {
    GLOBAL_RUNTIME.block_on(batch_extract_file(paths, config))
}

/// Synchronous wrapper for [`batch_extract_bytes`].
pub fn batch_extract_bytes_sync(
    contents: Vec<(&[u8], &str)>,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractionResult>> {
    GLOBAL_RUNTIME.block_on(batch_extract_bytes(contents, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn uncached_config() -> ExtractionConfig {
        ExtractionConfig {
            use_cache: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_extract_file_basic() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        File::create(&file_path).unwrap().write_all(b"Hello, world!").unwrap();

        let result = extract_file(&file_path, None, &uncached_config()).await.unwrap();
        assert_eq!(result.content, "Hello, world!");
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_extract_file_with_mime_override() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.dat");
        File::create(&file_path).unwrap().write_all(b"test content").unwrap();

        let result = extract_file(&file_path, Some("text/plain"), &uncached_config()).await.unwrap();
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_extract_file_nonexistent() {
        let result = extract_file("/nonexistent/file.txt", None, &uncached_config()).await;
        assert!(matches!(result, Err(KreuzbergError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_extract_bytes_basic() {
        let result = extract_bytes(b"test content", Some("text/plain"), &uncached_config())
            .await
            .unwrap();
        assert_eq!(result.content, "test content");
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_extract_bytes_sniffs_without_hint() {
        let result = extract_bytes(b"plain words in a buffer", None, &uncached_config())
            .await
            .unwrap();
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_extract_bytes_invalid_mime() {
        let result = extract_bytes(b"test", Some("invalid/mime"), &uncached_config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_extract_file_cache_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("cached.txt");
        File::create(&file_path).unwrap().write_all(b"cache me").unwrap();

        let config = ExtractionConfig::default();

        let first = extract_file(&file_path, None, &config).await.unwrap();
        let second = extract_file(&file_path, None, &config).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_cache_invalidated_on_source_change() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("changing.txt");
        File::create(&file_path).unwrap().write_all(b"version one").unwrap();

        let config = ExtractionConfig::default();

        let first = extract_file(&file_path, None, &config).await.unwrap();
        assert_eq!(first.content, "version one");

        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(&file_path, b"version two, now longer").unwrap();

        let second = extract_file(&file_path, None, &config).await.unwrap();
        assert_eq!(second.content, "version two, now longer");
    }

    #[tokio::test]
    async fn test_batch_extract_file_order() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for index in 0..4 {
            let path = dir.path().join(format!("file{index}.txt"));
            std::fs::write(&path, format!("content {index}")).unwrap();
            paths.push(path);
        }

        let results = batch_extract_file(paths, &uncached_config()).await.unwrap();
        assert_eq!(results.len(), 4);
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result.content, format!("content {index}"));
        }
    }

    #[tokio::test]
    async fn test_batch_continues_past_item_failure() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, b"fine").unwrap();
        let missing = dir.path().join("missing.txt");

        let results = batch_extract_file(vec![good, missing], &uncached_config()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "fine");

        let error = results[1].metadata.error.as_ref().unwrap();
        assert_eq!(error.error_type, "validation");
    }

    #[tokio::test]
    async fn test_batch_extract_bytes_order() {
        let contents: Vec<(&[u8], &str)> = vec![
            (b"alpha".as_slice(), "text/plain"),
            (b"beta".as_slice(), "text/plain"),
            (b"gamma".as_slice(), "text/plain"),
        ];

        let results = batch_extract_bytes(contents, &uncached_config()).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content, "alpha");
        assert_eq!(results[1].content, "beta");
        assert_eq!(results[2].content, "gamma");
    }

    #[tokio::test]
    async fn test_batch_empty() {
        let paths: Vec<std::path::PathBuf> = vec![];
        assert!(batch_extract_file(paths, &uncached_config()).await.unwrap().is_empty());
    }

    #[test]
    fn test_sync_wrappers() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sync.txt");
        File::create(&file_path).unwrap().write_all(b"sync test").unwrap();

        let config = uncached_config();

        let result = extract_file_sync(&file_path, None, &config).unwrap();
        assert_eq!(result.content, "sync test");

        let result = extract_bytes_sync(b"bytes", Some("text/plain"), &config).unwrap();
        assert_eq!(result.content, "bytes");
    }

    #[test]
    fn test_invalidate_extractor_cache_clears_memo() {
        crate::extractors::ensure_initialized().unwrap();

        let before = get_extractor_cached("text/plain").unwrap();
        invalidate_extractor_cache();
        let after = get_extractor_cached("text/plain").unwrap();

        // Same registered instance resolves, fetched fresh from the registry.
        assert_eq!(before.name(), after.name());
    }
}
