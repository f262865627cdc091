//! Content-addressed result caches with in-flight deduplication.
//!
//! Four logical caches (documents, OCR, tables, MIME inferences) share the
//! same on-disk store: one subdirectory per cache type, each entry a
//! `{key}.msgpack` payload plus a `{key}.meta` record of the source file's
//! (size, mtime_ns) and the store time. Both files are written to a
//! temporary name and renamed into place.
//!
//! In-flight deduplication is an in-memory ticket table: the first caller to
//! `mark_processing` a key computes; concurrent callers block on the
//! ticket's completion edge and then re-read the store.

use crate::core::io::SourceStat;
use crate::error::{KreuzbergError, Result};
use ahash::AHasher;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use crate::types::CacheStats;

/// Bumped whenever the cached value schema changes; part of every cache key
/// so stale entries from older layouts can never produce a hit.
pub const CACHE_SCHEMA_VERSION: &str = "v4";

const META_LEN: usize = 32;
const DEFAULT_MAX_AGE_DAYS: f64 = 30.0;
const DEFAULT_MAX_CACHE_SIZE_MB: f64 = 500.0;
const DEFAULT_MIN_FREE_SPACE_MB: f64 = 1000.0;

/// Bounded wait so tickets left dangling by a cancelled compute clear.
const TICKET_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// In-memory marker preventing concurrent duplicate compute on a cache key.
///
/// All waiters on the same key observe the same completion edge.
pub struct ProcessingTicket {
    completed: Mutex<bool>,
    condvar: Condvar,
}

impl ProcessingTicket {
    fn new() -> Self {
        Self {
            completed: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block until the ticket completes or the timeout elapses. Returns
    /// whether the completion edge was observed.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self
            .completed
            .lock()
            .expect("ticket mutex poisoned: a holder panicked mid-compute");
        let (guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |completed| !*completed)
            .expect("ticket mutex poisoned: a holder panicked mid-compute");
        drop(guard);
        !result.timed_out()
    }

    fn complete(&self) {
        let mut guard = self
            .completed
            .lock()
            .expect("ticket mutex poisoned: a holder panicked mid-compute");
        *guard = true;
        self.condvar.notify_all();
    }
}

/// Result of an atomic ticket acquisition.
pub enum TicketAttempt {
    /// This caller claimed the compute and must call `mark_complete`.
    Owner(Arc<ProcessingTicket>),
    /// Another caller is computing; block on the ticket then re-read.
    Waiter(Arc<ProcessingTicket>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
    stored_at: SystemTime,
}

struct CacheScanResult {
    stats: CacheStats,
    entries: Vec<CacheEntry>,
}

pub struct GenericCache {
    cache_dir: PathBuf,
    cache_type: String,
    max_age_days: f64,
    max_cache_size_mb: f64,
    min_free_space_mb: f64,
    tickets: Mutex<HashMap<String, Arc<ProcessingTicket>>>,
}

impl GenericCache {
    pub fn new(
        cache_type: String,
        cache_dir: Option<PathBuf>,
        max_age_days: f64,
        max_cache_size_mb: f64,
        min_free_space_mb: f64,
    ) -> Result<Self> {
        let cache_dir_path = cache_dir
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".kreuzberg")
            })
            .join(&cache_type);

        fs::create_dir_all(&cache_dir_path)
            .map_err(|e| KreuzbergError::cache(format!("Failed to create cache directory: {e}")))?;

        Ok(Self {
            cache_dir: cache_dir_path,
            cache_type,
            max_age_days,
            max_cache_size_mb,
            min_free_space_mb,
            tickets: Mutex::new(HashMap::new()),
        })
    }

    fn payload_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir.join(format!("{cache_key}.msgpack"))
    }

    fn meta_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir.join(format!("{cache_key}.meta"))
    }

    fn read_meta(&self, cache_key: &str) -> Option<(SourceStat, SystemTime)> {
        let bytes = fs::read(self.meta_path(cache_key)).ok()?;
        if bytes.len() < META_LEN {
            return None;
        }

        let size = u64::from_le_bytes(bytes[0..8].try_into().ok()?);
        let mtime_ns = u128::from_le_bytes(bytes[8..24].try_into().ok()?);
        let stored_secs = u64::from_le_bytes(bytes[24..32].try_into().ok()?);

        Some((
            SourceStat { size, mtime_ns },
            UNIX_EPOCH + Duration::from_secs(stored_secs),
        ))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, data).map_err(|e| KreuzbergError::cache(format!("Failed to write cache file: {e}")))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            KreuzbergError::cache(format!("Failed to commit cache file: {e}"))
        })
    }

    fn is_valid(&self, cache_key: &str, source_file: Option<&Path>) -> bool {
        let payload = self.payload_path(cache_key);
        if !payload.exists() {
            return false;
        }

        let meta = self.read_meta(cache_key);

        let stored_at = match &meta {
            Some((_, stored_at)) => *stored_at,
            // Entries written before the meta record existed age by payload mtime.
            None => match fs::metadata(&payload).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => return false,
            },
        };

        if let Ok(elapsed) = SystemTime::now().duration_since(stored_at) {
            let age_days = elapsed.as_secs_f64() / (24.0 * 3600.0);
            if age_days > self.max_age_days {
                return false;
            }
        }

        if let Some(source_path) = source_file {
            let Some((recorded, _)) = meta else {
                return false;
            };
            let Ok(current) = SourceStat::for_path(source_path) else {
                return false;
            };
            return recorded == current;
        }

        true
    }

    /// Read an entry, validating TTL and source freshness. Stale or corrupt
    /// entries are deleted and reported as a miss.
    pub fn get(&self, cache_key: &str, source_file: Option<&Path>) -> Result<Option<Vec<u8>>> {
        if !self.is_valid(cache_key, source_file) {
            self.remove_entry(cache_key);
            return Ok(None);
        }

        match fs::read(self.payload_path(cache_key)) {
            Ok(content) => Ok(Some(content)),
            Err(_) => {
                self.remove_entry(cache_key);
                Ok(None)
            }
        }
    }

    /// Store an entry atomically, recording the source file's stat when given.
    pub fn set(&self, cache_key: &str, data: &[u8], source_file: Option<&Path>) -> Result<()> {
        self.write_atomic(&self.payload_path(cache_key), data)?;

        let source_stat = source_file
            .and_then(|p| SourceStat::for_path(p).ok())
            .unwrap_or(SourceStat { size: 0, mtime_ns: 0 });
        let stored_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut meta = Vec::with_capacity(META_LEN);
        meta.extend_from_slice(&source_stat.size.to_le_bytes());
        meta.extend_from_slice(&source_stat.mtime_ns.to_le_bytes());
        meta.extend_from_slice(&stored_secs.to_le_bytes());
        self.write_atomic(&self.meta_path(cache_key), &meta)?;

        // Amortized cleanup: roughly one write in a hundred pays for a scan.
        let mut hasher = AHasher::default();
        cache_key.hash(&mut hasher);
        if hasher.finish() % 100 == 0 {
            if let Err(e) = self.cleanup() {
                tracing::warn!(cache_type = %self.cache_type, error = %e, "cache cleanup failed");
            }
        }

        Ok(())
    }

    fn remove_entry(&self, cache_key: &str) {
        let _ = fs::remove_file(self.payload_path(cache_key));
        let _ = fs::remove_file(self.meta_path(cache_key));
    }

    /// Whether a compute for this key is currently in flight in this process.
    pub fn is_processing(&self, cache_key: &str) -> bool {
        let tickets = self
            .tickets
            .lock()
            .expect("ticket table mutex poisoned: a holder panicked mid-compute");
        tickets.contains_key(cache_key)
    }

    /// Atomically claim or join the in-flight compute for a key.
    ///
    /// The first caller becomes the owner and must compute; every
    /// subsequent caller joins as a waiter on the same ticket. This is the
    /// single decision point that keeps at most one compute per (key,
    /// cache) pair in flight process-wide.
    pub fn begin_processing(&self, cache_key: &str) -> TicketAttempt {
        let mut tickets = self
            .tickets
            .lock()
            .expect("ticket table mutex poisoned: a holder panicked mid-compute");
        match tickets.entry(cache_key.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => TicketAttempt::Waiter(Arc::clone(entry.get())),
            std::collections::hash_map::Entry::Vacant(entry) => {
                TicketAttempt::Owner(Arc::clone(entry.insert(Arc::new(ProcessingTicket::new()))))
            }
        }
    }

    /// Register (or join) the in-flight compute for a key.
    ///
    /// Idempotent: repeated calls for the same key return the same ticket,
    /// so every waiter observes the same completion edge. Callers that need
    /// to know whether they won the compute use
    /// [`begin_processing`](Self::begin_processing) instead.
    pub fn mark_processing(&self, cache_key: &str) -> Arc<ProcessingTicket> {
        match self.begin_processing(cache_key) {
            TicketAttempt::Owner(ticket) | TicketAttempt::Waiter(ticket) => ticket,
        }
    }

    /// Release all waiters and drop the ticket.
    pub fn mark_complete(&self, cache_key: &str) {
        let ticket = {
            let mut tickets = self
                .tickets
                .lock()
                .expect("ticket table mutex poisoned: a holder panicked mid-compute");
            tickets.remove(cache_key)
        };

        if let Some(ticket) = ticket {
            ticket.complete();
        }
    }

    /// Block on an in-flight compute, bounded by the ticket timeout so a
    /// cancelled compute cannot strand waiters; the next waiter clears the
    /// dangling ticket.
    pub fn wait_for(&self, cache_key: &str) {
        let ticket = {
            let tickets = self
                .tickets
                .lock()
                .expect("ticket table mutex poisoned: a holder panicked mid-compute");
            tickets.get(cache_key).cloned()
        };

        if let Some(ticket) = ticket {
            if !ticket.wait(TICKET_WAIT_TIMEOUT) {
                tracing::warn!(
                    cache_type = %self.cache_type,
                    key = %cache_key,
                    "cache ticket wait timed out; clearing dangling ticket"
                );
                self.mark_complete(cache_key);
            }
        }
    }

    pub fn clear(&self) -> Result<(usize, f64)> {
        clear_cache_directory(&self.cache_dir)
    }

    pub fn get_stats(&self) -> Result<CacheStats> {
        Ok(scan_cache_directory(&self.cache_dir)?.stats)
    }

    /// TTL pass first, then oldest-stored-at eviction down to the byte
    /// budget when the directory overflows or free space runs low.
    pub fn cleanup(&self) -> Result<(usize, f64)> {
        let stats = self.get_stats()?;
        let needs_cleanup = stats.available_space_mb < self.min_free_space_mb
            || stats.total_size_mb > self.max_cache_size_mb
            || stats.oldest_file_age_days > self.max_age_days;

        if !needs_cleanup {
            return Ok((0, 0.0));
        }

        let target_ratio = if stats.available_space_mb < self.min_free_space_mb {
            0.5
        } else {
            0.8
        };

        cleanup_cache(&self.cache_dir, self.max_age_days, self.max_cache_size_mb, target_ratio)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_type(&self) -> &str {
        &self.cache_type
    }
}

/// Stable cache key over a logical argument mapping.
///
/// Canonicalizes by sorted keys, hashes the joined `key=value` string, and
/// emits a fixed-length hex digest. Identical inputs produce identical keys
/// across processes; the schema version is folded in so key layout changes
/// invalidate old entries.
pub fn generate_cache_key(parts: &[(&str, &str)]) -> String {
    if parts.is_empty() {
        return "empty".to_string();
    }

    let mut sorted_parts: Vec<_> = parts.to_vec();
    sorted_parts.sort_by_key(|(k, _)| *k);

    let estimated = sorted_parts.iter().map(|(k, v)| k.len() + v.len() + 2).sum::<usize>();
    let mut cache_str = String::with_capacity(estimated + CACHE_SCHEMA_VERSION.len() + 8);
    cache_str.push_str("schema=");
    cache_str.push_str(CACHE_SCHEMA_VERSION);

    for (key, val) in &sorted_parts {
        cache_str.push('&');
        cache_str.push_str(key);
        cache_str.push('=');
        cache_str.push_str(val);
    }

    let mut hasher = AHasher::default();
    cache_str.hash(&mut hasher);
    format!("{:032x}", hasher.finish())
}

/// Fast content digest used for image/buffer identity in cache keys.
pub fn fast_hash(data: &[u8]) -> u64 {
    let mut hasher = AHasher::default();
    data.hash(&mut hasher);
    hasher.finish()
}

pub fn validate_cache_key(key: &str) -> bool {
    key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn get_available_disk_space(path: &Path) -> Result<f64> {
    #[cfg(unix)]
    {
        let check_path = if path.exists() {
            path
        } else if let Some(parent) = path.parent() {
            parent
        } else {
            Path::new("/")
        };

        use std::ffi::CString;

        let path_str = check_path
            .to_str()
            .ok_or_else(|| KreuzbergError::validation("Path contains invalid UTF-8".to_string()))?;
        let c_path = CString::new(path_str).map_err(|e| KreuzbergError::validation(format!("Invalid path: {e}")))?;

        // SAFETY: statvfs is a plain POSIX struct of integer fields and can be
        // zero-initialized per the C standard.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

        // SAFETY: c_path is a valid null-terminated C string and stat points to
        // a properly initialized statvfs struct.
        let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };

        if result == 0 {
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = stat.f_bavail as u64 * stat.f_frsize as u64;
            Ok(available_bytes as f64 / (1024.0 * 1024.0))
        } else {
            tracing::warn!(path = %path_str, errno = result, "statvfs failed");
            Ok(10000.0)
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(10000.0)
    }
}

fn scan_cache_directory(cache_dir: &Path) -> Result<CacheScanResult> {
    if !cache_dir.exists() {
        return Ok(CacheScanResult {
            stats: CacheStats {
                total_files: 0,
                total_size_mb: 0.0,
                available_space_mb: get_available_disk_space(cache_dir)?,
                oldest_file_age_days: 0.0,
                newest_file_age_days: 0.0,
            },
            entries: Vec::new(),
        });
    }

    let now = SystemTime::now();
    let read_dir =
        fs::read_dir(cache_dir).map_err(|e| KreuzbergError::cache(format!("Failed to read cache directory: {e}")))?;

    let mut total_size = 0u64;
    let mut oldest_age = 0.0f64;
    let mut newest_age = f64::INFINITY;
    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "error reading cache entry");
                continue;
            }
        };

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("msgpack") {
            continue;
        }

        let stored_at = metadata.modified().unwrap_or(UNIX_EPOCH);
        let size = metadata.len();
        total_size += size;

        if let Ok(age) = now.duration_since(stored_at) {
            let age_days = age.as_secs_f64() / (24.0 * 3600.0);
            oldest_age = oldest_age.max(age_days);
            newest_age = newest_age.min(age_days);
        }

        entries.push(CacheEntry { path, size, stored_at });
    }

    if entries.is_empty() {
        oldest_age = 0.0;
        newest_age = 0.0;
    }

    Ok(CacheScanResult {
        stats: CacheStats {
            total_files: entries.len(),
            total_size_mb: total_size as f64 / (1024.0 * 1024.0),
            available_space_mb: get_available_disk_space(cache_dir)?,
            oldest_file_age_days: oldest_age,
            newest_file_age_days: newest_age,
        },
        entries,
    })
}

fn remove_entry_files(path: &Path) {
    let _ = fs::remove_file(path);
    let _ = fs::remove_file(path.with_extension("meta"));
}

pub fn cleanup_cache(
    cache_dir: &Path,
    max_age_days: f64,
    max_size_mb: f64,
    target_size_ratio: f64,
) -> Result<(usize, f64)> {
    let scan = scan_cache_directory(cache_dir)?;
    if scan.entries.is_empty() {
        return Ok((0, 0.0));
    }

    let now = SystemTime::now();
    let max_age = Duration::from_secs_f64(max_age_days * 24.0 * 3600.0);

    let mut removed_count = 0;
    let mut removed_size = 0.0;
    let mut remaining = Vec::new();
    let mut remaining_size = 0u64;

    for entry in scan.entries {
        let expired = now
            .duration_since(entry.stored_at)
            .map(|age| age > max_age)
            .unwrap_or(false);

        if expired {
            remove_entry_files(&entry.path);
            removed_count += 1;
            removed_size += entry.size as f64 / (1024.0 * 1024.0);
        } else {
            remaining_size += entry.size;
            remaining.push(entry);
        }
    }

    let mut total_size_mb = remaining_size as f64 / (1024.0 * 1024.0);

    if total_size_mb > max_size_mb {
        remaining.sort_by_key(|e| e.stored_at);
        let target_size = max_size_mb * target_size_ratio;

        for entry in remaining {
            if total_size_mb <= target_size {
                break;
            }

            let size_mb = entry.size as f64 / (1024.0 * 1024.0);
            remove_entry_files(&entry.path);
            removed_count += 1;
            removed_size += size_mb;
            total_size_mb -= size_mb;
        }
    }

    Ok((removed_count, removed_size))
}

pub fn clear_cache_directory(cache_dir: &Path) -> Result<(usize, f64)> {
    if !cache_dir.exists() {
        return Ok((0, 0.0));
    }

    let scan = scan_cache_directory(cache_dir)?;
    let mut removed_count = 0;
    let mut removed_size = 0.0;

    for entry in scan.entries {
        remove_entry_files(&entry.path);
        removed_count += 1;
        removed_size += entry.size as f64 / (1024.0 * 1024.0);
    }

    Ok((removed_count, removed_size))
}

fn default_cache(cache_type: &str) -> GenericCache {
    GenericCache::new(
        cache_type.to_string(),
        None,
        DEFAULT_MAX_AGE_DAYS,
        DEFAULT_MAX_CACHE_SIZE_MB,
        DEFAULT_MIN_FREE_SPACE_MB,
    )
    .unwrap_or_else(|e| panic!("Failed to initialize {cache_type} cache: {e}"))
}

static DOCUMENT_CACHE: Lazy<GenericCache> = Lazy::new(|| default_cache("documents"));
static OCR_CACHE: Lazy<GenericCache> = Lazy::new(|| default_cache("ocr"));
static TABLE_CACHE: Lazy<GenericCache> = Lazy::new(|| default_cache("tables"));
static MIME_CACHE: Lazy<GenericCache> = Lazy::new(|| default_cache("mime"));

pub fn get_document_cache() -> &'static GenericCache {
    &DOCUMENT_CACHE
}

pub fn get_ocr_cache() -> &'static GenericCache {
    &OCR_CACHE
}

pub fn get_table_cache() -> &'static GenericCache {
    &TABLE_CACHE
}

pub fn get_mime_cache() -> &'static GenericCache {
    &MIME_CACHE
}

/// Clear every on-disk cache. Safe under concurrent extraction: in-flight
/// computes re-store their results afterwards.
pub fn clear_all_caches() -> Result<(usize, f64)> {
    let mut removed = 0;
    let mut freed = 0.0;
    for cache in [&*DOCUMENT_CACHE, &*OCR_CACHE, &*TABLE_CACHE, &*MIME_CACHE] {
        let (count, size) = cache.clear()?;
        removed += count;
        freed += size;
    }
    Ok((removed, freed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn test_cache(dir: &Path) -> GenericCache {
        GenericCache::new("test".to_string(), Some(dir.to_path_buf()), 30.0, 500.0, 1000.0).unwrap()
    }

    #[test]
    fn test_generate_cache_key_empty() {
        assert_eq!(generate_cache_key(&[]), "empty");
    }

    #[test]
    fn test_generate_cache_key_consistent_and_order_free() {
        let key1 = generate_cache_key(&[("a", "1"), ("b", "2")]);
        let key2 = generate_cache_key(&[("b", "2"), ("a", "1")]);
        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 32);
        assert!(validate_cache_key(&key1));
    }

    #[test]
    fn test_generate_cache_key_distinct_inputs() {
        let key1 = generate_cache_key(&[("path", "/a"), ("size", "10")]);
        let key2 = generate_cache_key(&[("path", "/a"), ("size", "11")]);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_fast_hash_deterministic() {
        assert_eq!(fast_hash(b"same"), fast_hash(b"same"));
        assert_ne!(fast_hash(b"one"), fast_hash(b"two"));
    }

    #[test]
    fn test_get_set_roundtrip() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.set("key1", b"payload", None).unwrap();
        assert_eq!(cache.get("key1", None).unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get("missing", None).unwrap(), None);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());
        cache.set("key1", b"payload", None).unwrap();

        let leftovers: Vec<_> = fs::read_dir(cache.cache_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().contains("tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_source_file_invalidation() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"original").unwrap();

        cache.set("key1", b"cached", Some(&source)).unwrap();
        assert_eq!(cache.get("key1", Some(&source)).unwrap(), Some(b"cached".to_vec()));

        std::thread::sleep(Duration::from_millis(10));
        std::fs::write(&source, b"modified content with different size").unwrap();

        assert_eq!(cache.get("key1", Some(&source)).unwrap(), None);
        // Stale entry was deleted on lookup.
        assert!(!cache.payload_path("key1").exists());
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let dir = tempdir().unwrap();
        let cache = GenericCache::new(
            "test".to_string(),
            Some(dir.path().to_path_buf()),
            0.000001,
            500.0,
            1000.0,
        )
        .unwrap();

        cache.set("key1", b"payload", None).unwrap();

        // Age the meta record past the TTL.
        let meta_path = cache.meta_path("key1");
        let mut meta = fs::read(&meta_path).unwrap();
        let old_secs = (SystemTime::now().duration_since(UNIX_EPOCH).unwrap() - Duration::from_secs(3600)).as_secs();
        meta[24..32].copy_from_slice(&old_secs.to_le_bytes());
        fs::write(&meta_path, meta).unwrap();

        assert_eq!(cache.get("key1", None).unwrap(), None);
    }

    #[test]
    fn test_begin_processing_single_owner() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        assert!(matches!(cache.begin_processing("key"), TicketAttempt::Owner(_)));
        assert!(matches!(cache.begin_processing("key"), TicketAttempt::Waiter(_)));
        assert!(matches!(cache.begin_processing("key"), TicketAttempt::Waiter(_)));

        cache.mark_complete("key");
        assert!(matches!(cache.begin_processing("key"), TicketAttempt::Owner(_)));
        cache.mark_complete("key");
    }

    #[test]
    fn test_ticket_lifecycle() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        assert!(!cache.is_processing("key1"));

        let ticket_a = cache.mark_processing("key1");
        let ticket_b = cache.mark_processing("key1");
        assert!(Arc::ptr_eq(&ticket_a, &ticket_b));
        assert!(cache.is_processing("key1"));

        cache.mark_complete("key1");
        assert!(!cache.is_processing("key1"));
        assert!(ticket_a.wait(Duration::from_millis(1)));
    }

    #[test]
    fn test_ticket_releases_waiters() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(test_cache(dir.path()));

        let ticket = cache.mark_processing("key1");

        let waiter_cache = Arc::clone(&cache);
        let waiter = std::thread::spawn(move || {
            waiter_cache.wait_for("key1");
            waiter_cache.is_processing("key1")
        });

        std::thread::sleep(Duration::from_millis(50));
        cache.mark_complete("key1");

        assert!(!waiter.join().unwrap());
        assert!(ticket.wait(Duration::from_millis(1)));
    }

    #[test]
    fn test_cleanup_evicts_oldest_first() {
        let dir = tempdir().unwrap();

        let old_path = dir.path().join("old.msgpack");
        let new_path = dir.path().join("new.msgpack");
        let mut f = fs::File::create(&old_path).unwrap();
        f.write_all(&[0u8; 1024]).unwrap();
        drop(f);
        let mut f = fs::File::create(&new_path).unwrap();
        f.write_all(&[0u8; 1024]).unwrap();
        drop(f);

        let old_time = SystemTime::now() - Duration::from_secs(3600);
        filetime::set_file_mtime(&old_path, filetime::FileTime::from_system_time(old_time)).unwrap();

        // Budget of ~1KB forces evicting exactly one entry: the older one.
        let (removed, _) = cleanup_cache(dir.path(), 365.0, 0.0015, 0.9).unwrap();
        assert_eq!(removed, 1);
        assert!(!old_path.exists());
        assert!(new_path.exists());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.set("key1", b"data1", None).unwrap();
        cache.set("key2", b"data2", None).unwrap();

        let (removed, _) = cache.clear().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get("key1", None).unwrap(), None);
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.set("key1", b"data1", None).unwrap();
        cache.set("key2", b"data2", None).unwrap();

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_files, 2);
        assert!(stats.total_size_mb > 0.0);
        assert!(stats.available_space_mb > 0.0);
    }

    #[test]
    fn test_corrupt_meta_treated_as_miss_with_source() {
        let dir = tempdir().unwrap();
        let cache = test_cache(dir.path());

        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"content").unwrap();

        cache.set("key1", b"payload", Some(&source)).unwrap();
        fs::write(cache.meta_path("key1"), b"short").unwrap();

        assert_eq!(cache.get("key1", Some(&source)).unwrap(), None);
    }
}
