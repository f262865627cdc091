//! Memory-aware worker pool for out-of-process and blocking work.
//!
//! Abstracts the process boundary for OCR backends and office-suite
//! conversions: bounded concurrency via a semaphore, an active-task counter
//! that is decremented on every exit path, and worker sizing derived from a
//! memory budget.

use crate::error::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Fraction of total memory used for the default budget.
const DEFAULT_MEMORY_FRACTION: f64 = 0.75;

/// Decrements the active-task counter on every exit path, panics included.
struct ActiveTaskGuard(Arc<AtomicUsize>);

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProcessPoolManager {
    max_processes: usize,
    memory_limit_gb: f64,
    semaphore: Arc<Semaphore>,
    active_tasks: Arc<AtomicUsize>,
    shut_down: AtomicBool,
}

impl ProcessPoolManager {
    /// `max_processes` defaults to the CPU count, `memory_limit_gb` to 75%
    /// of total system memory.
    pub fn new(max_processes: Option<usize>, memory_limit_gb: Option<f64>) -> Self {
        let max_processes = max_processes.unwrap_or_else(num_cpus::get).max(1);
        let memory_limit_gb = memory_limit_gb
            .unwrap_or_else(|| total_memory_gb() * DEFAULT_MEMORY_FRACTION)
            .max(0.0);

        Self {
            max_processes,
            memory_limit_gb,
            semaphore: Arc::new(Semaphore::new(max_processes)),
            active_tasks: Arc::new(AtomicUsize::new(0)),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn max_processes(&self) -> usize {
        self.max_processes
    }

    pub fn memory_limit_gb(&self) -> f64 {
        self.memory_limit_gb
    }

    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Worker count bounded by CPU and per-task memory, never below 1.
    pub fn get_optimal_workers(&self, task_memory_mb: f64) -> usize {
        if task_memory_mb <= 0.0 {
            return self.max_processes;
        }

        let memory_workers = (self.memory_limit_gb * 1024.0 / task_memory_mb).floor() as usize;
        self.max_processes.min(memory_workers).max(1)
    }

    /// Run a blocking task on a pool worker.
    ///
    /// The active-task counter is incremented on submit and decremented on
    /// completion, including failure and panic.
    pub async fn submit_task<F, T>(&self, task: F, _task_memory_mb: f64) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(KreuzbergError::validation("Process pool is shut down"));
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| KreuzbergError::validation("Process pool is shut down"))?;

        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveTaskGuard(Arc::clone(&self.active_tasks));

        let join_result = tokio::task::spawn_blocking(move || {
            let result = task();
            drop(permit);
            drop(guard);
            result
        })
        .await;

        match join_result {
            Ok(result) => result,
            Err(join_error) => Err(KreuzbergError::Other(format!("Pool worker panicked: {join_error}"))),
        }
    }

    /// Run a batch with bounded concurrency, preserving input order.
    pub async fn submit_batch<F, T>(&self, tasks: Vec<F>, max_concurrent: usize, task_memory_mb: f64) -> Vec<Result<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let limit = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let limit = Arc::clone(&limit);
            let semaphore = Arc::clone(&self.semaphore);
            let counter = Arc::clone(&self.active_tasks);
            let shut_down = self.shut_down.load(Ordering::SeqCst);

            handles.push(tokio::spawn(async move {
                if shut_down {
                    return Err(KreuzbergError::validation("Process pool is shut down"));
                }

                let _batch_permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|_| KreuzbergError::validation("Process pool is shut down"))?;
                let pool_permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| KreuzbergError::validation("Process pool is shut down"))?;

                counter.fetch_add(1, Ordering::SeqCst);
                let guard = ActiveTaskGuard(counter);
                let join_result = tokio::task::spawn_blocking(move || {
                    let result = task();
                    drop(pool_permit);
                    drop(guard);
                    result
                })
                .await;

                match join_result {
                    Ok(result) => result,
                    Err(join_error) => Err(KreuzbergError::Other(format!("Pool worker panicked: {join_error}"))),
                }
            }));
        }

        let _ = task_memory_mb;

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_error) => results.push(Err(KreuzbergError::Other(format!(
                    "Batch task panicked: {join_error}"
                )))),
            }
        }
        results
    }

    /// Stop accepting work. With `wait`, block until active tasks drain.
    pub async fn shutdown(&self, wait: bool) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.semaphore.close();

        if wait {
            while self.active_tasks.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }
    }
}

/// Total system memory in GiB; a conservative default when the probe fails.
pub fn total_memory_gb() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf with valid names has no preconditions.
        let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };

        if pages > 0 && page_size > 0 {
            return (pages as f64 * page_size as f64) / (1024.0 * 1024.0 * 1024.0);
        }
    }

    8.0
}

/// Process-wide pool shared by the OCR pipeline and office conversions.
static GLOBAL_POOL: Lazy<ProcessPoolManager> = Lazy::new(|| ProcessPoolManager::new(None, None));

pub fn global_pool() -> &'static ProcessPoolManager {
    &GLOBAL_POOL
}
