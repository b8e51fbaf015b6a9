//! Bounded worker pool that runs every proxied call.
//!
//! Calls never run on the caller's own executor: blocking callers park on a
//! join handle while the pool drives the request, and async callers get the
//! handle back directly. Sharing one pool between both paths keeps retry and
//! timeout behavior identical.

use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;

use courier_client::{Error, Result};
use courier_config::{ClientConfig, DEFAULT_WORKER_THREADS};
use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Thread name prefix for pool workers.
const THREAD_NAME: &str = "courier-worker";

static SHARED: Mutex<Option<Arc<WorkerPool>>> = parking_lot::const_mutex(None);

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Check if the current thread is a worker of some [`WorkerPool`].
pub fn on_worker_thread() -> bool {
    ON_WORKER.with(Cell::get)
}

/// A dedicated multi-threaded runtime with a fixed number of workers.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    threads: usize,
}

impl WorkerPool {
    /// Start a pool with `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::config("worker pool needs at least one thread"));
        }

        // Must be multi-threaded: blocking callers park while workers drive I/O.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name(THREAD_NAME)
            .on_thread_start(|| ON_WORKER.with(|flag| flag.set(true)))
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("failed to start worker pool: {}", e)))?;

        tracing::debug!(threads, "started courier worker pool");
        Ok(Self {
            runtime: Some(runtime),
            threads,
        })
    }

    /// Start a pool sized by `config.worker_threads`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.worker_threads)
    }

    /// The process-wide pool, started on first use.
    pub fn shared() -> Result<Arc<WorkerPool>> {
        let mut shared = SHARED.lock();
        if let Some(pool) = shared.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(WorkerPool::new(DEFAULT_WORKER_THREADS)?);
        *shared = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Handle for spawning onto the pool.
    pub fn handle(&self) -> Result<Handle> {
        self.runtime
            .as_ref()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| Error::internal("worker pool is stopped"))
    }

    /// Run `future` on the pool.
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Ok(self.handle()?.spawn(future))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping a runtime from inside async code panics; detach instead.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}
