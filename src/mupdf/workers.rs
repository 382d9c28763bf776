//! Render worker pool
//!
//! MuPDF calls are CPU-bound and block the calling thread, so every call is
//! moved onto tokio's blocking pool. This module bounds how many of those
//! calls are in flight at once and tracks utilization.
//!
//! # Design
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       RenderWorkers                            │
//! │                                                                │
//! │  run(f) → acquire permit → spawn_blocking(f) → release permit  │
//! │               ↑                      ↓                         │
//! │      [waits when pool full]   [in_flight++ / in_flight--]      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The permit moves into the blocking closure, so a caller that stops
//! waiting (a cancelled run dropping its batch) does not free the slot
//! until MuPDF actually returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::WorkerConfig;
use crate::document::{DocumentError, DocumentResult};

/// Bounded gate in front of `spawn_blocking`
pub struct RenderWorkers {
    permits: Arc<Semaphore>,
    max_size: usize,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    completed: AtomicUsize,
}

/// Decrements `in_flight` when the blocking job ends, even on panic
struct JobGuard(Arc<Counters>);

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.0.completed.fetch_add(1, Ordering::Relaxed);
    }
}

impl RenderWorkers {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.max_concurrent_renders)
    }

    /// Run a blocking MuPDF job once a worker slot is free
    pub async fn run<F, R>(&self, job: F) -> DocumentResult<R>
    where
        F: FnOnce() -> DocumentResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| DocumentError::WorkerError(e.to_string()))?;

        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let guard = JobGuard(Arc::clone(&self.counters));

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            job()
        })
        .await
        .map_err(|e| DocumentError::WorkerError(format!("Task join error: {}", e)))?
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            max_size: self.max_size,
        }
    }
}

impl Default for RenderWorkers {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

/// Worker pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    /// Jobs currently running on the blocking pool
    pub in_flight: usize,
    /// Jobs finished since creation
    pub completed: usize,
    /// Maximum concurrent jobs
    pub max_size: usize,
}

/// Shared worker pool for a viewer session
pub type SharedRenderWorkers = Arc<RenderWorkers>;
