//! Run tokens for cooperative cancellation
//!
//! Every load run carries a [`RunToken`]. Starting a newer run cancels the
//! previous token; the pipeline checks it before and after each batch, and
//! the session checks it under its lock before any shared-state side effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::LoadError;

/// Identity and cancellation flag of one load run
#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl RunToken {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request cancellation; in-flight work finishes but is never committed
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(LoadError::Cancelled)` once cancelled
    pub fn check(&self) -> Result<(), LoadError> {
        if self.is_cancelled() {
            Err(LoadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Same run, compared by identity
    pub fn same_run(&self, other: &RunToken) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}
