//! Table operations.
//!
//! Each operation is a plain struct with a `configure` phase (validates
//! inputs and derives the output schema, before any row is touched) and an
//! `execute` phase (synchronous row processing). The caller owns the driver
//! loop and the [`ExecutionContext`].

pub mod aggregate;
pub mod filter;
pub mod relation;
pub mod reproject;

use anyhow::{Result, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::utils::ProgressCounter;

/// How often (in rows) execution polls the cancellation flag.
const CANCEL_POLL_INTERVAL: u64 = 1000;

/// Progress reporting plus coarse-grained, polled cancellation.
///
/// Cancellation is checked every [`CANCEL_POLL_INTERVAL`] rows, not
/// per-interrupt; a cancelled execution returns an error and the partial
/// output is discarded by the caller.
pub struct ExecutionContext {
    progress: ProgressCounter,
    cancel: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(label: &'static str) -> Self {
        Self {
            progress: ProgressCounter::new(label, CANCEL_POLL_INTERVAL),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel_flag(label: &'static str, cancel: Arc<AtomicBool>) -> Self {
        Self {
            progress: ProgressCounter::new(label, CANCEL_POLL_INTERVAL),
            cancel,
        }
    }

    /// Record one processed row and, at poll boundaries, check for
    /// cancellation.
    pub fn row_done(&self) -> Result<()> {
        self.progress.inc(1);
        if self.progress.count() % CANCEL_POLL_INTERVAL == 0 && self.is_cancelled() {
            bail!("Execution cancelled");
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.progress.finish();
    }
}
