//! Cooperative cancellation for in-flight executions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation handle.
///
/// The interpreter polls the token between instructions; once cancelled, the
/// running call aborts with [`RuntimeError::Cancelled`]. Clones share one
/// flag, so a driver thread can cancel an execution it handed to the VM.
///
/// [`RuntimeError::Cancelled`]: super::RuntimeError::Cancelled
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent; there is no way back.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
