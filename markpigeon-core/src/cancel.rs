//! Cooperative cancellation for an in-flight publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared between the caller and the executor.
///
/// Cancelling stops new file actions from being dispatched; transfers already
/// in flight run to completion or failure. Files never dispatched are
/// recorded as `Cancelled` in the outcome map.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
