//! A cloneable handle for cancelling an interaction from UI code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for cancelling the current interaction.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone, Default)]
pub struct InteractionHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    is_running: Arc<AtomicBool>,
}

impl InteractionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the interaction in flight, if any.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether an interaction is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Install a fresh token for a new interaction and mark it running.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_running.store(true, Ordering::Release);
        token
    }

    pub(crate) fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_cancels_current_token() {
        let handle = InteractionHandle::new();
        let token = handle.begin();
        assert!(handle.is_running());

        handle.clone().abort();
        assert!(token.is_cancelled());

        handle.finish();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_begin_replaces_cancelled_token() {
        let handle = InteractionHandle::new();
        let first = handle.begin();
        handle.abort();
        let second = handle.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
