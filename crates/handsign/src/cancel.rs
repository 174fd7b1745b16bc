//! Cooperative cancellation for worker threads.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared flag that long-running workers poll to find out when they should stop.
///
/// Clones share the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns a guard that cancels this token when dropped.
    ///
    /// The guard cancels on every exit path, including unwinding.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// Drop guard returned by [`CancellationToken::cancel_on_drop`].
#[must_use = "`CancelOnDrop` should be assigned to a variable, or it will cancel immediately"]
pub struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn guard_cancels_on_unwind() {
        let token = CancellationToken::new();
        catch_unwind(AssertUnwindSafe(|| {
            let _guard = token.cancel_on_drop();
            panic!("worker failed");
        }))
        .unwrap_err();
        assert!(token.is_cancelled());
    }
}
