//! Cooperative cancellation handle for the Arbiter's public operations
//! (spec §5: "on cancellation before commit, no audit entry and no state
//! mutation occur").
//!
//! There is no async runtime here, so cancellation is a flag the caller
//! flips from wherever it likes (another thread, a signal handler) and the
//! Arbiter polls at the one checkpoint that matters: immediately before the
//! commit section (audit append plus breaker/monitor mutation). Once that
//! checkpoint is passed the operation always runs to completion — per §5,
//! "a cancellation mid-commit is not possible."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap, cloneable handle that can be flipped to request cancellation of
/// an in-flight [`crate::engine::Engine`] operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_a_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
