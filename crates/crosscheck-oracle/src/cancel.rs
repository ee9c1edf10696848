//! Cooperative cancellation for blocking process waits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Shared cancellation flag with an optional hard deadline.
///
/// Clones share the flag, so one token can cover a whole campaign: cancelling
/// it unblocks every in-flight process wait within one poll interval. The
/// flag store is async-signal-safe, which allows a signal handler to call
/// [`CancelToken::cancel`] on a token stored in a static.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token with no deadline; trips only via [`CancelToken::cancel`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips once `deadline` passes.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Clone of this token that additionally trips once `deadline` passes.
    /// The flag stays shared, so cancelling either token cancels both.
    #[must_use]
    pub fn deadline_at(&self, deadline: Instant) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
