use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{LibraryError, Result};

/// Token for cooperative cancellation of scans, index builds and archive writes.
///
/// Clones share the same flag, so a caller can hand one clone to a worker and
/// keep another to cancel it.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns Ok(()) to continue, Err if cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }
        Ok(())
    }

    /// Guard that cancels this token when dropped unless disarmed first.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

/// Check an optional token; `None` never cancels.
pub(crate) fn checkpoint(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}

/// Cancels the wrapped token on drop. Returned by [`CancellationToken::drop_guard`].
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CancellationToken>,
}

impl CancelOnDrop {
    /// Release the guard without cancelling.
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
