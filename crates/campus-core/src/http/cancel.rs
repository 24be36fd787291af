//! Cancellation handles
//!
//! A [`CancelHandle`] is cheap to clone and may be triggered from any task.
//! Triggering it after the call has settled is a no-op.

use std::sync::Arc;

use tokio::sync::watch;

/// Handle used to cancel an in-flight call
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// Create a handle that has not been triggered
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only ends on cancel
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
