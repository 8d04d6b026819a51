//! Cooperative cancellation for in-flight orchestrations.
//!
//! A [`CancelToken`] is observed by the poll loop at every suspension
//! point: before each network call and during each backoff sleep.
//! Cancellation surfaces as a distinct `PollError::Cancelled`, never as a
//! timeout or transport error.

use tokio::sync::watch;

/// Caller-side handle that triggers cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the associated orchestration.
    ///
    /// Idempotent; observed by the token at its next suspension point.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Engine-side token checked at suspension points.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a linked handle/token pair.
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token that can never be cancelled.
    ///
    /// The sender side is dropped immediately; `cancelled()` treats a
    /// closed-without-cancel channel as pending forever.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested.
    ///
    /// If the handle was dropped without cancelling, this pends forever;
    /// callers race it against a sleep or network future in `select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling; never resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
