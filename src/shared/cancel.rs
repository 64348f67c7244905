//! Cooperative cancellation for in-flight engine calls.

use tokio::sync::watch;

/// Caller-side half of a cancellation pair. Signalling after the call it was
/// passed to has already resolved is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a linked handle/token pair. The token is passed into a single
    /// `convert` call; the handle stays with the caller.
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// Request cancellation. Safe to call at any time, from any task.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested on this handle.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Call-side half of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Wait until cancellation is requested.
    ///
    /// Pends forever if the handle is dropped without signalling; dropping the
    /// handle is how callers walk away from a call they no longer intend to
    /// cancel.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without signalling.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Non-blocking probe.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, mut token) = CancelHandle::new();
        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_before_wait_resolves_immediately() {
        let (handle, mut token) = CancelHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already-cancelled token should resolve");
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_never_fires() {
        let (handle, mut token) = CancelHandle::new();
        drop(handle);
        let woke = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(woke.is_err(), "dropped handle must not look like a cancel");
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_after_resolve_is_noop() {
        let (handle, token) = CancelHandle::new();
        drop(token);
        // The call consumed and dropped the token; signalling must not panic.
        handle.cancel();
    }
}
