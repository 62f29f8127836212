//! External close signal
//!
//! A `ShutdownHandle` may be cloned freely and closed from any task or
//! thread, any number of times. The session observes the matching
//! `ShutdownSignal`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Requests shutdown of a running client
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Resolves once shutdown has been requested
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Create a connected handle/signal pair
    pub fn pair() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, ShutdownSignal { rx })
    }

    /// Request shutdown. Later calls are no-ops.
    pub fn close(&self) {
        if self.tx.send_replace(true) {
            debug!("Shutdown already requested");
        } else {
            info!("Shutdown requested");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another signal observing this handle
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }
}

impl ShutdownSignal {
    /// Wait until shutdown is requested.
    ///
    /// Never resolves if every handle is dropped without closing.
    pub async fn closed(&mut self) {
        if self.rx.wait_for(|closed| *closed).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_wakes_signal() {
        let (handle, mut signal) = ShutdownHandle::pair();
        assert!(!signal.is_closed());

        let waiter = tokio::spawn(async move { signal.closed().await });
        handle.close();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_twice_is_harmless() {
        let (handle, mut signal) = ShutdownHandle::pair();
        handle.close();
        handle.clone().close();

        assert!(handle.is_closed());
        signal.closed().await;
        // Already closed: resolves again immediately
        signal.closed().await;
    }

    #[tokio::test]
    async fn test_late_signal_sees_close() {
        let (handle, _signal) = ShutdownHandle::pair();
        handle.close();

        let mut late = handle.signal();
        assert!(late.is_closed());
        late.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_resolves() {
        let (handle, mut signal) = ShutdownHandle::pair();
        drop(handle);

        let res = tokio::time::timeout(Duration::from_secs(60), signal.closed()).await;
        assert!(res.is_err());
    }
}
