// Worker Shutdown Token

use tokio::sync::watch;

/// Shutdown signal shared by workers, the lease keeper and the recovery ticker
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested (immediately if it already was)
    pub async fn wait(&mut self) {
        // Err means the sender is gone; treat as shutdown
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_signal_already_sent() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let mut late = token.clone();
        tokio::time::timeout(Duration::from_millis(100), late.wait())
            .await
            .expect("wait should resolve immediately");
        assert!(tx.token().is_shutdown());
    }

    #[tokio::test]
    async fn test_wait_resolves_when_sender_dropped() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);
        tokio::time::timeout(Duration::from_millis(100), token.wait())
            .await
            .expect("dropped sender ends the wait");
    }

    #[test]
    fn test_wait_is_pending_until_signal() {
        let (tx, mut token) = shutdown_channel();
        let mut wait = tokio_test::task::spawn(async move { token.wait().await });

        tokio_test::assert_pending!(wait.poll());
        tx.shutdown();
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }
}
