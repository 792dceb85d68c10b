use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Process-wide stop flag flipped by Ctrl+C
#[derive(Clone)]
pub struct ShutdownManager {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Listen for Ctrl+C on a background task
    pub fn spawn_signal_handler(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("[Shutdown] Ctrl+C received, stopping");
                    this.trigger();
                }
                Err(e) => info!("[Shutdown] Signal handler unavailable: {}", e),
            }
        });
    }

    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        while self.is_running() {
            let notified = self.notify.notified();
            if !self.is_running() {
                break;
            }
            // Re-check periodically in case the trigger raced the registration
            let _ = tokio::time::timeout(Duration::from_millis(250), notified).await;
        }
    }

    /// Sleep for `duration`, returning early on shutdown.
    /// Returns `false` when the sleep was cut short.
    pub async fn interruptible_sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = self.wait() => false,
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
