//! Long-running service scaffolding: banners and a periodic heartbeat

use scanner::ShutdownManager;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name shown in banners
    pub name: String,
    /// How often `heartbeat()` is called while running
    pub heartbeat_interval: Duration,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval: Duration::from_secs(300),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// A service that starts, reports periodically and stops on shutdown
#[allow(async_fn_in_trait)]
pub trait BinaryRunner {
    fn config(&self) -> &RunConfig;

    /// Bring the service up
    async fn start(&mut self) -> anyhow::Result<()>;

    /// Periodic status line
    fn heartbeat(&self);

    /// Tear the service down
    async fn stop(&mut self);

    fn print_banner(&self) {
        info!("");
        info!("========================================");
        info!("Starting {}", self.config().name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    fn print_shutdown(&self) {
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", self.config().name);
        info!("========================================");
    }

    /// Start, heartbeat until `shutdown` fires, then stop
    async fn execute(&mut self, shutdown: &ShutdownManager) -> anyhow::Result<()> {
        self.print_banner();
        if let Err(e) = self.start().await {
            self.stop().await;
            return Err(e);
        }

        let interval = self.config().heartbeat_interval;
        while shutdown.interruptible_sleep(interval).await {
            self.heartbeat();
        }

        self.stop().await;
        self.print_shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        config: RunConfig,
        started: bool,
        stopped: bool,
    }

    impl BinaryRunner for Counting {
        fn config(&self) -> &RunConfig {
            &self.config
        }

        async fn start(&mut self) -> anyhow::Result<()> {
            self.started = true;
            Ok(())
        }

        fn heartbeat(&self) {}

        async fn stop(&mut self) {
            self.stopped = true;
        }
    }

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("scanner").with_heartbeat(Duration::from_secs(60));
        assert_eq!(config.name, "scanner");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(
            RunConfig::new("x").heartbeat_interval,
            Duration::from_secs(300)
        );
    }

    #[tokio::test]
    async fn test_execute_stops_on_shutdown() {
        let mut runner = Counting {
            config: RunConfig::new("test").with_heartbeat(Duration::from_secs(60)),
            started: false,
            stopped: false,
        };
        let shutdown = ShutdownManager::new();
        shutdown.trigger();

        runner.execute(&shutdown).await.unwrap();
        assert!(runner.started);
        assert!(runner.stopped);
    }
}
