use crate::traits::{Result, StreamError};
use std::time::Duration;

/// Production futures stream endpoint
pub const PRODUCTION_URL: &str = "wss://fstream.binance.com/stream";
/// Testnet futures stream endpoint
pub const TESTNET_URL: &str = "wss://fstream.binancefuture.com/stream";

pub const DEFAULT_MAX_CHANNELS: usize = 200;
pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Settings shared by every connection in a pool
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Combined-stream endpoint (ws:// or wss://)
    pub url: String,
    /// Channels one connection may carry before the pool opens another
    pub max_channels_per_connection: usize,
    /// How long a SUBSCRIBE waits for its acknowledgment
    pub subscribe_timeout: Duration,
    /// Pause between a disconnect and the next connection attempt
    pub reconnect_delay: Duration,
    /// `None` keeps reconnecting forever
    pub max_reconnect_attempts: Option<usize>,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_channels_per_connection: DEFAULT_MAX_CHANNELS,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: None,
        }
    }

    pub fn production() -> Self {
        Self::new(PRODUCTION_URL)
    }

    pub fn testnet() -> Self {
        Self::new(TESTNET_URL)
    }

    pub fn with_max_channels(mut self, max: usize) -> Self {
        self.max_channels_per_connection = max;
        self
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(StreamError::Configuration(format!(
                "url must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if self.max_channels_per_connection == 0 {
            return Err(StreamError::Configuration(
                "max_channels_per_connection must be greater than 0".to_string(),
            ));
        }
        if self.subscribe_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "subscribe_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::production()
    }
}
