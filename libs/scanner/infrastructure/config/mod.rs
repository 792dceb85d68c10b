//! Scanner configuration
//!
//! Loaded from YAML, then overridden from the environment:
//! - `STREAM_URL` replaces `stream.url`
//! - `MAX_OB_WORKER` replaces `workers.pool_size`

use crate::domain::TradingPair;
use market_structure::StructureConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use streamsockets::{StreamConfig, PRODUCTION_URL, TESTNET_URL};
use thiserror::Error;
use tracing::info;

pub const STREAM_URL_ENV: &str = "STREAM_URL";
pub const WORKER_POOL_ENV: &str = "MAX_OB_WORKER";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub workers: WorkerSection,

    #[serde(default)]
    pub algorithm: StructureConfig,

    #[serde(default)]
    pub buffer: BufferSection,

    #[serde(default)]
    pub pairs: Vec<TradingPair>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// Explicit endpoint; wins over `testnet`
    pub url: Option<String>,
    pub testnet: bool,
    pub max_channels_per_connection: usize,
    pub subscribe_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Give up after this many reconnects; unset retries forever
    pub max_reconnect_attempts: Option<usize>,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            url: None,
            testnet: false,
            max_channels_per_connection: 200,
            subscribe_timeout_ms: 5_000,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub pool_size: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self { pool_size: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSection {
    /// Exchange prefix of buffer keys
    pub exchange: String,
    /// Bars kept per buffer
    pub retention: usize,
    /// Directory of `<SYMBOL>_<interval>.json` bar histories seeded before
    /// each pair goes live. Unset means every pair starts empty.
    pub history_dir: Option<String>,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            retention: 500,
            history_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ScannerConfig {
    /// Load from a YAML file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let mut config = Self::parse(contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize only: no environment overrides, no validation
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(STREAM_URL_ENV) {
            if !url.is_empty() {
                info!("Overriding stream url from {}", STREAM_URL_ENV);
                self.stream.url = Some(url);
            }
        }

        if let Ok(size) = std::env::var(WORKER_POOL_ENV) {
            let size = size.trim().parse::<usize>().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{} must be a positive integer, got {:?}",
                    WORKER_POOL_ENV, size
                ))
            })?;
            info!("Overriding worker pool size from {}: {}", WORKER_POOL_ENV, size);
            self.workers.pool_size = size;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {:?}",
                VALID_LOG_LEVELS
            )));
        }

        if self.workers.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "workers.pool_size must be greater than 0".to_string(),
            ));
        }

        if self.buffer.retention == 0 {
            return Err(ConfigError::ValidationError(
                "buffer.retention must be greater than 0".to_string(),
            ));
        }

        if self.buffer.exchange.is_empty() {
            return Err(ConfigError::ValidationError(
                "buffer.exchange must not be empty".to_string(),
            ));
        }

        for pair in &self.pairs {
            if pair.symbol.is_empty() || pair.interval.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "pair entries need a symbol and an interval: {:?}",
                    pair
                )));
            }
        }

        self.algorithm
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("algorithm: {}", e)))?;

        self.stream_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("stream: {}", e)))?;

        Ok(())
    }

    /// Endpoint after applying `url` / `testnet`
    pub fn stream_url(&self) -> &str {
        match &self.stream.url {
            Some(url) => url,
            None if self.stream.testnet => TESTNET_URL,
            None => PRODUCTION_URL,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        let mut config = StreamConfig::new(self.stream_url())
            .with_max_channels(self.stream.max_channels_per_connection)
            .with_subscribe_timeout(Duration::from_millis(self.stream.subscribe_timeout_ms))
            .with_reconnect_delay(Duration::from_millis(self.stream.reconnect_delay_ms));
        config.max_reconnect_attempts = self.stream.max_reconnect_attempts;
        config
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Stream: {}", self.stream_url());
        info!(
            "  Channels per connection: {}",
            self.stream.max_channels_per_connection
        );
        info!("  Worker pool: {}", self.workers.pool_size);
        info!(
            "  Pivots: swing {} / internal {}, ATR {}",
            self.algorithm.swings_length, self.algorithm.internal_length, self.algorithm.atr_period
        );
        info!(
            "  Buffer: {} bars per pair ({})",
            self.buffer.retention, self.buffer.exchange
        );
        match &self.buffer.history_dir {
            Some(dir) => info!("  History: {}", dir),
            None => info!("  History: none, pairs warm up from the live stream"),
        }
        info!("  Pairs: {}", self.pairs.len());
        for pair in &self.pairs {
            info!("    {}", pair);
        }
    }
}
