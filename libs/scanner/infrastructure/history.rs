//! Historical bars that warm a pair's buffer before it goes live
//!
//! Without a seed every pair starts empty and the structure replay stays
//! silent until enough closed bars have streamed in. [`JsonFileHistory`]
//! reads one JSON array of bars per pair, e.g. exported from the exchange's
//! kline endpoint.

use crate::domain::TradingPair;
use async_trait::async_trait;
use market_structure::Bar;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid history in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Up to `limit` of the most recent closed bars for `pair`, oldest first.
    /// A pair without history yields an empty list.
    async fn load(&self, pair: &TradingPair, limit: usize) -> Result<Vec<Bar>>;
}

/// `<dir>/<SYMBOL>_<interval>.json`, each holding an array of bars
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    dir: PathBuf,
}

impl JsonFileHistory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, pair: &TradingPair) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.json",
            pair.symbol.to_uppercase(),
            pair.interval
        ))
    }
}

#[async_trait]
impl HistorySource for JsonFileHistory {
    async fn load(&self, pair: &TradingPair, limit: usize) -> Result<Vec<Bar>> {
        let path = self.path_for(pair);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("[History] No file for {} at {}", pair, path.display());
                return Ok(Vec::new());
            }
            Err(source) => return Err(HistoryError::Io { path, source }),
        };

        let mut bars: Vec<Bar> = serde_json::from_str(&contents)
            .map_err(|source| HistoryError::Parse {
                path: path.clone(),
                source,
            })?;
        bars.sort_by_key(|bar| bar.open_time);
        let skip = bars.len().saturating_sub(limit);
        bars.drain(..skip);

        info!(
            "[History] Loaded {} bars for {} from {}",
            bars.len(),
            pair,
            path.display()
        );
        Ok(bars)
    }
}
