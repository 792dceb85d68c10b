//! Bar buffers keyed by `<exchange>:<symbol>:<interval>`
//!
//! Orchestrators append closed bars and compute workers read the whole buffer
//! back, oldest first. The trait is the seam for an external list store; the
//! in-memory implementation backs the binary and the tests.

use async_trait::async_trait;
use market_structure::Bar;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Bar store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait BarStore: Send + Sync + 'static {
    /// Append one bar at the tail, returning the new buffer length
    async fn append(&self, key: &str, bar: Bar) -> Result<usize>;

    /// Append many bars at the tail, oldest first
    async fn extend(&self, key: &str, bars: &[Bar]) -> Result<usize> {
        let mut len = self.len(key).await?;
        for bar in bars {
            len = self.append(key, *bar).await?;
        }
        Ok(len)
    }

    /// Whole buffer, oldest first. Unknown keys read as empty.
    async fn read_all(&self, key: &str) -> Result<Vec<Bar>>;

    async fn len(&self, key: &str) -> Result<usize>;

    /// Newest bar, if any
    async fn last(&self, key: &str) -> Result<Option<Bar>>;

    /// Drop bars from the head until at most `retain` remain, returning how many went
    async fn trim_front(&self, key: &str, retain: usize) -> Result<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryBarStore {
    buffers: RwLock<HashMap<String, VecDeque<Bar>>>,
}

impl InMemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.buffers.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BarStore for InMemoryBarStore {
    async fn append(&self, key: &str, bar: Bar) -> Result<usize> {
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(key.to_string()).or_default();
        buffer.push_back(bar);
        Ok(buffer.len())
    }

    async fn extend(&self, key: &str, bars: &[Bar]) -> Result<usize> {
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(key.to_string()).or_default();
        buffer.extend(bars.iter().copied());
        Ok(buffer.len())
    }

    async fn read_all(&self, key: &str) -> Result<Vec<Bar>> {
        Ok(self
            .buffers
            .read()
            .get(key)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize> {
        Ok(self.buffers.read().get(key).map_or(0, VecDeque::len))
    }

    async fn last(&self, key: &str) -> Result<Option<Bar>> {
        Ok(self
            .buffers
            .read()
            .get(key)
            .and_then(|buffer| buffer.back().copied()))
    }

    async fn trim_front(&self, key: &str, retain: usize) -> Result<usize> {
        let mut buffers = self.buffers.write();
        let Some(buffer) = buffers.get_mut(key) else {
            return Ok(0);
        };
        let excess = buffer.len().saturating_sub(retain);
        buffer.drain(..excess);
        Ok(excess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64) -> Bar {
        Bar {
            open_time,
            close_time: open_time + 59_999,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_oldest_first() {
        let store = InMemoryBarStore::new();
        assert_eq!(store.append("k", bar(0)).await.unwrap(), 1);
        assert_eq!(store.append("k", bar(60_000)).await.unwrap(), 2);
        assert_eq!(store.extend("k", &[bar(120_000), bar(180_000)]).await.unwrap(), 4);

        let times: Vec<i64> = store
            .read_all("k")
            .await
            .unwrap()
            .iter()
            .map(|b| b.open_time)
            .collect();
        assert_eq!(times, vec![0, 60_000, 120_000, 180_000]);
        assert_eq!(store.last("k").await.unwrap().map(|b| b.open_time), Some(180_000));
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let store = InMemoryBarStore::new();
        assert!(store.read_all("missing").await.unwrap().is_empty());
        assert_eq!(store.len("missing").await.unwrap(), 0);
        assert_eq!(store.last("missing").await.unwrap(), None);
        assert_eq!(store.trim_front("missing", 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trim_front_keeps_newest() {
        let store = InMemoryBarStore::new();
        for i in 0..10 {
            store.append("k", bar(i * 60_000)).await.unwrap();
        }
        assert_eq!(store.trim_front("k", 4).await.unwrap(), 6);
        let bars = store.read_all("k").await.unwrap();
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[0].open_time, 6 * 60_000);

        // Already within retention
        assert_eq!(store.trim_front("k", 4).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemoryBarStore::new();
        store.append("binance:btcusdt:1m", bar(0)).await.unwrap();
        store.append("binance:ethusdt:1m", bar(0)).await.unwrap();
        store.append("binance:ethusdt:1m", bar(60_000)).await.unwrap();
        assert_eq!(store.len("binance:btcusdt:1m").await.unwrap(), 1);
        assert_eq!(store.len("binance:ethusdt:1m").await.unwrap(), 2);
        assert_eq!(store.keys(), vec!["binance:btcusdt:1m", "binance:ethusdt:1m"]);
    }
}
