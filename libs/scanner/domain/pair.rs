use serde::{Deserialize, Serialize};
use std::fmt;

/// One (symbol, interval) market watched by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    /// Exchange symbol, e.g. `BTCUSDT`
    pub symbol: String,
    /// Kline interval, e.g. `1m`, `15m`, `4h`
    pub interval: String,
}

impl TradingPair {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
        }
    }

    /// Bar buffer key: `<exchange>:<symbol>:<interval>`
    pub fn buffer_key(&self, exchange: &str) -> String {
        format!(
            "{}:{}:{}",
            exchange.to_lowercase(),
            self.symbol.to_lowercase(),
            self.interval
        )
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.interval)
    }
}
