//! Kline stream payloads
//!
//! Uses the futures combined-stream format from `<symbol>@kline_<interval>`.

use crate::domain::DomainError;
use market_structure::Bar;
use serde::Deserialize;

/// Kline event as published on the stream
///
/// Example JSON:
/// ```json
/// {
///     "e": "kline",
///     "E": 1638747660000,
///     "s": "BTCUSDT",
///     "k": {
///         "t": 1638747660000, "T": 1638747719999, "s": "BTCUSDT", "i": "1m",
///         "o": "0.0010", "c": "0.0020", "h": "0.0025", "l": "0.0015",
///         "v": "1000", "n": 100, "x": false, "q": "1.0000",
///         "V": "500", "Q": "0.500", "B": "123456"
///     }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    /// Event type (always "kline")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time (ms since epoch)
    #[serde(rename = "E")]
    pub event_time: i64,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "k")]
    pub kline: KlineData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlineData {
    /// Kline start time
    #[serde(rename = "t")]
    pub open_time: i64,

    /// Kline close time
    #[serde(rename = "T")]
    pub close_time: i64,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "i")]
    pub interval: String,

    #[serde(rename = "o")]
    pub open: String,

    #[serde(rename = "c")]
    pub close: String,

    #[serde(rename = "h")]
    pub high: String,

    #[serde(rename = "l")]
    pub low: String,

    /// Base asset volume
    #[serde(rename = "v")]
    pub volume: String,

    /// Number of trades
    #[serde(rename = "n", default)]
    pub trades: u64,

    /// Is this kline closed?
    #[serde(rename = "x")]
    pub is_closed: bool,

    /// Quote asset volume
    #[serde(rename = "q", default)]
    pub quote_volume: String,

    #[serde(rename = "V", default)]
    pub taker_buy_volume: String,

    #[serde(rename = "Q", default)]
    pub taker_buy_quote_volume: String,
}

fn parse_price(field: &str, value: &str) -> Result<f64, DomainError> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| DomainError::InvalidKline(format!("{} is not a number: {:?}", field, value)))?;
    if !parsed.is_finite() {
        return Err(DomainError::InvalidKline(format!(
            "{} is not finite: {}",
            field, value
        )));
    }
    Ok(parsed)
}

impl KlineData {
    /// Convert string prices into a [`Bar`]
    pub fn to_bar(&self) -> Result<Bar, DomainError> {
        Ok(Bar {
            open_time: self.open_time,
            close_time: self.close_time,
            open: parse_price("open", &self.open)?,
            high: parse_price("high", &self.high)?,
            low: parse_price("low", &self.low)?,
            close: parse_price("close", &self.close)?,
            volume: parse_price("volume", &self.volume)?,
        })
    }
}

impl KlineEvent {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DomainError> {
        KlineEvent::deserialize(value).map_err(|e| DomainError::InvalidKline(e.to_string()))
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.kline.is_closed
    }
}
