use serde::{Deserialize, Serialize};

/// One closed OHLCV candle, ordered by `open_time`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Open time (ms since epoch)
    pub open_time: i64,
    /// Close time (ms since epoch)
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// `true` when every price and the volume is a finite number
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
