//! Pivot, trend and trailing-extreme state carried across bars

use serde::{Deserialize, Serialize};

/// Leg direction values produced by leg detection
pub const BULLISH_LEG: i32 = 1;
pub const BEARISH_LEG: i32 = 0;

/// Direction of a trend or order block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Bias {
    Bearish,
    Neutral,
    Bullish,
}

impl Bias {
    pub fn as_i8(self) -> i8 {
        match self {
            Bias::Bearish => -1,
            Bias::Neutral => 0,
            Bias::Bullish => 1,
        }
    }
}

impl From<Bias> for i8 {
    fn from(bias: Bias) -> Self {
        bias.as_i8()
    }
}

impl TryFrom<i8> for Bias {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Bias::Bearish),
            0 => Ok(Bias::Neutral),
            1 => Ok(Bias::Bullish),
            other => Err(format!("invalid bias {}", other)),
        }
    }
}

/// A tracked swing, internal or equal high/low
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub current_level: f64,
    pub last_level: f64,
    /// Set once a close has broken through `current_level`
    pub crossed: bool,
    pub bar_time: i64,
    pub bar_index: usize,
}

impl Pivot {
    /// Pivot with no level yet, anchored at the first bar
    pub fn unset(bar_time: i64) -> Self {
        Self {
            current_level: f64::NAN,
            last_level: f64::NAN,
            crossed: false,
            bar_time,
            bar_index: 0,
        }
    }

    /// Move to a new level found `bar_index`/`bar_time`
    pub fn relocate(&mut self, level: f64, bar_time: i64, bar_index: usize) {
        self.last_level = self.current_level;
        self.current_level = level;
        self.crossed = false;
        self.bar_time = bar_time;
        self.bar_index = bar_index;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trend {
    pub bias: Bias,
}

impl Default for Trend {
    fn default() -> Self {
        Self { bias: Bias::Neutral }
    }
}

/// Running top/bottom bookkeeping updated from swing pivots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingExtremes {
    pub top: f64,
    pub bottom: f64,
    pub bar_time: i64,
    pub bar_index: usize,
    pub last_top_time: i64,
    pub last_bottom_time: i64,
}

impl Default for TrailingExtremes {
    fn default() -> Self {
        Self {
            top: f64::NAN,
            bottom: f64::NAN,
            bar_time: 0,
            bar_index: 0,
            last_top_time: 0,
            last_bottom_time: 0,
        }
    }
}

impl TrailingExtremes {
    pub fn record_top(&mut self, pivot: &Pivot) {
        self.top = pivot.current_level;
        self.bar_time = pivot.bar_time;
        self.bar_index = pivot.bar_index;
        self.last_top_time = pivot.bar_time;
    }

    pub fn record_bottom(&mut self, pivot: &Pivot) {
        self.bottom = pivot.current_level;
        self.bar_time = pivot.bar_time;
        self.bar_index = pivot.bar_index;
        self.last_bottom_time = pivot.bar_time;
    }
}
