//! Algorithm inputs

use crate::order_block::MitigationSource;
use serde::{Deserialize, Serialize};

/// Which order-block scope a replay returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputScope {
    #[default]
    Internal,
    Swing,
    /// Internal blocks followed by swing blocks
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Lookback for swing pivots
    pub swings_length: usize,
    /// Lookback for internal pivots
    pub internal_length: usize,
    /// ATR window used to flag high-volatility bars
    pub atr_period: usize,
    /// Require candle-shape confluence for internal breaks
    pub internal_filter_confluence: bool,
    pub show_internal_order_blocks: bool,
    pub show_swing_order_blocks: bool,
    /// Also run break detection and mitigation on swing pivots
    pub swing_structure: bool,
    /// Track equal highs/lows
    pub equal_highs_lows: bool,
    pub equal_highs_lows_length: usize,
    /// Fraction of ATR under which two pivots count as equal
    pub equal_highs_lows_threshold: f64,
    pub mitigation: MitigationSource,
    /// Internal blocks returned to callers
    pub internal_order_blocks_size: usize,
    /// Swing blocks returned to callers
    pub swing_order_blocks_size: usize,
    /// Blocks retained per scope
    pub order_block_capacity: usize,
    pub output_scope: OutputScope,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swings_length: 50,
            internal_length: 5,
            atr_period: 200,
            internal_filter_confluence: false,
            show_internal_order_blocks: true,
            show_swing_order_blocks: false,
            swing_structure: false,
            equal_highs_lows: false,
            equal_highs_lows_length: 3,
            equal_highs_lows_threshold: 0.1,
            mitigation: MitigationSource::HighLow,
            internal_order_blocks_size: 5,
            swing_order_blocks_size: 5,
            order_block_capacity: 100,
            output_scope: OutputScope::Internal,
        }
    }
}

impl StructureConfig {
    /// Check values the replay cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.swings_length == 0 || self.internal_length == 0 {
            return Err("pivot lengths must be greater than 0".to_string());
        }
        if self.equal_highs_lows && self.equal_highs_lows_length == 0 {
            return Err("equal_highs_lows_length must be greater than 0".to_string());
        }
        if self.atr_period == 0 {
            return Err("atr_period must be greater than 0".to_string());
        }
        if self.order_block_capacity == 0 {
            return Err("order_block_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}
