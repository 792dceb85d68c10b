//! Structure events and per-bar alert flags

use crate::order_block::OrderBlock;
use crate::pivot::Bias;
use serde::Serialize;

/// Pivot family an event or pivot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureScope {
    Swing,
    Internal,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StructureKind {
    /// Break of structure in the prevailing direction
    #[serde(rename = "BOS")]
    Bos,
    /// Break against the prevailing direction
    #[serde(rename = "CHoCH")]
    Choch,
    EqualHigh,
    EqualLow,
    Mitigated,
}

/// State transition observed while replaying bars
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureEvent {
    pub scope: StructureScope,
    pub kind: StructureKind,
    pub bias: Bias,
    pub level: f64,
    pub bar_index: usize,
    pub bar_time: i64,
    /// Block stored (breaks) or removed (mitigation) by this event
    pub order_block: Option<OrderBlock>,
}

/// Flags raised on the most recent bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alerts {
    pub internal_bullish_bos: bool,
    pub internal_bullish_choch: bool,
    pub internal_bearish_bos: bool,
    pub internal_bearish_choch: bool,
    pub swing_bullish_bos: bool,
    pub swing_bullish_choch: bool,
    pub swing_bearish_bos: bool,
    pub swing_bearish_choch: bool,
    pub internal_bullish_order_block: bool,
    pub internal_bearish_order_block: bool,
    pub swing_bullish_order_block: bool,
    pub swing_bearish_order_block: bool,
    pub equal_highs: bool,
    pub equal_lows: bool,
}

impl Alerts {
    pub(crate) fn record_break(&mut self, scope: StructureScope, bias: Bias, kind: StructureKind) {
        let choch = kind == StructureKind::Choch;
        match (scope, bias) {
            (StructureScope::Internal, Bias::Bullish) => {
                self.internal_bullish_choch = choch;
                self.internal_bullish_bos = !choch;
            }
            (StructureScope::Internal, Bias::Bearish) => {
                self.internal_bearish_choch = choch;
                self.internal_bearish_bos = !choch;
            }
            (StructureScope::Swing, Bias::Bullish) => {
                self.swing_bullish_choch = choch;
                self.swing_bullish_bos = !choch;
            }
            (StructureScope::Swing, Bias::Bearish) => {
                self.swing_bearish_choch = choch;
                self.swing_bearish_bos = !choch;
            }
            _ => {}
        }
    }

    pub(crate) fn record_mitigation(&mut self, scope: StructureScope, bias: Bias) {
        match (scope, bias) {
            (StructureScope::Internal, Bias::Bullish) => self.internal_bullish_order_block = true,
            (StructureScope::Internal, Bias::Bearish) => self.internal_bearish_order_block = true,
            (StructureScope::Swing, Bias::Bullish) => self.swing_bullish_order_block = true,
            (StructureScope::Swing, Bias::Bearish) => self.swing_bearish_order_block = true,
            _ => {}
        }
    }
}
