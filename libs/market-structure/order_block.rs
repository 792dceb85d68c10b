//! Order blocks and the bounded newest-first list that owns them

use crate::pivot::Bias;
use serde::{Deserialize, Serialize};

/// Price zone implicated in a structure break
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBlock {
    pub bar_high: f64,
    pub bar_low: f64,
    pub bar_time: i64,
    pub bias: Bias,
}

/// Which price feeds mitigation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MitigationSource {
    /// Close for both directions
    Close,
    /// High for bearish blocks, low for bullish blocks
    #[default]
    #[serde(rename = "High/Low", alias = "HighLow")]
    HighLow,
}

impl OrderBlock {
    /// `true` when price has invalidated this block
    pub fn is_mitigated(&self, bearish_source: f64, bullish_source: f64) -> bool {
        match self.bias {
            Bias::Bearish => bearish_source > self.bar_high,
            Bias::Bullish => bullish_source < self.bar_low,
            Bias::Neutral => false,
        }
    }
}

/// Newest-first list capped at `capacity` entries
#[derive(Debug, Clone)]
pub struct OrderBlockList {
    blocks: Vec<OrderBlock>,
    capacity: usize,
}

impl OrderBlockList {
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Insert at the front, dropping the oldest entry when full
    pub fn store(&mut self, block: OrderBlock) {
        if self.blocks.len() >= self.capacity {
            self.blocks.pop();
        }
        self.blocks.insert(0, block);
    }

    /// Remove blocks invalidated by the given sources, returning them.
    ///
    /// The sweep walks front to back and advances past every slot, so an entry
    /// that slides into a freed slot is not examined until the next sweep.
    pub fn mitigate(&mut self, bearish_source: f64, bullish_source: f64) -> Vec<OrderBlock> {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.blocks.len() {
            if self.blocks[i].is_mitigated(bearish_source, bullish_source) {
                removed.push(self.blocks.remove(i));
            }
            i += 1;
        }
        removed
    }

    /// Up to `count` newest blocks
    pub fn newest(&self, count: usize) -> Vec<OrderBlock> {
        self.blocks.iter().take(count).copied().collect()
    }

    pub fn as_slice(&self) -> &[OrderBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
