//! Per-bar market structure replay
//!
//! `StructureAlgorithm` consumes closed bars one at a time. Each bar feeds the
//! ATR, records volatility-adjusted extremes, then runs a frame: pivot
//! detection for the swing and internal lookbacks, break detection against
//! the tracked pivots (storing an order block on every break), and finally
//! mitigation of blocks that price has traded through.
//!
//! A frame that needs more history than is available stops at the first
//! lookup that fails; later steps for that bar are skipped.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use crate::atr::AverageTrueRange;
use crate::bar::Bar;
use crate::config::{OutputScope, StructureConfig};
use crate::error::Result;
use crate::events::{Alerts, StructureEvent, StructureKind, StructureScope};
use crate::order_block::{MitigationSource, OrderBlock, OrderBlockList};
use crate::pivot::{Bias, Pivot, TrailingExtremes, Trend, BEARISH_LEG, BULLISH_LEG};
use crate::series::{crossover, crossunder, highest, lowest, Series};

/// Order blocks returned after a replay, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureOutput {
    pub internal: Vec<OrderBlock>,
    pub swing: Vec<OrderBlock>,
}

#[derive(Debug, Clone)]
pub struct StructureAlgorithm {
    config: StructureConfig,

    open: Series<f64>,
    high: Series<f64>,
    low: Series<f64>,
    close: Series<f64>,
    open_time: Series<i64>,
    bar_index: Series<usize>,

    atr: AverageTrueRange,
    parsed_highs: Vec<f64>,
    parsed_lows: Vec<f64>,

    /// Leg direction history keyed by lookback size
    legs: HashMap<usize, Series<i32>>,

    swing_high: Pivot,
    swing_low: Pivot,
    internal_high: Pivot,
    internal_low: Pivot,
    equal_high: Pivot,
    equal_low: Pivot,

    swing_trend: Trend,
    internal_trend: Trend,
    trailing: TrailingExtremes,

    internal_order_blocks: OrderBlockList,
    swing_order_blocks: OrderBlockList,

    alerts: Alerts,
    events: Vec<StructureEvent>,
    skipped_bars: usize,
}

impl StructureAlgorithm {
    pub fn new(config: StructureConfig) -> Self {
        let capacity = config.order_block_capacity;
        Self {
            atr: AverageTrueRange::new(config.atr_period),
            config,
            open: Series::new(),
            high: Series::new(),
            low: Series::new(),
            close: Series::new(),
            open_time: Series::new(),
            bar_index: Series::new(),
            parsed_highs: Vec::new(),
            parsed_lows: Vec::new(),
            legs: HashMap::new(),
            swing_high: Pivot::unset(0),
            swing_low: Pivot::unset(0),
            internal_high: Pivot::unset(0),
            internal_low: Pivot::unset(0),
            equal_high: Pivot::unset(0),
            equal_low: Pivot::unset(0),
            swing_trend: Trend::default(),
            internal_trend: Trend::default(),
            trailing: TrailingExtremes::default(),
            internal_order_blocks: OrderBlockList::new(capacity),
            swing_order_blocks: OrderBlockList::new(capacity),
            alerts: Alerts::default(),
            events: Vec::new(),
            skipped_bars: 0,
        }
    }

    /// Replay `bars` from scratch and return the configured output
    pub fn replay(config: StructureConfig, bars: &[Bar]) -> Vec<OrderBlock> {
        let mut algorithm = Self::new(config);
        for bar in bars {
            algorithm.update(bar);
        }
        algorithm.order_blocks()
    }

    /// Feed one closed bar. Bars with non-finite prices are ignored.
    pub fn update(&mut self, bar: &Bar) {
        if !bar.is_finite() {
            self.skipped_bars += 1;
            trace!(open_time = bar.open_time, "skipping non-finite bar");
            return;
        }

        let index = self.bar_index.len();
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.open_time.push(bar.open_time);
        self.bar_index.push(index);

        if index == 0 {
            for pivot in [
                &mut self.swing_high,
                &mut self.swing_low,
                &mut self.internal_high,
                &mut self.internal_low,
                &mut self.equal_high,
                &mut self.equal_low,
            ] {
                *pivot = Pivot::unset(bar.open_time);
            }
            self.trailing.bar_time = bar.open_time;
        }

        self.alerts = Alerts::default();

        // Wide bars have their extremes swapped so they do not anchor blocks
        let high_volatility = self
            .atr
            .update(bar.high, bar.low, bar.close)
            .map_or(false, |atr| bar.range() >= 2.0 * atr);
        if high_volatility {
            self.parsed_highs.push(bar.low);
            self.parsed_lows.push(bar.high);
        } else {
            self.parsed_highs.push(bar.high);
            self.parsed_lows.push(bar.low);
        }

        if let Err(e) = self.frame() {
            trace!(bar_index = index, error = %e, "frame stopped early");
        }
    }

    fn frame(&mut self) -> Result<()> {
        self.current_structure(self.config.swings_length, StructureScope::Swing)?;
        self.current_structure(self.config.internal_length, StructureScope::Internal)?;
        if self.config.equal_highs_lows {
            self.current_structure(self.config.equal_highs_lows_length, StructureScope::Equal)?;
        }

        self.display_structure(StructureScope::Internal)?;
        if self.config.swing_structure {
            self.display_structure(StructureScope::Swing)?;
        }

        self.delete_order_blocks(StructureScope::Internal);
        if self.config.swing_structure {
            self.delete_order_blocks(StructureScope::Swing);
        }
        Ok(())
    }

    /// Update the leg history for `size` and return its change on this bar:
    /// `+1` starts a bullish leg (pivot low), `-1` a bearish leg (pivot high)
    fn leg(&mut self, size: usize) -> Result<i32> {
        let legs = self
            .legs
            .entry(size)
            .or_insert_with(|| Series::with_initial(BEARISH_LEG));
        let mut leg = legs.current().copied().unwrap_or(BEARISH_LEG);

        let new_leg_high = *self.high.at(size)? > highest(self.high.as_slice(), size)?;
        let new_leg_low = *self.low.at(size)? < lowest(self.low.as_slice(), size)?;

        if new_leg_high {
            leg = BEARISH_LEG;
        } else if new_leg_low {
            leg = BULLISH_LEG;
        }
        legs.push(leg);
        legs.change()
    }

    fn current_structure(&mut self, size: usize, scope: StructureScope) -> Result<()> {
        let change = self.leg(size)?;
        if change == 0 {
            return Ok(());
        }

        let bar_time = *self.open_time.at(size)?;
        let bar_index = *self.bar_index.at(size)?;
        let atr = self.atr.value().unwrap_or(f64::NAN);
        let threshold = self.config.equal_highs_lows_threshold * atr;

        if change == 1 {
            let level = *self.low.at(size)?;
            let pivot = match scope {
                StructureScope::Swing => &mut self.swing_low,
                StructureScope::Internal => &mut self.internal_low,
                StructureScope::Equal => &mut self.equal_low,
            };
            let equal = scope == StructureScope::Equal
                && (pivot.current_level - level).abs() < threshold;
            let previous_level = pivot.current_level;
            pivot.relocate(level, bar_time, bar_index);

            if equal {
                self.alerts.equal_lows = true;
                self.events.push(StructureEvent {
                    scope,
                    kind: StructureKind::EqualLow,
                    bias: Bias::Bullish,
                    level: previous_level,
                    bar_index,
                    bar_time,
                    order_block: None,
                });
            }
            if scope == StructureScope::Swing {
                self.trailing.record_bottom(&self.swing_low);
            }
        } else {
            let level = *self.high.at(size)?;
            let pivot = match scope {
                StructureScope::Swing => &mut self.swing_high,
                StructureScope::Internal => &mut self.internal_high,
                StructureScope::Equal => &mut self.equal_high,
            };
            let equal = scope == StructureScope::Equal
                && (pivot.current_level - level).abs() < threshold;
            let previous_level = pivot.current_level;
            pivot.relocate(level, bar_time, bar_index);

            if equal {
                self.alerts.equal_highs = true;
                self.events.push(StructureEvent {
                    scope,
                    kind: StructureKind::EqualHigh,
                    bias: Bias::Bearish,
                    level: previous_level,
                    bar_index,
                    bar_time,
                    order_block: None,
                });
            }
            if scope == StructureScope::Swing {
                self.trailing.record_top(&self.swing_high);
            }
        }
        Ok(())
    }

    fn display_structure(&mut self, scope: StructureScope) -> Result<()> {
        let high = *self.high.at(0)?;
        let low = *self.low.at(0)?;
        let open = *self.open.at(0)?;
        let close = *self.close.at(0)?;
        let previous_close = *self.close.at(1)?;
        let index = *self.bar_index.at(0)?;
        let time = *self.open_time.at(0)?;

        let internal = scope == StructureScope::Internal;
        let (bullish_bar, bearish_bar) = if internal && self.config.internal_filter_confluence {
            (
                high - close.max(open) > close.min(open - low),
                high - close.max(open) < close.min(open - low),
            )
        } else {
            (true, true)
        };

        // Bullish break of the tracked high
        let (pivot, trend) = match scope {
            StructureScope::Internal => (self.internal_high, self.internal_trend),
            _ => (self.swing_high, self.swing_trend),
        };
        let extra = if internal {
            pivot.current_level != self.swing_high.current_level && bullish_bar
        } else {
            true
        };
        let level = pivot.current_level;
        if crossover(previous_close, close, level, level) && !pivot.crossed && extra {
            let kind = if trend.bias == Bias::Bearish {
                StructureKind::Choch
            } else {
                StructureKind::Bos
            };
            self.mark_break(scope, Bias::Bullish);
            let order_block = self.store_order_block(scope, pivot.bar_index, Bias::Bullish);
            self.alerts.record_break(scope, Bias::Bullish, kind);
            self.events.push(StructureEvent {
                scope,
                kind,
                bias: Bias::Bullish,
                level,
                bar_index: index,
                bar_time: time,
                order_block,
            });
        }

        // Bearish break of the tracked low
        let (pivot, trend) = match scope {
            StructureScope::Internal => (self.internal_low, self.internal_trend),
            _ => (self.swing_low, self.swing_trend),
        };
        let extra = if internal {
            pivot.current_level != self.swing_low.current_level && bearish_bar
        } else {
            true
        };
        let level = pivot.current_level;
        if crossunder(previous_close, close, level, level) && !pivot.crossed && extra {
            let kind = if trend.bias == Bias::Bullish {
                StructureKind::Choch
            } else {
                StructureKind::Bos
            };
            self.mark_break(scope, Bias::Bearish);
            let order_block = self.store_order_block(scope, pivot.bar_index, Bias::Bearish);
            self.alerts.record_break(scope, Bias::Bearish, kind);
            self.events.push(StructureEvent {
                scope,
                kind,
                bias: Bias::Bearish,
                level,
                bar_index: index,
                bar_time: time,
                order_block,
            });
        }
        Ok(())
    }

    /// Flag the broken pivot as crossed and flip the scope's trend
    fn mark_break(&mut self, scope: StructureScope, bias: Bias) {
        let (pivot, trend) = match (scope, bias) {
            (StructureScope::Internal, Bias::Bullish) => {
                (&mut self.internal_high, &mut self.internal_trend)
            }
            (StructureScope::Internal, _) => (&mut self.internal_low, &mut self.internal_trend),
            (_, Bias::Bullish) => (&mut self.swing_high, &mut self.swing_trend),
            _ => (&mut self.swing_low, &mut self.swing_trend),
        };
        pivot.crossed = true;
        trend.bias = bias;
    }

    /// Anchor a block on the most extreme parsed bar between the broken pivot
    /// and the current bar (exclusive). Returns the stored block, if any.
    fn store_order_block(
        &mut self,
        scope: StructureScope,
        pivot_index: usize,
        bias: Bias,
    ) -> Option<OrderBlock> {
        let enabled = match scope {
            StructureScope::Internal => self.config.show_internal_order_blocks,
            _ => self.config.show_swing_order_blocks,
        };
        if !enabled {
            return None;
        }

        let end = self.bar_index.len().saturating_sub(1);
        if pivot_index >= end {
            return None;
        }

        let values = match bias {
            Bias::Bearish => &self.parsed_highs[pivot_index..end],
            _ => &self.parsed_lows[pivot_index..end],
        };
        let mut best = 0;
        for (offset, &value) in values.iter().enumerate().skip(1) {
            let better = match bias {
                Bias::Bearish => value > values[best],
                _ => value < values[best],
            };
            if better {
                best = offset;
            }
        }
        let anchor = pivot_index + best;

        let block = OrderBlock {
            bar_high: self.parsed_highs[anchor],
            bar_low: self.parsed_lows[anchor],
            bar_time: *self.open_time.as_slice().get(anchor)?,
            bias,
        };
        match scope {
            StructureScope::Internal => self.internal_order_blocks.store(block),
            _ => self.swing_order_blocks.store(block),
        }
        Some(block)
    }

    fn delete_order_blocks(&mut self, scope: StructureScope) {
        let (Some(&high), Some(&low), Some(&close)) =
            (self.high.current(), self.low.current(), self.close.current())
        else {
            return;
        };
        let (bearish_source, bullish_source) = match self.config.mitigation {
            MitigationSource::Close => (close, close),
            MitigationSource::HighLow => (high, low),
        };

        let removed = match scope {
            StructureScope::Internal => self
                .internal_order_blocks
                .mitigate(bearish_source, bullish_source),
            _ => self.swing_order_blocks.mitigate(bearish_source, bullish_source),
        };
        let index = self.bar_index.len().saturating_sub(1);
        let time = self.open_time.current().copied().unwrap_or_default();
        for block in removed {
            self.alerts.record_mitigation(scope, block.bias);
            self.events.push(StructureEvent {
                scope,
                kind: StructureKind::Mitigated,
                bias: block.bias,
                level: match block.bias {
                    Bias::Bearish => block.bar_high,
                    _ => block.bar_low,
                },
                bar_index: index,
                bar_time: time,
                order_block: Some(block),
            });
        }
    }

    /// Newest internal and swing blocks, cut to the configured sizes
    pub fn output(&self) -> StructureOutput {
        StructureOutput {
            internal: self
                .internal_order_blocks
                .newest(self.config.internal_order_blocks_size),
            swing: self
                .swing_order_blocks
                .newest(self.config.swing_order_blocks_size),
        }
    }

    /// Blocks for the configured output scope, newest first
    pub fn order_blocks(&self) -> Vec<OrderBlock> {
        let output = self.output();
        match self.config.output_scope {
            OutputScope::Internal => output.internal,
            OutputScope::Swing => output.swing,
            OutputScope::Both => {
                let mut blocks = output.internal;
                blocks.extend(output.swing);
                blocks
            }
        }
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    /// Bars accepted so far
    pub fn bar_count(&self) -> usize {
        self.bar_index.len()
    }

    pub fn skipped_bars(&self) -> usize {
        self.skipped_bars
    }

    pub fn atr(&self) -> Option<f64> {
        self.atr.value()
    }

    pub fn parsed_highs(&self) -> &[f64] {
        &self.parsed_highs
    }

    pub fn parsed_lows(&self) -> &[f64] {
        &self.parsed_lows
    }

    pub fn internal_order_blocks(&self) -> &[OrderBlock] {
        self.internal_order_blocks.as_slice()
    }

    pub fn swing_order_blocks(&self) -> &[OrderBlock] {
        self.swing_order_blocks.as_slice()
    }

    pub fn internal_trend(&self) -> Bias {
        self.internal_trend.bias
    }

    pub fn swing_trend(&self) -> Bias {
        self.swing_trend.bias
    }

    pub fn internal_pivots(&self) -> (&Pivot, &Pivot) {
        (&self.internal_high, &self.internal_low)
    }

    pub fn swing_pivots(&self) -> (&Pivot, &Pivot) {
        (&self.swing_high, &self.swing_low)
    }

    pub fn trailing(&self) -> &TrailingExtremes {
        &self.trailing
    }

    /// Flags raised by the latest bar
    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }

    pub fn events(&self) -> &[StructureEvent] {
        &self.events
    }

    /// Take the events recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<StructureEvent> {
        std::mem::take(&mut self.events)
    }
}
