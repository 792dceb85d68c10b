//! Where computed order blocks go

use crate::domain::TradingPair;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_structure::{Bar, OrderBlock};
use serde::Serialize;
use tracing::info;

/// Result of one calculation triggered by a closed bar
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBlockUpdate {
    pub key: String,
    pub pair: TradingPair,
    /// The closed bar that triggered the calculation
    pub bar: Bar,
    /// Newest first
    pub blocks: Vec<OrderBlock>,
}

/// Downstream consumer of order-block updates (gateway, notifier, ...)
#[async_trait]
pub trait OrderBlockSink: Send + Sync + 'static {
    async fn publish(&self, update: &OrderBlockUpdate);
}

/// Writes every update to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

pub(crate) fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[async_trait]
impl OrderBlockSink for LoggingSink {
    async fn publish(&self, update: &OrderBlockUpdate) {
        let newest = update
            .blocks
            .first()
            .map(|b| {
                format!(
                    "newest {:?} [{} - {}] @ {}",
                    b.bias,
                    b.bar_low,
                    b.bar_high,
                    format_time(b.bar_time)
                )
            })
            .unwrap_or_else(|| "none".to_string());

        info!(
            "[Pair {}] close {} @ {}: {} order blocks, {}",
            update.pair,
            update.bar.close,
            format_time(update.bar.open_time),
            update.blocks.len(),
            newest
        );
    }
}
