//! Per-pair glue between the kline stream, the bar store and the dispatcher

use super::sink::{format_time, OrderBlockSink, OrderBlockUpdate};
use super::workers::WorkerDispatcher;
use crate::domain::{KlineEvent, TradingPair};
use crate::error::Result;
use crate::infrastructure::history::HistorySource;
use crate::infrastructure::store::BarStore;
use market_structure::{Bar, OrderBlock};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use streamsockets::{StreamPoolManager, StreamSubscription};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const KLINE_CHANNEL_TEMPLATE: &str = "<symbol>@kline_<interval>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairStats {
    pub bars_appended: u64,
    /// Closed bars not newer than the buffer tail
    pub stale_bars: u64,
    pub calculations: u64,
    pub failures: u64,
}

#[derive(Default)]
struct PairCounters {
    bars_appended: AtomicU64,
    stale_bars: AtomicU64,
    calculations: AtomicU64,
    failures: AtomicU64,
}

/// Owns one (symbol, interval) pair's buffer.
///
/// Each closed kline is appended to the buffer, the buffer is trimmed to the
/// retention window, one calculation runs and its order blocks are published.
/// Klines are handled one at a time in arrival order.
pub struct PairOrchestrator {
    pair: TradingPair,
    key: String,
    retention: usize,
    store: Arc<dyn BarStore>,
    dispatcher: Arc<WorkerDispatcher>,
    sink: Arc<dyn OrderBlockSink>,
    subscription: Mutex<Option<StreamSubscription>>,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: PairCounters,
}

impl PairOrchestrator {
    pub fn new(
        pair: TradingPair,
        exchange: &str,
        retention: usize,
        store: Arc<dyn BarStore>,
        dispatcher: Arc<WorkerDispatcher>,
        sink: Arc<dyn OrderBlockSink>,
    ) -> Self {
        let key = pair.buffer_key(exchange);
        Self {
            pair,
            key,
            retention,
            store,
            dispatcher,
            sink,
            subscription: Mutex::new(None),
            task: Mutex::new(None),
            counters: PairCounters::default(),
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    /// Bar store key of this pair's buffer
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn is_watching(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .map_or(false, StreamSubscription::is_active)
    }

    pub fn stats(&self) -> PairStats {
        let c = &self.counters;
        PairStats {
            bars_appended: c.bars_appended.load(Ordering::Relaxed),
            stale_bars: c.stale_bars.load(Ordering::Relaxed),
            calculations: c.calculations.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    /// Seed the buffer with historical bars.
    ///
    /// Bars are sorted oldest first; non-finite bars, duplicate open times and
    /// bars not newer than the current tail are dropped. Returns the buffer
    /// length afterwards.
    pub async fn bootstrap(&self, mut history: Vec<Bar>) -> Result<usize> {
        let offered = history.len();
        history.retain(Bar::is_finite);
        history.sort_by_key(|bar| bar.open_time);
        history.dedup_by_key(|bar| bar.open_time);

        if let Some(tail) = self.store.last(&self.key).await? {
            history.retain(|bar| bar.open_time > tail.open_time);
        }

        self.store.extend(&self.key, &history).await?;
        let trimmed = self.store.trim_front(&self.key, self.retention).await?;
        let len = self.store.len(&self.key).await?;
        self.counters
            .bars_appended
            .fetch_add(history.len() as u64, Ordering::Relaxed);

        info!(
            "[Pair {}] Bootstrapped {} of {} bars ({} trimmed, {} buffered)",
            self.pair,
            history.len(),
            offered,
            trimmed,
            len
        );
        Ok(len)
    }

    /// Bootstrap from `source`, taking at most one retention window
    pub async fn warm_up(&self, source: &dyn HistorySource) -> Result<usize> {
        let history = source.load(&self.pair, self.retention).await?;
        self.bootstrap(history).await
    }

    /// Handle one kline event. Open klines are ignored and yield `None`.
    pub async fn on_kline(&self, event: &KlineEvent) -> Result<Option<Vec<OrderBlock>>> {
        if !event.is_closed() {
            return Ok(None);
        }
        let bar = event.kline.to_bar()?;
        self.on_closed_bar(bar).await
    }

    /// Append `bar`, trim, calculate and publish.
    ///
    /// Yields `None` when `bar` is not newer than the buffer tail.
    pub async fn on_closed_bar(&self, bar: Bar) -> Result<Option<Vec<OrderBlock>>> {
        if let Some(tail) = self.store.last(&self.key).await? {
            if bar.open_time <= tail.open_time {
                self.counters.stale_bars.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "[Pair {}] Ignoring bar @ {} (tail @ {})",
                    self.pair,
                    format_time(bar.open_time),
                    format_time(tail.open_time)
                );
                return Ok(None);
            }
        }

        self.store.append(&self.key, bar).await?;
        self.counters.bars_appended.fetch_add(1, Ordering::Relaxed);
        self.store.trim_front(&self.key, self.retention).await?;

        let blocks = match self.dispatcher.calculate(&self.key).await {
            Ok(blocks) => blocks,
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };
        self.counters.calculations.fetch_add(1, Ordering::Relaxed);

        let update = OrderBlockUpdate {
            key: self.key.clone(),
            pair: self.pair.clone(),
            bar,
            blocks,
        };
        self.sink.publish(&update).await;
        Ok(Some(update.blocks))
    }

    /// Subscribe to this pair's kline channel and process closed klines as
    /// they arrive
    pub async fn watch(self: &Arc<Self>, pool: &StreamPoolManager) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let handler = move |_channel: &str, payload: &Value| {
            let _ = tx.send(payload.clone());
        };

        let subscription = pool
            .subscribe(
                KLINE_CHANNEL_TEMPLATE,
                &[
                    ("symbol", self.pair.symbol.as_str()),
                    ("interval", self.pair.interval.as_str()),
                ],
                handler,
            )
            .await?;
        info!(
            "[Pair {}] Watching {} on connection {}",
            self.pair,
            subscription.channel(),
            subscription.connection_id()
        );

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                this.handle_payload(&payload).await;
            }
        });

        if let Some(previous) = self.subscription.lock().replace(subscription) {
            let _ = previous.unsubscribe();
        }
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn handle_payload(&self, payload: &Value) {
        let event = match KlineEvent::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("[Pair {}] Dropping payload: {}", self.pair, e);
                return;
            }
        };

        if let Err(e) = self.on_kline(&event).await {
            warn!("[Pair {}] Closed kline not processed: {}", self.pair, e);
        }
    }

    /// Stop watching the kline channel
    pub fn unwatch(&self) -> Result<()> {
        let subscription = self.subscription.lock().take();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        if let Some(subscription) = subscription {
            subscription.unsubscribe()?;
            info!("[Pair {}] Stopped watching", self.pair);
        }
        Ok(())
    }
}
