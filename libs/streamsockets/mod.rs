//! # StreamSockets
//!
//! Pooled, self-healing WebSocket connections for exchange combined streams.
//!
//! Many logical channels (`btcusdt@kline_1m`, `ethusdt@kline_5m`, ...) are
//! multiplexed over a small number of sockets. Each socket reconnects on its
//! own after a fixed delay and resubscribes everything it carried, so callers
//! only see the initial subscribe succeed or fail.
//!
//! ```rust,ignore
//! use streamsockets::{StreamConfig, StreamPoolManager};
//!
//! let pool = StreamPoolManager::new(StreamConfig::production())?;
//! let subscription = pool
//!     .subscribe("<symbol>@kline_<interval>", &[("symbol", "BTCUSDT"), ("interval", "1m")],
//!         |channel: &str, payload: &serde_json::Value| println!("{channel}: {payload}"))
//!     .await?;
//! subscription.unsubscribe()?;
//! ```

pub mod core;
pub mod manager;
pub mod traits;

pub use traits::*;

pub use self::core::{
    config, connection, connection_state, protocol, AtomicConnectionState, AtomicMetrics,
    ConnectionState, Inbound, Method, Metrics, SlotReservation, StreamConfig, StreamConnection,
    StreamRequest, PRODUCTION_URL, TESTNET_URL,
};

pub use manager::{expand_template, pool, template, StreamPoolManager, StreamSubscription};
