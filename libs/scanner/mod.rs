//! # Scanner
//!
//! Live order-block scanner: closed klines from the stream pool are buffered
//! per pair, every new bar triggers a structure replay on a bounded pool of
//! compute workers, and the resulting order blocks go to a sink.
//!
//! ## Modules
//!
//! - `domain`: kline payloads and trading pairs
//! - `infrastructure`: config, logging, shutdown, bar history, bar store
//! - `application`: workers, dispatcher, orchestrators

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{
    Calculation, ComputeError, DispatcherStats, LoggingSink, OrderBlockSink, OrderBlockUpdate,
    PairOrchestrator, PairStats, PendingCalculation, StructureCalculation, WorkerDispatcher,
    KLINE_CHANNEL_TEMPLATE,
};
pub use domain::{DomainError, KlineEvent, TradingPair};
pub use error::{Result, ScannerError};
pub use infrastructure::{
    init_tracing, BarStore, ConfigError, HistoryError, HistorySource, InMemoryBarStore,
    JsonFileHistory, ScannerConfig, ShutdownManager, StoreError,
};
