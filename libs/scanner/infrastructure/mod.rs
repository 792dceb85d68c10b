//! Infrastructure Layer
//!
//! Configuration, logging, shutdown signalling, bar history and the bar store.

pub mod config;
pub mod history;
pub mod logging;
pub mod shutdown;
pub mod store;

pub use config::{ConfigError, ScannerConfig};
pub use history::{HistoryError, HistorySource, JsonFileHistory};
pub use logging::init_tracing;
pub use shutdown::ShutdownManager;
pub use store::{BarStore, InMemoryBarStore, StoreError};
