//! Domain Layer
//!
//! Market data types shared by the stream handlers, the bar store and the
//! orchestrators.

pub mod kline;
pub mod pair;

pub use kline::{KlineData, KlineEvent};
pub use pair::TradingPair;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid kline: {0}")]
    InvalidKline(String),
}
