//! # market-structure
//!
//! Smart-money-concepts structure detection over closed OHLC bars: swing and
//! internal pivots, break of structure / change of character, and the order
//! blocks left behind by each break until price mitigates them.
//!
//! ```ignore
//! use market_structure::{Bar, StructureAlgorithm, StructureConfig};
//!
//! let blocks = StructureAlgorithm::replay(StructureConfig::default(), &bars);
//! ```

pub mod algorithm;
pub mod atr;
pub mod bar;
pub mod config;
pub mod error;
pub mod events;
pub mod order_block;
pub mod pivot;
pub mod series;

pub use algorithm::{StructureAlgorithm, StructureOutput};
pub use atr::AverageTrueRange;
pub use bar::Bar;
pub use config::{OutputScope, StructureConfig};
pub use error::{Result, SeriesError};
pub use events::{Alerts, StructureEvent, StructureKind, StructureScope};
pub use order_block::{MitigationSource, OrderBlock, OrderBlockList};
pub use pivot::{Bias, Pivot, TrailingExtremes, Trend};
pub use series::Series;
