//! Order-Block Scanner - Main Library
//!
//! Re-exports the workspace libraries and the helpers shared by binaries.
//!
//! ## Architecture
//!
//! - **streamsockets**: pooled exchange stream connections
//! - **market_structure**: pivot, structure-break and order-block detection
//! - **scanner**: workers, dispatcher, per-pair orchestration, config
//! - **bin_common**: config path resolution and the binary runner
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use orderblock_scanner::bin_common::{load_config_from_env, ConfigType};
//! use orderblock_scanner::scanner::ScannerConfig;
//! ```

pub use market_structure;
pub use scanner;
pub use streamsockets;

// Binary common utilities
pub mod bin_common {
    //! Shared pieces of the binaries: where the config lives and how a
    //! long-running service reports and stops.

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
