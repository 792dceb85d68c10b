//! Application Layer
//!
//! Compute workers, their dispatcher and the per-pair orchestrators.

pub mod orchestrator;
pub mod sink;
pub mod workers;

pub use orchestrator::{PairOrchestrator, PairStats, KLINE_CHANNEL_TEMPLATE};
pub use sink::{LoggingSink, OrderBlockSink, OrderBlockUpdate};
pub use workers::{
    Calculation, ComputeError, ComputeWorker, DispatcherStats, PendingCalculation,
    StructureCalculation, WorkerDispatcher,
};
