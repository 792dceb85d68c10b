//! Compute workers and the dispatcher that schedules them

pub mod calculation;
pub mod dispatcher;
pub mod error;
pub mod worker;

pub use calculation::{Calculation, StructureCalculation};
pub use dispatcher::{DispatcherStats, PendingCalculation, WorkerDispatcher};
pub use error::{ComputeError, Result};
pub use worker::ComputeWorker;
