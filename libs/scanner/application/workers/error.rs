use crate::infrastructure::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("Bar store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker fault while computing {key}: {reason}")]
    WorkerFault { key: String, reason: String },

    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Dispatcher is shut down")]
    DispatcherClosed,
}

pub type Result<T> = std::result::Result<T, ComputeError>;
