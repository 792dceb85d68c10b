use crate::application::workers::ComputeError;
use crate::domain::DomainError;
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::history::HistoryError;
use crate::infrastructure::store::StoreError;
use streamsockets::StreamError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
