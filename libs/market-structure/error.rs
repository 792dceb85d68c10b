use thiserror::Error;

/// Errors raised while reading bar history
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// Not enough history to look `index` bars back
    #[error("index {index} out of range for series of length {len}")]
    OutOfRange { index: usize, len: usize },
}

/// Result type for series lookups
pub type Result<T> = std::result::Result<T, SeriesError>;
