use thiserror::Error;

/// Error type for stream connections and the pool
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Inbound frame could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Outbound queue is gone (connection task exited)
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No acknowledgment within the subscribe timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Server answered a request with an error
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Channel template still has unresolved placeholders
    #[error("Invalid channel template: {0}")]
    InvalidTemplate(String),

    #[error("Connection is shutting down")]
    Shutdown,
}

/// Result type for streamsockets operations
pub type Result<T> = std::result::Result<T, StreamError>;
