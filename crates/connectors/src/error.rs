use thiserror::Error;

/// Failures reported by a destination client.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Write stream not found: {0}")]
    StreamNotFound(String),

    /// The stream no longer accepts appends.
    #[error("Write stream already finalized: {0}")]
    StreamFinalized(String),

    /// The destination refused an append request.
    #[error("Append rejected: {0}")]
    AppendRejected(String),

    #[error("Destination client is shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid table schema: {0}")]
    InvalidSchema(#[from] serde_json::Error),

    #[error("Destination error: {0}")]
    Generic(String),
}
