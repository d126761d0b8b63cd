use connectors::{error::DestinationError, file::csv::error::FileError};
use engine_runtime::error::IngestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the schema file: {0}")]
    SchemaParse(#[from] serde_json::Error),

    #[error("Failed to open the source: {0}")]
    Source(#[from] FileError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Warehouse error: {0}")]
    Destination(#[from] DestinationError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
