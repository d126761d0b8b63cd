use connectors::file::csv::error::FileError;
use engine_core::error::SinkError;
use engine_processing::error::ExecutorError;
use model::codec::ParseError;
use thiserror::Error;

/// The single failure reported by an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed field value or field-count mismatch.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Source error: {0}")]
    Source(#[from] FileError),

    /// An append was rejected by the destination.
    #[error("{0}")]
    Transport(SinkError),

    /// Closing the sink failed and nothing failed before it.
    #[error("{0}")]
    Release(SinkError),

    #[error("Sink error: {0}")]
    Sink(SinkError),

    #[error("Worker panicked: {0}")]
    Worker(String),

    #[error("Ingestion cancelled")]
    Cancelled,
}

impl From<SinkError> for IngestError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Transport { .. } => IngestError::Transport(err),
            SinkError::Release(_) => IngestError::Release(err),
            _ => IngestError::Sink(err),
        }
    }
}

impl From<ExecutorError<IngestError>> for IngestError {
    fn from(err: ExecutorError<IngestError>) -> Self {
        match err {
            ExecutorError::Failed(err) => err,
            ExecutorError::WorkerPanicked(message) => IngestError::Worker(message),
            ExecutorError::Cancelled => IngestError::Cancelled,
        }
    }
}
