use connectors::error::DestinationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to open write stream for {table}: {source}")]
    Open {
        table: String,
        #[source]
        source: DestinationError,
    },

    /// The destination rejected or failed an append.
    #[error("Append to {stream} failed: {source}")]
    Transport {
        stream: String,
        #[source]
        source: DestinationError,
    },

    /// One entry per sub-resource that could not be released.
    #[error("Failed to release write stream: {}", join_release(.0))]
    Release(Vec<ReleaseError>),

    #[error("Sink already opened")]
    AlreadyOpened,

    #[error("Write stream {0} is closed")]
    Closed(String),

    #[error("Invalid table schema: {0}")]
    Schema(String),
}

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("finalize of {stream} failed: {source}")]
    Finalize {
        stream: String,
        #[source]
        source: DestinationError,
    },

    #[error("client shutdown failed: {0}")]
    Shutdown(#[source] DestinationError),

    #[error("{step} did not complete within {timeout:?}")]
    Timeout {
        step: &'static str,
        timeout: Duration,
    },
}

fn join_release(errors: &[ReleaseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
