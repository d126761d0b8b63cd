use crate::error::DestinationError;
use async_trait::async_trait;
use model::{
    core::{identifiers::StreamName, identifiers::TableId, schema::TableSchema},
    records::append::{AppendAck, AppendRows},
};

pub mod local;
pub mod memory;

/// A committed write stream as returned by the destination: rows become
/// visible as soon as an append is acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStreamInfo {
    pub name: StreamName,
    /// Table schema at stream creation; the row descriptor is derived from it.
    pub table_schema: TableSchema,
}

/// Pre-authenticated handle to the append-only destination.
#[async_trait]
pub trait WriteClient: Send + Sync {
    async fn table_schema(&self, table: &TableId) -> Result<TableSchema, DestinationError>;

    async fn create_write_stream(&self, table: &TableId)
    -> Result<WriteStreamInfo, DestinationError>;

    async fn append_rows(
        &self,
        stream: &StreamName,
        rows: AppendRows,
    ) -> Result<AppendAck, DestinationError>;

    /// Seals the stream and returns its final row count.
    async fn finalize_write_stream(&self, stream: &StreamName) -> Result<u64, DestinationError>;

    /// Releases connections held by the client.
    async fn shutdown(&self) -> Result<(), DestinationError>;

    /// Whether concurrent appends on one stream must be serialized by the
    /// caller.
    fn single_writer(&self) -> bool {
        true
    }
}
