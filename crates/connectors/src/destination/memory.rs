use crate::{
    destination::{WriteClient, WriteStreamInfo},
    error::DestinationError,
};
use async_trait::async_trait;
use model::{
    core::{
        identifiers::{StreamName, TableId},
        schema::TableSchema,
    },
    records::append::{AppendAck, AppendRows},
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::debug;

/// Failures and latency injected into a [`MemoryDestination`].
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// 1-based index of the append call that is rejected.
    pub fail_append_at: Option<u64>,
    pub fail_create: bool,
    pub fail_finalize: bool,
    pub fail_shutdown: bool,
    pub append_delay: Option<Duration>,
    /// Report multi-writer framing so appends are not serialized by callers.
    pub concurrent_appends: bool,
}

/// Call counters of a [`MemoryDestination`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub create_calls: u64,
    pub append_calls: u64,
    pub finalize_calls: u64,
    pub shutdown_calls: u64,
    /// Highest number of appends observed in flight at once.
    pub max_concurrent_appends: u64,
}

#[derive(Debug, Default)]
struct MemoryStream {
    table: Option<TableId>,
    appends: Vec<AppendRows>,
    rows: u64,
    finalized: bool,
}

#[derive(Default)]
struct MemoryState {
    tables: Mutex<HashMap<TableId, TableSchema>>,
    streams: Mutex<HashMap<StreamName, MemoryStream>>,
    create_calls: AtomicU64,
    append_calls: AtomicU64,
    finalize_calls: AtomicU64,
    shutdown_calls: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
    shut_down: AtomicBool,
}

/// In-process destination that records every request. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryDestination {
    state: Arc<MemoryState>,
    faults: FaultPlan,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: TableId, schema: TableSchema) -> Self {
        if let Ok(mut tables) = self.state.tables.lock() {
            tables.insert(table, schema);
        }
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    pub fn fail_append_at(mut self, call: u64) -> Self {
        self.faults.fail_append_at = Some(call);
        self
    }

    pub fn with_append_delay(mut self, delay: Duration) -> Self {
        self.faults.append_delay = Some(delay);
        self
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            create_calls: self.state.create_calls.load(Ordering::SeqCst),
            append_calls: self.state.append_calls.load(Ordering::SeqCst),
            finalize_calls: self.state.finalize_calls.load(Ordering::SeqCst),
            shutdown_calls: self.state.shutdown_calls.load(Ordering::SeqCst),
            max_concurrent_appends: self.state.max_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Accepted appends of a stream, in acknowledgment order.
    pub fn appends(&self, stream: &StreamName) -> Vec<AppendRows> {
        self.state
            .streams
            .lock()
            .map(|streams| {
                streams
                    .get(stream)
                    .map(|s| s.appends.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// All serialized rows appended to a table across its streams.
    pub fn rows(&self, table: &TableId) -> Vec<Vec<u8>> {
        let Ok(streams) = self.state.streams.lock() else {
            return Vec::new();
        };
        streams
            .values()
            .filter(|s| s.table.as_ref() == Some(table))
            .flat_map(|s| s.appends.iter())
            .flat_map(|a| a.serialized_rows.iter().cloned())
            .collect()
    }

    pub fn stream_names(&self) -> Vec<StreamName> {
        self.state
            .streams
            .lock()
            .map(|streams| streams.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_running(&self) -> Result<(), DestinationError> {
        if self.state.shut_down.load(Ordering::SeqCst) {
            return Err(DestinationError::ShutDown);
        }
        Ok(())
    }

    fn store(&self, stream: &StreamName, rows: AppendRows) -> Result<AppendAck, DestinationError> {
        let mut streams = self
            .state
            .streams
            .lock()
            .map_err(|_| DestinationError::Generic("stream registry poisoned".into()))?;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| DestinationError::StreamNotFound(stream.to_string()))?;
        if entry.finalized {
            return Err(DestinationError::StreamFinalized(stream.to_string()));
        }

        let ack = AppendAck {
            offset: entry.rows,
            row_count: rows.len() as u64,
        };
        entry.rows += ack.row_count;
        entry.appends.push(rows);
        Ok(ack)
    }
}

#[async_trait]
impl WriteClient for MemoryDestination {
    async fn table_schema(&self, table: &TableId) -> Result<TableSchema, DestinationError> {
        self.ensure_running()?;
        let tables = self
            .state
            .tables
            .lock()
            .map_err(|_| DestinationError::Generic("table registry poisoned".into()))?;
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| DestinationError::TableNotFound(table.to_string()))
    }

    async fn create_write_stream(
        &self,
        table: &TableId,
    ) -> Result<WriteStreamInfo, DestinationError> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_create {
            return Err(DestinationError::Generic("injected create failure".into()));
        }

        let table_schema = self.table_schema(table).await?;
        let name = StreamName::new(format!(
            "{}/streams/{}",
            table.resource_path(),
            uuid::Uuid::new_v4()
        ));

        let mut streams = self
            .state
            .streams
            .lock()
            .map_err(|_| DestinationError::Generic("stream registry poisoned".into()))?;
        streams.insert(
            name.clone(),
            MemoryStream {
                table: Some(table.clone()),
                ..Default::default()
            },
        );

        debug!(stream = %name, "Created write stream");
        Ok(WriteStreamInfo { name, table_schema })
    }

    async fn append_rows(
        &self,
        stream: &StreamName,
        rows: AppendRows,
    ) -> Result<AppendAck, DestinationError> {
        self.ensure_running()?;
        let call = self.state.append_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.faults.append_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.faults.fail_append_at == Some(call) {
            Err(DestinationError::AppendRejected(format!(
                "injected failure on append {call}"
            )))
        } else {
            self.store(stream, rows)
        };

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn finalize_write_stream(&self, stream: &StreamName) -> Result<u64, DestinationError> {
        self.state.finalize_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_finalize {
            return Err(DestinationError::Generic("injected finalize failure".into()));
        }

        let mut streams = self
            .state
            .streams
            .lock()
            .map_err(|_| DestinationError::Generic("stream registry poisoned".into()))?;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| DestinationError::StreamNotFound(stream.to_string()))?;
        entry.finalized = true;
        Ok(entry.rows)
    }

    async fn shutdown(&self) -> Result<(), DestinationError> {
        self.state.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.state.shut_down.store(true, Ordering::SeqCst);
        if self.faults.fail_shutdown {
            return Err(DestinationError::Generic("injected shutdown failure".into()));
        }
        Ok(())
    }

    fn single_writer(&self) -> bool {
        !self.faults.concurrent_appends
    }
}
