//! Lifecycle of the single write stream of a run.
//!
//! The sink is opened once, shared by all workers through
//! `Arc<WriteStream>`, and closed exactly once by its owner. Closing
//! finalizes the stream and shuts the client down, each bounded by a
//! timeout; every release step is attempted even when an earlier one fails.

use crate::{
    descriptor::Descriptor,
    error::{ReleaseError, SinkError},
};
use connectors::{destination::WriteClient, error::DestinationError};
use model::{
    core::identifiers::{StreamName, TableId},
    records::append::{AppendAck, AppendRows},
};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Unopened = 0,
    Open = 1,
    Closed = 2,
}

impl SinkState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SinkState::Unopened,
            1 => SinkState::Open,
            _ => SinkState::Closed,
        }
    }
}

/// Handle to an open committed write stream.
pub struct WriteStream {
    name: StreamName,
    descriptor: Arc<Descriptor>,
    client: Arc<dyn WriteClient>,
    /// Present when the client requires appends to be serialized.
    append_gate: Option<Mutex<()>>,
    closed: AtomicBool,
    rows_appended: AtomicU64,
}

impl WriteStream {
    pub fn name(&self) -> &StreamName {
        &self.name
    }

    pub fn descriptor(&self) -> Arc<Descriptor> {
        Arc::clone(&self.descriptor)
    }

    pub fn rows_appended(&self) -> u64 {
        self.rows_appended.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends one batch and waits for its acknowledgment.
    pub async fn append(&self, rows: AppendRows) -> Result<AppendAck, SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed(self.name.to_string()));
        }

        let _guard = match &self.append_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let count = rows.len();
        let ack = self
            .client
            .append_rows(&self.name, rows)
            .await
            .map_err(|source| SinkError::Transport {
                stream: self.name.to_string(),
                source,
            })?;

        self.rows_appended
            .fetch_add(count as u64, Ordering::Relaxed);
        debug!(stream = %self.name, offset = ack.offset, rows = ack.row_count, "Append acknowledged");
        Ok(ack)
    }
}

/// Owner of the destination client for one run.
pub struct AppendSink {
    client: Arc<dyn WriteClient>,
    state: AtomicU8,
    close_timeout: Duration,
}

impl AppendSink {
    pub fn new(client: Arc<dyn WriteClient>) -> Self {
        Self {
            client,
            state: AtomicU8::new(SinkState::Unopened as u8),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Creates the committed write stream and derives the row descriptor
    /// from the schema it reports. May be called once.
    pub async fn open(&self, table: &TableId) -> Result<Arc<WriteStream>, SinkError> {
        if self
            .state
            .compare_exchange(
                SinkState::Unopened as u8,
                SinkState::Open as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(SinkError::AlreadyOpened);
        }

        let info = self
            .client
            .create_write_stream(table)
            .await
            .map_err(|source| SinkError::Open {
                table: table.to_string(),
                source,
            })?;

        let descriptor = match Descriptor::from_schema(&info.table_schema) {
            Ok(descriptor) => Arc::new(descriptor),
            Err(err) => {
                // The stream exists server side; seal it before giving up.
                match self
                    .bounded("finalize", self.client.finalize_write_stream(&info.name))
                    .await
                {
                    Ok(_) => debug!(stream = %info.name, "Finalized stream after schema error"),
                    Err(Ok(source)) => {
                        warn!(stream = %info.name, error = %source, "Finalize failed after schema error")
                    }
                    Err(Err(timeout)) => {
                        warn!(stream = %info.name, error = %timeout, "Finalize failed after schema error")
                    }
                }
                return Err(err);
            }
        };
        let append_gate = self.client.single_writer().then(|| Mutex::new(()));

        info!(
            table = %table,
            stream = %info.name,
            columns = descriptor.len(),
            single_writer = append_gate.is_some(),
            "Write stream opened"
        );

        Ok(Arc::new(WriteStream {
            name: info.name,
            descriptor,
            client: Arc::clone(&self.client),
            append_gate,
            closed: AtomicBool::new(false),
            rows_appended: AtomicU64::new(0),
        }))
    }

    /// Finalizes the stream and shuts the client down. Returns the final row
    /// count reported by the destination.
    pub async fn close(&self, stream: &WriteStream) -> Result<u64, SinkError> {
        if stream.closed.swap(true, Ordering::SeqCst) {
            return Err(SinkError::Closed(stream.name.to_string()));
        }

        // Let an append that already holds the gate complete first.
        if let Some(gate) = &stream.append_gate {
            let _ = gate.lock().await;
        }

        let mut failures = Vec::new();

        let finalized = match self
            .bounded("finalize", self.client.finalize_write_stream(&stream.name))
            .await
        {
            Ok(rows) => Some(rows),
            Err(Ok(source)) => {
                failures.push(ReleaseError::Finalize {
                    stream: stream.name.to_string(),
                    source,
                });
                None
            }
            Err(Err(timeout)) => {
                failures.push(timeout);
                None
            }
        };

        self.release_client(&mut failures).await;
        self.state.store(SinkState::Closed as u8, Ordering::SeqCst);

        if !failures.is_empty() {
            for failure in &failures {
                error!(stream = %stream.name, error = %failure, "Release step failed");
            }
            return Err(SinkError::Release(failures));
        }

        let rows = finalized.unwrap_or_default();
        info!(stream = %stream.name, rows, "Write stream closed");
        Ok(rows)
    }

    /// Opens the stream, runs `body` with it and always closes it. A failure
    /// of `body` takes precedence over release failures, which are logged.
    pub async fn scoped<T, E, F, Fut>(&self, table: &TableId, body: F) -> Result<T, E>
    where
        F: FnOnce(Arc<WriteStream>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SinkError>,
    {
        let stream = match self.open(table).await {
            Ok(stream) => stream,
            Err(err) => {
                let mut failures = Vec::new();
                self.release_client(&mut failures).await;
                self.state.store(SinkState::Closed as u8, Ordering::SeqCst);
                for failure in &failures {
                    warn!(error = %failure, "Release failed after open error");
                }
                return Err(err.into());
            }
        };

        let result = body(Arc::clone(&stream)).await;
        let closed = self.close(&stream).await;

        match (result, closed) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(release)) => Err(release.into()),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(release)) => {
                warn!(error = %release, "Release failed after an earlier error");
                Err(err)
            }
        }
    }

    async fn release_client(&self, failures: &mut Vec<ReleaseError>) {
        match self.bounded("shutdown", self.client.shutdown()).await {
            Ok(()) => {}
            Err(Ok(source)) => failures.push(ReleaseError::Shutdown(source)),
            Err(Err(timeout)) => failures.push(timeout),
        }
    }

    /// Runs a release step under the close timeout. The outer error is the
    /// step failure, the inner one a timeout.
    async fn bounded<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<T, DestinationError>>,
    ) -> Result<T, Result<DestinationError, ReleaseError>> {
        match tokio::time::timeout(self.close_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(Ok(err)),
            Err(_) => Err(Err(ReleaseError::Timeout {
                step,
                timeout: self.close_timeout,
            })),
        }
    }
}
