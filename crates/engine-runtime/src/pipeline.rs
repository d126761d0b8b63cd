//! Drives one ingestion run: source records are batched, converted and
//! serialized by a bounded pool of workers and appended to a single write
//! stream, which is closed on every exit path.

use crate::{error::IngestError, settings::IngestSettings};
use chrono::Utc;
use connectors::{
    destination::WriteClient,
    file::csv::{error::FileError, source::CsvSource},
};
use engine_core::{
    convert::RowConverter,
    metrics::{IngestStats, StatsSnapshot},
    serializer::RowSerializer,
    sink::{AppendSink, WriteStream},
};
use engine_processing::{chunker::try_chunked, executor::BoundedExecutor};
use futures::{Stream, TryStreamExt};
use model::{
    core::identifiers::{StreamName, TableId},
    records::{batch::Batch, raw::RawRecord, row::RowMetadata},
};
use std::{fmt, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Streaming,
    Draining,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Streaming => "streaming",
            Phase::Draining => "draining",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub table: TableId,
    pub stream: StreamName,
    pub snapshot: StatsSnapshot,
}

pub struct Pipeline {
    client: Arc<dyn WriteClient>,
    settings: IngestSettings,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(client: Arc<dyn WriteClient>, settings: IngestSettings) -> Self {
        Self {
            client,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Ingests a CSV source. Its file name is the default source identifier.
    pub async fn run_csv(
        &self,
        table: &TableId,
        source: CsvSource,
    ) -> Result<IngestReport, IngestError> {
        let source_name = source.name().to_string();
        self.run(table, &source_name, source.into_stream()).await
    }

    /// Ingests `records` into `table`. `source_name` is injected into every
    /// row unless the settings carry an explicit source identifier.
    pub async fn run<S>(
        &self,
        table: &TableId,
        source_name: &str,
        records: S,
    ) -> Result<IngestReport, IngestError>
    where
        S: Stream<Item = Result<RawRecord, FileError>>,
    {
        let stats = IngestStats::new();
        let meta = RowMetadata::new(
            self.settings.source_id_or(source_name),
            self.settings.ingested_at.unwrap_or_else(Utc::now),
        );
        enter(Phase::Init, table);
        info!(
            source = %meta.source_id,
            ingested_at = %meta.ingested_at,
            chunk_size = self.settings.chunk_size.get(),
            parallelism = self.settings.parallelism.get(),
            "Starting ingestion"
        );

        let sink = AppendSink::new(Arc::clone(&self.client))
            .with_close_timeout(self.settings.close_timeout);
        let executor = BoundedExecutor::new(self.settings.parallelism)
            .with_cancellation(self.cancel.clone());
        let chunk_size = self.settings.chunk_size;
        let batch_stats = stats.clone();

        let stream_name = sink
            .scoped(table, |stream| async move {
                let worker = Arc::new(BatchWorker::new(Arc::clone(&stream), meta, batch_stats));
                enter(Phase::Streaming, table);

                let batches = try_chunked(records.map_err(IngestError::from), chunk_size);
                let result = executor
                    .try_run(batches, move |batch| {
                        let worker = Arc::clone(&worker);
                        async move { worker.process(batch).await }
                    })
                    .await;

                enter(Phase::Draining, table);
                result?;
                Ok::<_, IngestError>(stream.name().clone())
            })
            .await?;

        enter(Phase::Closed, table);
        let snapshot = stats.report();

        Ok(IngestReport {
            table: table.clone(),
            stream: stream_name,
            snapshot,
        })
    }
}

fn enter(phase: Phase, table: &TableId) {
    info!(table = %table, phase = %phase, "Pipeline phase");
}

/// Per-batch unit of work shared by every executor worker.
struct BatchWorker {
    converter: RowConverter,
    serializer: RowSerializer,
    stream: Arc<WriteStream>,
    stats: IngestStats,
}

impl BatchWorker {
    fn new(stream: Arc<WriteStream>, meta: RowMetadata, stats: IngestStats) -> Self {
        let descriptor = stream.descriptor();
        Self {
            converter: RowConverter::new(Arc::clone(&descriptor), meta),
            serializer: RowSerializer::new(descriptor),
            stream,
            stats,
        }
    }

    async fn process(&self, batch: Batch<RawRecord>) -> Result<(), IngestError> {
        let rows = batch.len();
        // Counted on receipt, before conversion.
        self.stats.add_rows(rows as u64);

        let started = Instant::now();
        let typed = self.converter.convert_all(&batch.rows)?;
        let payload = self.serializer.serialize_batch(&typed)?;
        self.stats.record_local(started.elapsed());

        let bytes = payload.size_bytes() as u64;
        let started = Instant::now();
        let ack = self.stream.append(payload).await?;
        self.stats.record_remote(started.elapsed());
        self.stats.add_batch(bytes);

        debug!(
            batch = batch.index,
            rows,
            bytes,
            offset = ack.offset,
            "Batch appended"
        );
        Ok(())
    }
}
