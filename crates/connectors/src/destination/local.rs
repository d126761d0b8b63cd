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
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info, warn};

const SCHEMA_FILE: &str = "schema.json";
const STREAMS_DIR: &str = "streams";
const STREAM_SUFFIX: &str = "rows";

/// Summary of a table stored in a local warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub schema: TableSchema,
    pub streams: usize,
    pub rows: u64,
}

struct LocalStream {
    file: fs::File,
    rows: u64,
    /// Length of the file up to the last acknowledged frame.
    bytes: u64,
    finalized: bool,
}

impl LocalStream {
    /// Writes a run of frames. A failed write leaves no partial frame
    /// behind: the file is cut back to the last acknowledged boundary.
    async fn write_frames(&mut self, buf: &[u8]) -> Result<(), DestinationError> {
        let written = async {
            self.file.write_all(buf).await?;
            self.file.flush().await
        }
        .await;

        if let Err(err) = written {
            if let Err(rollback) = self.rollback().await {
                warn!(error = %rollback, bytes = self.bytes, "Could not discard partial frame");
            }
            return Err(err.into());
        }
        self.bytes += buf.len() as u64;
        Ok(())
    }

    async fn rollback(&mut self) -> std::io::Result<()> {
        self.file.set_len(self.bytes).await
    }
}

/// Directory-backed destination.
///
/// Each table lives under `<root>/<project>/<dataset>/<table>/` with its
/// `schema.json`; every write stream is a file of length-prefixed
/// (u32 little-endian) serialized rows.
pub struct LocalDestination {
    root: PathBuf,
    streams: Mutex<HashMap<StreamName, LocalStream>>,
    shut_down: AtomicBool,
}

impl LocalDestination {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            streams: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &TableId) -> PathBuf {
        self.root
            .join(&table.project)
            .join(&table.dataset)
            .join(&table.table)
    }

    /// Provisions a table. Fails if the table already exists.
    pub async fn create_table(
        &self,
        table: &TableId,
        schema: &TableSchema,
    ) -> Result<(), DestinationError> {
        if schema.is_empty() {
            return Err(DestinationError::Generic(format!(
                "Table {table} must have at least one column"
            )));
        }

        let dir = self.table_dir(table);
        let schema_path = dir.join(SCHEMA_FILE);
        if fs::try_exists(&schema_path).await? {
            return Err(DestinationError::TableExists(table.to_string()));
        }

        fs::create_dir_all(dir.join(STREAMS_DIR)).await?;
        fs::write(&schema_path, serde_json::to_vec_pretty(schema)?).await?;
        info!(table = %table, columns = schema.len(), "Created table");
        Ok(())
    }

    pub async fn describe(&self, table: &TableId) -> Result<TableInfo, DestinationError> {
        let schema = self.table_schema(table).await?;
        let files = self.stream_files(table).await?;
        let mut rows = 0;
        for file in &files {
            rows += decode_frames(&fs::read(file).await?, file)?.len() as u64;
        }
        Ok(TableInfo {
            schema,
            streams: files.len(),
            rows,
        })
    }

    /// Every row stored for `table`, grouped by stream file.
    pub async fn read_rows(&self, table: &TableId) -> Result<Vec<Vec<u8>>, DestinationError> {
        let mut rows = Vec::new();
        for file in self.stream_files(table).await? {
            rows.extend(decode_frames(&fs::read(&file).await?, &file)?);
        }
        Ok(rows)
    }

    async fn stream_files(&self, table: &TableId) -> Result<Vec<PathBuf>, DestinationError> {
        let dir = self.table_dir(table).join(STREAMS_DIR);
        if !fs::try_exists(&dir).await? {
            return Err(DestinationError::TableNotFound(table.to_string()));
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(STREAM_SUFFIX) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn ensure_running(&self) -> Result<(), DestinationError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(DestinationError::ShutDown);
        }
        Ok(())
    }
}

#[async_trait]
impl WriteClient for LocalDestination {
    async fn table_schema(&self, table: &TableId) -> Result<TableSchema, DestinationError> {
        let path = self.table_dir(table).join(SCHEMA_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DestinationError::TableNotFound(table.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn create_write_stream(
        &self,
        table: &TableId,
    ) -> Result<WriteStreamInfo, DestinationError> {
        self.ensure_running()?;
        let table_schema = self.table_schema(table).await?;

        let id = uuid::Uuid::new_v4();
        let path = self
            .table_dir(table)
            .join(STREAMS_DIR)
            .join(format!("{id}.{STREAM_SUFFIX}"));
        fs::create_dir_all(self.table_dir(table).join(STREAMS_DIR)).await?;
        let file = fs::OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .await?;

        let name = StreamName::new(format!("{}/streams/{id}", table.resource_path()));
        self.streams.lock().await.insert(
            name.clone(),
            LocalStream {
                file,
                rows: 0,
                bytes: 0,
                finalized: false,
            },
        );

        debug!(stream = %name, path = %path.display(), "Created write stream");
        Ok(WriteStreamInfo { name, table_schema })
    }

    async fn append_rows(
        &self,
        stream: &StreamName,
        rows: AppendRows,
    ) -> Result<AppendAck, DestinationError> {
        self.ensure_running()?;
        let mut streams = self.streams.lock().await;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| DestinationError::StreamNotFound(stream.to_string()))?;
        if entry.finalized {
            return Err(DestinationError::StreamFinalized(stream.to_string()));
        }

        let mut buf = Vec::with_capacity(rows.size_bytes() + rows.len() * 4);
        for row in &rows.serialized_rows {
            let len = u32::try_from(row.len()).map_err(|_| {
                DestinationError::AppendRejected(format!("row of {} bytes is too large", row.len()))
            })?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(row);
        }
        entry.write_frames(&buf).await?;

        let ack = AppendAck {
            offset: entry.rows,
            row_count: rows.len() as u64,
        };
        entry.rows += ack.row_count;
        Ok(ack)
    }

    async fn finalize_write_stream(&self, stream: &StreamName) -> Result<u64, DestinationError> {
        let mut streams = self.streams.lock().await;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| DestinationError::StreamNotFound(stream.to_string()))?;
        if !entry.finalized {
            entry.file.sync_all().await?;
            entry.finalized = true;
        }
        Ok(entry.rows)
    }

    async fn shutdown(&self) -> Result<(), DestinationError> {
        self.shut_down.store(true, Ordering::SeqCst);
        // Closes the underlying files.
        self.streams.lock().await.clear();
        Ok(())
    }
}

fn decode_frames(bytes: &[u8], path: &Path) -> Result<Vec<Vec<u8>>, DestinationError> {
    let mut rows = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let Some((len, tail)) = rest.split_first_chunk::<4>() else {
            return Err(truncated(path));
        };
        let len = u32::from_le_bytes(*len) as usize;
        if tail.len() < len {
            return Err(truncated(path));
        }
        rows.push(tail[..len].to_vec());
        rest = &tail[len..];
    }
    Ok(rows)
}

fn truncated(path: &Path) -> DestinationError {
    DestinationError::Generic(format!("truncated stream file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::{data_type::DataType, schema::FieldSchema};
    use tempfile::tempdir;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            FieldSchema::new("A", DataType::String),
            FieldSchema::new("_filename", DataType::String),
            FieldSchema::new("_inserted_at", DataType::Timestamp),
        ])
    }

    fn rows(payloads: &[&[u8]]) -> AppendRows {
        let mut rows = AppendRows::default();
        for p in payloads {
            rows.push(p.to_vec());
        }
        rows
    }

    #[tokio::test]
    async fn test_create_and_describe_table() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path());
        let table = TableId::new("p", "d", "t");

        dest.create_table(&table, &schema()).await.unwrap();
        assert!(matches!(
            dest.create_table(&table, &schema()).await,
            Err(DestinationError::TableExists(_))
        ));

        let info = dest.describe(&table).await.unwrap();
        assert_eq!(info.schema, schema());
        assert_eq!(info.streams, 0);
        assert_eq!(info.rows, 0);
    }

    #[tokio::test]
    async fn test_append_persists_framed_rows() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path());
        let table = TableId::new("p", "d", "t");
        dest.create_table(&table, &schema()).await.unwrap();

        let stream = dest.create_write_stream(&table).await.unwrap();
        let ack = dest
            .append_rows(&stream.name, rows(&[b"one", b""]))
            .await
            .unwrap();
        assert_eq!(ack, AppendAck { offset: 0, row_count: 2 });
        let ack = dest.append_rows(&stream.name, rows(&[b"three"])).await.unwrap();
        assert_eq!(ack.offset, 2);

        assert_eq!(dest.finalize_write_stream(&stream.name).await.unwrap(), 3);
        dest.shutdown().await.unwrap();

        let stored = dest.read_rows(&table).await.unwrap();
        assert_eq!(stored, vec![b"one".to_vec(), Vec::new(), b"three".to_vec()]);
        assert_eq!(dest.describe(&table).await.unwrap().rows, 3);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path());
        let err = dest
            .create_write_stream(&TableId::new("p", "d", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DestinationError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_partial_frame_is_discarded() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path());
        let table = TableId::new("p", "d", "t");
        dest.create_table(&table, &schema()).await.unwrap();

        let stream = dest.create_write_stream(&table).await.unwrap();
        dest.append_rows(&stream.name, rows(&[b"one"])).await.unwrap();

        {
            // A write that died after the length prefix and two payload bytes.
            let mut streams = dest.streams.lock().await;
            let entry = streams.get_mut(&stream.name).unwrap();
            entry.file.write_all(&[9, 0, 0, 0, b'h', b'a']).await.unwrap();
            entry.file.flush().await.unwrap();
            assert!(dest.read_rows(&table).await.is_err());

            entry.rollback().await.unwrap();
            assert_eq!(entry.bytes, 7);
        }
        assert_eq!(dest.read_rows(&table).await.unwrap(), vec![b"one".to_vec()]);

        let ack = dest.append_rows(&stream.name, rows(&[b"two"])).await.unwrap();
        assert_eq!(ack.offset, 1);
        dest.finalize_write_stream(&stream.name).await.unwrap();

        let stored = dest.read_rows(&table).await.unwrap();
        assert_eq!(stored, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(dest.describe(&table).await.unwrap().rows, 2);
    }

    #[test]
    fn test_truncated_frames_are_rejected() {
        let err = decode_frames(&[5, 0, 0, 0, 1], Path::new("x.rows")).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}
