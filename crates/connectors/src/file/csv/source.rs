use crate::file::{
    compression,
    csv::{error::FileError, settings::CsvSettings},
};
use futures_util::stream::{self, Stream};
use model::records::raw::RawRecord;
use std::{
    io::Read,
    path::{Path, PathBuf},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

type RecordResult = Result<RawRecord, FileError>;

/// Lazily decoded delimited file.
///
/// Decoding happens on a blocking thread which feeds a small bounded channel,
/// so at most `read_ahead` records are buffered ahead of the consumer.
/// Dropping the stream stops the reader at its next record.
pub struct CsvSource {
    name: String,
    rx: mpsc::Receiver<RecordResult>,
    reader: JoinHandle<()>,
}

impl CsvSource {
    /// Opens a local file, transparently decompressing `.gz` and `.zip`.
    /// Must be called from within a tokio runtime.
    pub fn open(path: impl AsRef<Path>, settings: CsvSettings) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();
        if let Err(err) = std::fs::metadata(&path) {
            return Err(FileError::from_open(&shown, err));
        }
        settings.delimiter_byte()?;

        let name = source_name(&path);
        info!(source = %shown, "Opening CSV source");

        let (tx, rx) = mpsc::channel(settings.read_ahead.max(1));
        let reader = tokio::task::spawn_blocking(move || read_file(path, settings, tx));
        Ok(CsvSource { name, rx, reader })
    }

    /// Streams records from any reader, e.g. an in-memory buffer.
    pub fn from_reader<R>(name: impl Into<String>, reader: R, settings: CsvSettings) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(settings.read_ahead.max(1));
        let reader = tokio::task::spawn_blocking(move || {
            let mut reader = reader;
            if let Err(err) = pump(&mut reader, &settings, &tx) {
                let _ = tx.blocking_send(Err(err));
            }
        });
        CsvSource {
            name: name.into(),
            rx,
            reader,
        }
    }

    /// File name of the source, used as the default source identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consumes the source as a stream of records in file order. The stream
    /// ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = RecordResult> + Send + 'static {
        let CsvSource { rx, reader, .. } = self;
        stream::unfold(Some((rx, reader)), |state| async move {
            let (mut rx, reader) = state?;
            match rx.recv().await {
                Some(Ok(record)) => Some((Ok(record), Some((rx, reader)))),
                Some(Err(err)) => Some((Err(err), None)),
                None => {
                    if let Err(err) = reader.await {
                        return Some((Err(FileError::ReadError(err.to_string())), None));
                    }
                    None
                }
            }
        })
    }
}

/// Last path segment, without directories.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_file(path: PathBuf, settings: CsvSettings, tx: mpsc::Sender<RecordResult>) {
    let result = compression::read_with(&path, |reader| pump(reader, &settings, &tx));
    if let Err(err) = result {
        // Send failures only mean the consumer is gone.
        let _ = tx.blocking_send(Err(err));
    }
}

/// Decodes records into `tx` until the input or the consumer ends. Record
/// errors are forwarded and terminate the read.
fn pump(
    reader: &mut dyn Read,
    settings: &CsvSettings,
    tx: &mpsc::Sender<RecordResult>,
) -> Result<(), FileError> {
    let mut csv = settings.reader_builder()?.from_reader(reader);
    let mut record = csv::StringRecord::new();
    let mut count = 0u64;

    loop {
        match csv.read_record(&mut record) {
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or(count + 1);
                let fields = record.iter().map(String::from).collect();
                count += 1;
                if tx.blocking_send(Ok(RawRecord::new(line, fields))).is_err() {
                    debug!(records = count, "CSV consumer dropped, stopping reader");
                    return Ok(());
                }
            }
            Ok(false) => {
                debug!(records = count, "CSV source exhausted");
                return Ok(());
            }
            Err(err) => {
                warn!(records = count, error = %err, "CSV read failed");
                let _ = tx.blocking_send(Err(FileError::CsvError(err)));
                return Ok(());
            }
        }
    }
}
