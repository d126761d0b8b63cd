use chrono::{DateTime, Utc};
use engine_core::sink::DEFAULT_CLOSE_TIMEOUT;
use engine_processing::executor::DEFAULT_PARALLELISM;
use std::{num::NonZeroUsize, time::Duration};

pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Values consumed by one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    /// Rows per append request.
    pub chunk_size: NonZeroUsize,
    /// Maximum number of batches processed at once.
    pub parallelism: NonZeroUsize,
    /// Injected into every row. Defaults to the source file name.
    pub source_id: Option<String>,
    /// Injected into every row. Defaults to the instant the run starts.
    pub ingested_at: Option<DateTime<Utc>>,
    pub close_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            parallelism: NonZeroUsize::new(DEFAULT_PARALLELISM).unwrap_or(NonZeroUsize::MIN),
            source_id: None,
            ingested_at: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl IngestSettings {
    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_parallelism(mut self, parallelism: NonZeroUsize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_ingested_at(mut self, ingested_at: DateTime<Utc>) -> Self {
        self.ingested_at = Some(ingested_at);
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Resolves the source identifier, falling back to `default`.
    pub fn source_id_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.source_id.as_deref().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let settings = IngestSettings::default();
        assert_eq!(settings.chunk_size.get(), 2000);
        assert_eq!(settings.parallelism.get(), 20);
        assert_eq!(settings.close_timeout, Duration::from_secs(5));
        assert_eq!(settings.source_id_or("data.csv"), "data.csv");
    }

    #[test]
    fn test_builders() {
        let at = Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap();
        let settings = IngestSettings::default()
            .with_chunk_size(NonZeroUsize::new(2).unwrap())
            .with_parallelism(NonZeroUsize::new(4).unwrap())
            .with_source_id("upload-42")
            .with_ingested_at(at);

        assert_eq!(settings.chunk_size.get(), 2);
        assert_eq!(settings.parallelism.get(), 4);
        assert_eq!(settings.source_id_or("data.csv"), "upload-42");
        assert_eq!(settings.ingested_at, Some(at));
    }
}
