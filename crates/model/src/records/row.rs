use crate::core::value::Value;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Metadata injected into every row of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMetadata {
    pub source_id: Arc<str>,
    /// Fixed once per run and shared by all rows.
    pub ingested_at: DateTime<Utc>,
}

impl RowMetadata {
    pub fn new(source_id: impl Into<Arc<str>>, ingested_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            ingested_at,
        }
    }
}

/// A converted record: business values in column order, followed by the
/// source identifier and the ingestion instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    pub line: u64,
    values: Vec<Value>,
}

pub const METADATA_COLUMNS: usize = 2;

impl TypedRow {
    pub fn new(line: u64, mut business: Vec<Value>, meta: &RowMetadata) -> Self {
        business.reserve(METADATA_COLUMNS);
        business.push(Value::String(meta.source_id.to_string()));
        business.push(Value::Timestamp(meta.ingested_at));
        Self {
            line,
            values: business,
        }
    }

    /// Builds a row from an already complete value list.
    pub fn from_values(line: u64, values: Vec<Value>) -> Self {
        Self { line, values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn business(&self) -> &[Value] {
        let end = self.values.len().saturating_sub(METADATA_COLUMNS);
        &self.values[..end]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.values.iter().map(Value::size_bytes).sum()
    }
}
