use crate::descriptor::Descriptor;
use chrono::{TimeZone, Utc};
use model::{
    core::{
        data_type::DataType,
        schema::{FieldSchema, TableSchema},
    },
    records::row::RowMetadata,
};
use std::sync::Arc;

/// `A STRING, B INTEGER, C DATE, D NUMERIC` plus the two metadata columns.
pub fn insert_test_schema() -> TableSchema {
    TableSchema::new(vec![
        FieldSchema::new("A", DataType::String),
        FieldSchema::new("B", DataType::Int64),
        FieldSchema::new("C", DataType::Date),
        FieldSchema::new("D", DataType::Numeric),
        FieldSchema::new("_filename", DataType::String),
        FieldSchema::new("_inserted_at", DataType::Timestamp),
    ])
}

pub fn insert_test_descriptor() -> Arc<Descriptor> {
    Arc::new(Descriptor::from_schema(&insert_test_schema()).unwrap())
}

pub fn test_metadata() -> RowMetadata {
    RowMetadata::new(
        "no_file.txt",
        Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap(),
    )
}
