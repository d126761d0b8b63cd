use crate::descriptor::Descriptor;
use model::{
    codec::{self, ParseError},
    core::value::Value,
    records::{
        raw::RawRecord,
        row::{RowMetadata, TypedRow},
    },
};
use std::sync::Arc;

/// Turns raw source records into typed rows, positionally, using the column
/// types of the descriptor. Every row gets the run metadata appended.
#[derive(Debug, Clone)]
pub struct RowConverter {
    descriptor: Arc<Descriptor>,
    meta: RowMetadata,
}

impl RowConverter {
    pub fn new(descriptor: Arc<Descriptor>, meta: RowMetadata) -> Self {
        Self { descriptor, meta }
    }

    pub fn metadata(&self) -> &RowMetadata {
        &self.meta
    }

    pub fn convert(&self, record: &RawRecord) -> Result<TypedRow, ParseError> {
        let columns = self.descriptor.business_fields();
        if record.len() != columns.len() {
            return Err(ParseError::FieldCount {
                expected: columns.len(),
                found: record.len(),
            }
            .at_line(record.line));
        }

        let mut values = Vec::with_capacity(self.descriptor.len());
        for (idx, (column, text)) in columns.iter().zip(&record.fields).enumerate() {
            let value = if text.is_empty() && !column.data_type.is_textual() {
                if !column.is_nullable() {
                    return Err(ParseError::invalid(
                        column.data_type.name(),
                        text,
                        "empty value in REQUIRED column",
                    )
                    .at_field(record.line, idx + 1, &column.name));
                }
                Value::Null
            } else {
                codec::parse_value(column.data_type, text)
                    .map_err(|e| e.at_field(record.line, idx + 1, &column.name))?
            };
            values.push(value);
        }

        Ok(TypedRow::new(record.line, values, &self.meta))
    }

    pub fn convert_all(&self, records: &[RawRecord]) -> Result<Vec<TypedRow>, ParseError> {
        records.iter().map(|r| self.convert(r)).collect()
    }
}
