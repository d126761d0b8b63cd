use crate::error::SinkError;
use model::{
    core::{
        data_type::{DataType, WireKind},
        schema::{FieldMode, TableSchema},
    },
    records::row::METADATA_COLUMNS,
};
use std::collections::HashSet;

/// One message field: a table column bound to a protobuf field number.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// 1-based, in column order.
    pub number: u32,
    pub data_type: DataType,
    pub wire: WireKind,
    pub mode: FieldMode,
}

impl FieldDescriptor {
    pub fn is_nullable(&self) -> bool {
        self.mode == FieldMode::Nullable
    }
}

/// Row message layout derived from the destination table schema.
///
/// The last two columns carry the run metadata: the source identifier
/// (STRING) followed by the ingestion instant (TIMESTAMP).
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    fields: Vec<FieldDescriptor>,
}

impl Descriptor {
    pub fn from_schema(schema: &TableSchema) -> Result<Self, SinkError> {
        if schema.len() < METADATA_COLUMNS {
            return Err(SinkError::Schema(format!(
                "expected at least {METADATA_COLUMNS} columns, found {}",
                schema.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(schema.len());
        for (idx, field) in schema.fields.iter().enumerate() {
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(SinkError::Schema(format!(
                    "duplicate column '{}'",
                    field.name
                )));
            }

            fields.push(FieldDescriptor {
                name: field.name.clone(),
                number: idx as u32 + 1,
                data_type: field.data_type,
                wire: field.data_type.wire_kind(),
                mode: field.mode,
            });
        }

        let source = &fields[fields.len() - 2];
        let instant = &fields[fields.len() - 1];
        if source.data_type != DataType::String || instant.data_type != DataType::Timestamp {
            return Err(SinkError::Schema(format!(
                "last columns must be STRING and TIMESTAMP, found '{}' {} and '{}' {}",
                source.name, source.data_type, instant.name, instant.data_type
            )));
        }

        Ok(Descriptor { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Columns filled from the source record.
    pub fn business_fields(&self) -> &[FieldDescriptor] {
        &self.fields[..self.fields.len() - METADATA_COLUMNS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::insert_test_schema;
    use model::core::schema::FieldSchema;

    #[test]
    fn test_field_numbers_follow_column_order() {
        let descriptor = Descriptor::from_schema(&insert_test_schema()).unwrap();
        assert_eq!(descriptor.len(), 6);
        assert_eq!(descriptor.business_fields().len(), 4);

        let numbers: Vec<u32> = descriptor.fields().iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(descriptor.fields()[2].wire, WireKind::Int32);
        assert_eq!(descriptor.fields()[3].wire, WireKind::Bytes);
    }

    #[test]
    fn test_metadata_columns_required() {
        let schema = TableSchema::new(vec![
            FieldSchema::new("A", DataType::String),
            FieldSchema::new("B", DataType::Int64),
        ]);
        assert!(matches!(
            Descriptor::from_schema(&schema),
            Err(SinkError::Schema(_))
        ));

        let too_short = TableSchema::new(vec![FieldSchema::new("A", DataType::String)]);
        assert!(Descriptor::from_schema(&too_short).is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let schema = TableSchema::new(vec![
            FieldSchema::new("a", DataType::String),
            FieldSchema::new("A", DataType::String),
            FieldSchema::new("_inserted_at", DataType::Timestamp),
        ]);
        let err = Descriptor::from_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
