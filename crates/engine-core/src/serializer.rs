use crate::descriptor::{Descriptor, FieldDescriptor};
use model::{
    codec::{self, ParseError},
    core::{data_type::DataType, value::Value},
    records::{append::AppendRows, row::TypedRow},
};
use prost::encoding;
use std::sync::Arc;

/// Encodes typed rows as protobuf messages laid out by the descriptor:
/// value `i` becomes field number `i + 1`, NULL values are omitted.
#[derive(Debug, Clone)]
pub struct RowSerializer {
    descriptor: Arc<Descriptor>,
}

impl RowSerializer {
    pub fn new(descriptor: Arc<Descriptor>) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn serialize(&self, row: &TypedRow) -> Result<Vec<u8>, ParseError> {
        let fields = self.descriptor.fields();
        if row.len() != fields.len() {
            return Err(ParseError::FieldCount {
                expected: fields.len(),
                found: row.len(),
            }
            .at_line(row.line));
        }

        let mut buf = Vec::with_capacity(row.size_bytes() + fields.len() * 2);
        for (idx, (field, value)) in fields.iter().zip(row.values()).enumerate() {
            encode_field(field, value, &mut buf)
                .map_err(|e| e.at_field(row.line, idx + 1, &field.name))?;
        }
        Ok(buf)
    }

    pub fn serialize_batch(&self, rows: &[TypedRow]) -> Result<AppendRows, ParseError> {
        let mut out = AppendRows::with_capacity(rows.len());
        for row in rows {
            out.push(self.serialize(row)?);
        }
        Ok(out)
    }
}

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>) -> Result<(), ParseError> {
    let tag = field.number;
    match (field.data_type, value) {
        (_, Value::Null) if field.is_nullable() => {}
        (DataType::String | DataType::Json, Value::String(s)) => {
            encoding::string::encode(tag, s, buf);
        }
        (DataType::Int64, Value::Int(v)) => encoding::int64::encode(tag, v, buf),
        (DataType::Float64, Value::Float(v)) => encoding::double::encode(tag, v, buf),
        (DataType::Float64, Value::Int(v)) => encoding::double::encode(tag, &(*v as f64), buf),
        (DataType::Boolean, Value::Boolean(v)) => encoding::bool::encode(tag, v, buf),
        (DataType::Numeric, Value::Decimal(d)) => {
            encoding::bytes::encode(tag, &codec::encode_numeric(d)?, buf);
        }
        (DataType::BigNumeric, Value::Decimal(d)) => {
            encoding::bytes::encode(tag, &codec::encode_big_numeric(d)?, buf);
        }
        (DataType::Date, Value::Date(d)) => {
            encoding::int32::encode(tag, &codec::date_to_wire(*d), buf);
        }
        (DataType::Time, Value::Time(t)) => {
            encoding::int64::encode(tag, &codec::time_to_wire(*t), buf);
        }
        (DataType::DateTime, Value::DateTime(dt)) => {
            encoding::int64::encode(tag, &codec::datetime_to_wire(*dt), buf);
        }
        (DataType::Timestamp, Value::Timestamp(ts)) => {
            encoding::int64::encode(tag, &codec::timestamp_to_wire(*ts), buf);
        }
        (data_type, value) => {
            return Err(ParseError::TypeMismatch {
                expected: format!("{data_type} {:?}", field.mode),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}
