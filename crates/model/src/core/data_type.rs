use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Column types understood by the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    String,
    Int64,
    Float64,
    Boolean,
    Numeric,
    BigNumeric,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
}

/// Protobuf scalar used to carry a column on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    String,
    Int32,
    Int64,
    Double,
    Bool,
    Bytes,
}

lazy_static! {
    static ref TYPE_MAP: HashMap<&'static str, DataType> = build_type_map();
}

impl DataType {
    pub fn from_name(type_name: &str) -> Result<Self, String> {
        let normalized = type_name.trim().to_uppercase();
        TYPE_MAP
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| format!("Unknown column type: {type_name}"))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Int64 => "INT64",
            DataType::Float64 => "FLOAT64",
            DataType::Boolean => "BOOL",
            DataType::Numeric => "NUMERIC",
            DataType::BigNumeric => "BIGNUMERIC",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Json => "JSON",
        }
    }

    /// Wire scalar for this column, following the table-schema to
    /// descriptor mapping of the write API.
    pub fn wire_kind(&self) -> WireKind {
        match self {
            DataType::String | DataType::Json => WireKind::String,
            DataType::Int64 | DataType::Time | DataType::DateTime | DataType::Timestamp => {
                WireKind::Int64
            }
            DataType::Date => WireKind::Int32,
            DataType::Float64 => WireKind::Double,
            DataType::Boolean => WireKind::Bool,
            DataType::Numeric | DataType::BigNumeric => WireKind::Bytes,
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::String | DataType::Json)
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DataType::from_name(&s)
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.name().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn build_type_map() -> HashMap<&'static str, DataType> {
    use DataType::*;

    // Standard SQL names plus the legacy aliases still returned by the
    // table metadata API.
    let entries = [
        ("STRING", String),
        ("INT64", Int64),
        ("INTEGER", Int64),
        ("INT", Int64),
        ("BIGINT", Int64),
        ("FLOAT64", Float64),
        ("FLOAT", Float64),
        ("BOOL", Boolean),
        ("BOOLEAN", Boolean),
        ("NUMERIC", Numeric),
        ("DECIMAL", Numeric),
        ("BIGNUMERIC", BigNumeric),
        ("BIGDECIMAL", BigNumeric),
        ("DATE", Date),
        ("TIME", Time),
        ("DATETIME", DateTime),
        ("TIMESTAMP", Timestamp),
        ("JSON", Json),
    ];

    let mut map = HashMap::new();
    for (name, data_type) in entries {
        map.insert(name, data_type);
    }
    map
}
