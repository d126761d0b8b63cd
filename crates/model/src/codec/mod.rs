//! Text to typed-value conversions and the wire encodings expected by the
//! write API. Everything in here is pure and safe to call from any task.

pub mod civil;
pub mod decimal;
pub mod error;
pub mod temporal;

pub use civil::{
    date_to_wire, datetime_from_wire, datetime_to_wire, time_from_wire, time_to_wire,
    timestamp_to_wire,
};
pub use decimal::{
    decode_big_numeric, decode_numeric, encode_big_numeric, encode_numeric, parse_decimal,
};
pub use error::ParseError;
pub use temporal::{parse_date, parse_datetime, parse_time, parse_timestamp};

use crate::core::{data_type::DataType, value::Value};

/// Accepts `0`, `1`, `true` and `false` in any letter case.
pub fn parse_boolean(text: &str) -> Result<bool, ParseError> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ParseError::invalid(
            "BOOL",
            text,
            "expected one of 0, 1, true, false",
        )),
    }
}

pub fn parse_int64(text: &str) -> Result<i64, ParseError> {
    text.parse::<i64>()
        .map_err(|e| ParseError::invalid("INT64", text, e.to_string()))
}

pub fn parse_float64(text: &str) -> Result<f64, ParseError> {
    text.parse::<f64>()
        .map_err(|e| ParseError::invalid("FLOAT64", text, e.to_string()))
}

/// Converts non-empty source text into the value of a column of type
/// `data_type`. Null handling is left to the caller.
pub fn parse_value(data_type: DataType, text: &str) -> Result<Value, ParseError> {
    let value = match data_type {
        DataType::String | DataType::Json => Value::String(text.to_string()),
        DataType::Int64 => Value::Int(parse_int64(text)?),
        DataType::Float64 => Value::Float(parse_float64(text)?),
        DataType::Boolean => Value::Boolean(parse_boolean(text)?),
        DataType::Numeric | DataType::BigNumeric => Value::Decimal(parse_decimal(text)?),
        DataType::Date => Value::Date(parse_date(text)?),
        DataType::Time => Value::Time(parse_time(text)?),
        DataType::DateTime => Value::DateTime(parse_datetime(text)?),
        DataType::Timestamp => Value::Timestamp(parse_timestamp(text)?),
    };
    Ok(value)
}
