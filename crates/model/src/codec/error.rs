use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("cannot parse {raw:?} as {expected}: {reason}")]
    InvalidValue {
        expected: &'static str,
        raw: String,
        reason: String,
    },

    #[error("value {raw:?} is out of range for {target}")]
    OutOfRange { target: &'static str, raw: String },

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("value {value} cannot be written to a {expected} column")]
    TypeMismatch { expected: String, value: String },

    #[error("line {line}, field {position} ({field}): {source}")]
    Field {
        line: u64,
        position: usize,
        field: String,
        #[source]
        source: Box<ParseError>,
    },

    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub fn invalid(expected: &'static str, raw: &str, reason: impl Into<String>) -> Self {
        ParseError::InvalidValue {
            expected,
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    /// Attaches the source position of the offending field.
    pub fn at_field(self, line: u64, position: usize, field: impl Into<String>) -> Self {
        ParseError::Field {
            line,
            position,
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Attaches the source line of the offending row.
    pub fn at_line(self, line: u64) -> Self {
        ParseError::Row {
            line,
            source: Box::new(self),
        }
    }

    /// Raw text that failed to parse, if the error carries one.
    pub fn raw(&self) -> Option<&str> {
        match self {
            ParseError::InvalidValue { raw, .. } | ParseError::OutOfRange { raw, .. } => Some(raw),
            ParseError::Field { source, .. } | ParseError::Row { source, .. } => source.raw(),
            ParseError::FieldCount { .. } | ParseError::TypeMismatch { .. } => None,
        }
    }
}
