/// Serialized rows of one batch, sent to the destination in a single append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendRows {
    pub serialized_rows: Vec<Vec<u8>>,
}

impl AppendRows {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            serialized_rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: Vec<u8>) {
        self.serialized_rows.push(message);
    }

    pub fn len(&self) -> usize {
        self.serialized_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serialized_rows.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.serialized_rows.iter().map(Vec::len).sum()
    }
}

/// Destination acknowledgment of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendAck {
    /// Stream offset of the first row of the append.
    pub offset: u64,
    pub row_count: u64,
}
