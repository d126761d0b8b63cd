use crate::file::csv::error::FileError;

/// Dialect of the delimited source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSettings {
    pub delimiter: char,
    pub has_headers: bool,
    /// Strip whitespace surrounding every field.
    pub trim: bool,
    /// Records decoded ahead of the consumer.
    pub read_ahead: usize,
}

impl Default for CsvSettings {
    fn default() -> Self {
        CsvSettings {
            delimiter: ';',
            has_headers: false,
            trim: true,
            read_ahead: 256,
        }
    }
}

impl CsvSettings {
    /// Fails unless the delimiter is a single-byte ASCII character.
    pub fn new(delimiter: char, has_headers: bool) -> Result<Self, FileError> {
        let settings = CsvSettings {
            delimiter,
            has_headers,
            ..Default::default()
        };
        settings.delimiter_byte()?;
        Ok(settings)
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_read_ahead(mut self, read_ahead: usize) -> Self {
        self.read_ahead = read_ahead.max(1);
        self
    }

    pub fn delimiter_byte(&self) -> Result<u8, FileError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(FileError::InvalidFormat(format!(
                "delimiter {:?} is not a single-byte ASCII character",
                self.delimiter
            )))
        }
    }

    pub(crate) fn reader_builder(&self) -> Result<csv::ReaderBuilder, FileError> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter_byte()?)
            .has_headers(self.has_headers)
            .flexible(true)
            .trim(if self.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            });
        Ok(builder)
    }
}
