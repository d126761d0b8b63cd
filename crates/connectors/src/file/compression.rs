//! Transparent decompression of source files, detected by file suffix.

use crate::file::csv::error::FileError;
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use tracing::debug;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    /// First entry of a zip archive.
    Zip,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("gz") | Some("gzip") => Compression::Gzip,
            Some("zip") => Compression::Zip,
            _ => Compression::None,
        }
    }
}

/// Opens `path` and hands a decompressed reader to `f`. The reader only
/// lives for the duration of the call because zip entries borrow their
/// archive.
pub fn read_with<T, F>(path: &Path, f: F) -> Result<T, FileError>
where
    F: FnOnce(&mut dyn Read) -> Result<T, FileError>,
{
    let shown = path.display().to_string();
    let file = File::open(path).map_err(|e| FileError::from_open(&shown, e))?;
    let compression = Compression::from_path(path);
    debug!(path = %shown, ?compression, "Opening source file");

    match compression {
        Compression::None => f(&mut BufReader::new(file)),
        Compression::Gzip => f(&mut MultiGzDecoder::new(BufReader::new(file))),
        Compression::Zip => {
            let mut archive = ZipArchive::new(BufReader::new(file))?;
            if archive.is_empty() {
                return Err(FileError::InvalidFormat(format!(
                    "{shown}: archive has no entries"
                )));
            }
            let mut entry = archive.by_index(0)?;
            debug!(path = %shown, entry = entry.name(), "Reading first archive entry");
            f(&mut entry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression as Level, write::GzEncoder};
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn read_all(path: &Path) -> String {
        read_with(path, |r| {
            let mut out = String::new();
            r.read_to_string(&mut out)?;
            Ok(out)
        })
        .unwrap()
    }

    #[test]
    fn test_detect_by_suffix() {
        assert_eq!(Compression::from_path(Path::new("a.csv")), Compression::None);
        assert_eq!(Compression::from_path(Path::new("a.csv.GZ")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("a.zip")), Compression::Zip);
        assert_eq!(Compression::from_path(Path::new("noext")), Compression::None);
    }

    #[test]
    fn test_gzip_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Level::default());
        encoder.write_all(b"a;1\nb;2\n").unwrap();
        encoder.finish().unwrap();

        assert_eq!(read_all(&path), "a;1\nb;2\n");
    }

    #[test]
    fn test_zip_reads_first_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("first.csv", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"x;1\n").unwrap();
        writer
            .start_file("second.csv", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"y;2\n").unwrap();
        writer.finish().unwrap();

        assert_eq!(read_all(&path), "x;1\n");
    }

    #[test]
    fn test_missing_file() {
        let err = read_with(Path::new("/definitely/not/here.csv"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
    }
}
