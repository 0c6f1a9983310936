//! Located report files and their decoding

mod locator;

pub use locator::{GlobLocator, ReportLocator};

use crate::error::{ReportError, Result};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A report file found by the locator. Read once per run, never mutated.
#[derive(Debug, Clone)]
pub struct Report {
    path: PathBuf,
    len: u64,
    encoding: &'static Encoding,
}

impl Report {
    /// Open a report, capturing its current length.
    pub fn open(path: impl Into<PathBuf>, encoding: &'static Encoding) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| ReportError::io(e, &path))?;
        Ok(Self {
            path,
            len: metadata.len(),
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Buffered UTF-8 view of the report.
    ///
    /// UTF-8 passes through untouched (BOM stripped) so invalid bytes still
    /// reach the parser; any other encoding is transcoded.
    pub fn reader(&self) -> Result<Box<dyn BufRead>> {
        let file = File::open(&self.path).map_err(|e| ReportError::io(e, &self.path))?;
        let mut builder = DecodeReaderBytesBuilder::new();
        if self.encoding == UTF_8 {
            builder.utf8_passthru(true).strip_bom(true);
        } else {
            builder.encoding(Some(self.encoding));
        }
        Ok(Box::new(BufReader::new(builder.build(file))))
    }
}

/// Resolve a charset label such as "UTF-8" or "windows-1252".
pub fn lookup_encoding(label: &str) -> Result<&'static Encoding> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(UTF_8);
    }
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| ReportError::Config(format!("unknown character encoding '{}'", label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_encoding() {
        assert_eq!(lookup_encoding("UTF-8").unwrap(), UTF_8);
        assert_eq!(lookup_encoding("").unwrap(), UTF_8);
        assert_eq!(lookup_encoding("latin1").unwrap().name(), "windows-1252");
        assert!(lookup_encoding("no-such-charset").is_err());
    }

    #[test]
    fn test_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.xml");
        fs::write(&path, "").unwrap();

        let report = Report::open(&path, UTF_8).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
    }

    #[test]
    fn test_missing_report_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Report::open(temp_dir.path().join("missing.xml"), UTF_8).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }

    #[test]
    fn test_reader_transcodes_legacy_encoding() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latin1.xml");
        // "café" in windows-1252
        fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        let report = Report::open(&path, lookup_encoding("windows-1252").unwrap()).unwrap();
        let mut text = String::new();
        report.reader().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_reader_strips_utf8_bom() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bom.xml");
        fs::write(&path, b"\xEF\xBB\xBF<testsuite/>").unwrap();

        let report = Report::open(&path, UTF_8).unwrap();
        let mut text = String::new();
        report.reader().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "<testsuite/>");
    }
}
