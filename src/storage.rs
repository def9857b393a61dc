//! Append-only CSV sink for harvested comments.
//!
//! Every [`CsvSink::append`] call opens the file in append mode, writes one
//! page's batch and syncs it to disk before returning, so a crash after page N
//! leaves pages 1..=N readable. Nothing is buffered across pages.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScrapeError;
use crate::models::{CommentRecord, HeaderStyle};

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    rows_written: u64,
}

impl CsvSink {
    /// Create or truncate `path` and write the BOM plus the six-column header.
    ///
    /// Missing parent directories are created. Calling this twice on the same
    /// path leaves exactly one header row.
    pub fn initialize(path: impl AsRef<Path>, header: HeaderStyle) -> Result<Self, ScrapeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header.labels())?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        debug!("Initialized comment sink at {}", path.display());
        Ok(Self {
            path,
            rows_written: 0,
        })
    }

    /// Append one page's records in order and sync before returning.
    ///
    /// An empty batch is a no-op and does not touch the file.
    pub fn append(&mut self, records: &[CommentRecord]) -> Result<usize, ScrapeError> {
        if records.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        self.rows_written += records.len() as u64;
        Ok(records.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this sink (header excluded).
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(author: &str, body: &str, rating: i64) -> CommentRecord {
        CommentRecord {
            author_display_name: author.to_string(),
            body: body.to_string(),
            rating,
            ..Default::default()
        }
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let bytes = fs::read(path).unwrap();
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(content)
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn test_initialize_writes_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.csv");
        CsvSink::initialize(&path, HeaderStyle::English).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let rows = read_rows(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "author_display_name");
        assert_eq!(rows[0][5], "rating");
    }

    #[test]
    fn test_initialize_twice_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.csv");

        let mut sink = CsvSink::initialize(&path, HeaderStyle::English).unwrap();
        sink.append(&[record("a", "first run", 4)]).unwrap();
        CsvSink::initialize(&path, HeaderStyle::English).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "author_display_name");
    }

    #[test]
    fn test_append_preserves_batch_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.csv");
        let mut sink = CsvSink::initialize(&path, HeaderStyle::English).unwrap();

        sink.append(&[record("a", "one", 5), record("b", "two, with comma", 3)])
            .unwrap();
        sink.append(&[record("c", "three\nlines", 1)]).unwrap();

        let rows = read_rows(&path);
        let authors: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
        assert_eq!(authors, vec!["a", "b", "c"]);
        assert_eq!(rows[2][4], "two, with comma");
        assert_eq!(rows[3][4], "three\nlines");
        assert_eq!(rows[3][5], "1");
        assert_eq!(sink.rows_written(), 3);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.csv");
        let mut sink = CsvSink::initialize(&path, HeaderStyle::Source).unwrap();
        let before = fs::read(&path).unwrap();

        assert_eq!(sink.append(&[]).unwrap(), 0);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("comments").join("out.csv");
        CsvSink::initialize(&path, HeaderStyle::English).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_parent_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let err = CsvSink::initialize(blocker.join("out.csv"), HeaderStyle::English).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IOError);
    }
}
