//! Row Sources
//!
//! Positional, append-only row storage the verifier reads from. Positions
//! are 1-based and row 1 is the header, so data occupies
//! `FIRST_DATA_ROW..=total_row_count()`.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::record::{LedgerRecord, STANDARD_HEADER};

/// Storage position of the header row.
pub const HEADER_ROW: usize = 1;

/// Storage position of the first ledger record.
pub const FIRST_DATA_ROW: usize = 2;

/// Read access to ledger storage.
pub trait RowSource {
    /// Column names, in cell order.
    fn header(&self) -> Result<Vec<String>, LedgerError>;

    /// Up to `count` rows starting at storage position `start`.
    fn rows(&self, start: usize, count: usize) -> Result<Vec<Vec<String>>, LedgerError>;

    /// Position of the last occupied row, header included.
    fn total_row_count(&self) -> Result<usize, LedgerError>;
}

impl<S: RowSource + ?Sized> RowSource for &S {
    fn header(&self) -> Result<Vec<String>, LedgerError> {
        (**self).header()
    }

    fn rows(&self, start: usize, count: usize) -> Result<Vec<Vec<String>>, LedgerError> {
        (**self).rows(start, count)
    }

    fn total_row_count(&self) -> Result<usize, LedgerError> {
        (**self).total_row_count()
    }
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryRowSource {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Source laid out with the standard header, holding `records` in order.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a LedgerRecord>,
    {
        let mut source = Self::new(STANDARD_HEADER.iter().map(|s| s.to_string()).collect());
        for record in records {
            source.push(record.to_row());
        }
        source
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Mutable access to the data row at storage position `position`.
    pub fn row_mut(&mut self, position: usize) -> Option<&mut Vec<String>> {
        position
            .checked_sub(FIRST_DATA_ROW)
            .and_then(|index| self.rows.get_mut(index))
    }
}

impl RowSource for MemoryRowSource {
    fn header(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.header.clone())
    }

    fn rows(&self, start: usize, count: usize) -> Result<Vec<Vec<String>>, LedgerError> {
        if start < FIRST_DATA_ROW {
            return Err(LedgerError::cursor_out_of_range(start, FIRST_DATA_ROW));
        }
        Ok(self
            .rows
            .iter()
            .skip(start - FIRST_DATA_ROW)
            .take(count)
            .cloned()
            .collect())
    }

    fn total_row_count(&self) -> Result<usize, LedgerError> {
        Ok(HEADER_ROW + self.rows.len())
    }
}

/// JSON-lines ledger file.
///
/// The first line is a JSON array of column names; every following line is
/// a JSON array of cell strings. Blank lines are skipped. Each call picks up
/// lines appended since the previous one, so appends made during a scan
/// are visible to the next step.
#[derive(Debug)]
pub struct JsonlRowSource {
    path: PathBuf,
    index: Mutex<LineIndex>,
}

/// Byte offsets of the non-blank lines seen so far.
///
/// Only newline-terminated lines are committed; a trailing partial line is
/// re-read on the next refresh.
#[derive(Debug, Default)]
struct LineIndex {
    offsets: Vec<u64>,
    indexed_to: u64,
}

impl JsonlRowSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(LedgerError::StorageReadError(format!(
                "ledger file does not exist: {}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            index: Mutex::new(LineIndex::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File, LedgerError> {
        File::open(&self.path).map_err(|e| {
            LedgerError::StorageReadError(format!(
                "failed to open {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Extend the line index over newly appended bytes and return the
    /// offsets of every occupied row, header first.
    fn line_offsets(&self) -> Result<Vec<u64>, LedgerError> {
        let mut index = self
            .index
            .lock()
            .map_err(|_| LedgerError::StorageReadError("line index lock poisoned".to_string()))?;

        let mut file = self.open_file()?;
        if file.metadata()?.len() < index.indexed_to {
            debug!("{} shrank; rebuilding line index", self.path.display());
            *index = LineIndex::default();
        }
        file.seek(SeekFrom::Start(index.indexed_to))?;

        let mut reader = BufReader::new(file);
        let mut offsets = Vec::new();
        let mut position = index.indexed_to;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let terminated = line.ends_with('\n');
            if terminated {
                if !line.trim().is_empty() {
                    index.offsets.push(position);
                }
                position += read as u64;
                index.indexed_to = position;
            } else if !line.trim().is_empty() {
                offsets.push(position);
            }
        }

        let mut all = index.offsets.clone();
        all.append(&mut offsets);
        Ok(all)
    }

    /// Read `count` non-blank lines starting at byte `offset`.
    fn read_lines_at(&self, offset: u64, count: usize) -> Result<Vec<String>, LedgerError> {
        let mut file = self.open_file()?;
        file.seek(SeekFrom::Start(offset))?;
        BufReader::new(file)
            .lines()
            .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .take(count)
            .map(|line| line.map_err(LedgerError::from))
            .collect()
    }

    fn parse_line(line: &str, position: usize) -> Result<Vec<String>, LedgerError> {
        serde_json::from_str(line).map_err(|e| {
            LedgerError::StorageReadError(format!("row {} is not a JSON string array: {}", position, e))
        })
    }
}

impl Clone for JsonlRowSource {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            index: Mutex::new(LineIndex::default()),
        }
    }
}

impl RowSource for JsonlRowSource {
    fn header(&self) -> Result<Vec<String>, LedgerError> {
        let offsets = self.line_offsets()?;
        let line = match offsets.first() {
            Some(&offset) => self.read_lines_at(offset, 1)?.into_iter().next(),
            None => None,
        };
        match line {
            Some(line) => Self::parse_line(&line, HEADER_ROW),
            None => Err(LedgerError::StorageReadError(format!(
                "ledger file is empty: {}",
                self.path.display()
            ))),
        }
    }

    fn rows(&self, start: usize, count: usize) -> Result<Vec<Vec<String>>, LedgerError> {
        if start < FIRST_DATA_ROW {
            return Err(LedgerError::cursor_out_of_range(start, FIRST_DATA_ROW));
        }

        let offsets = self.line_offsets()?;
        let Some(&offset) = offsets.get(start - 1) else {
            return Ok(Vec::new());
        };
        let available = count.min(offsets.len() - (start - 1));

        let mut rows = Vec::new();
        for (i, line) in self.read_lines_at(offset, available)?.iter().enumerate() {
            rows.push(Self::parse_line(line, start + i)?);
        }

        debug!(
            "Read {} rows from {} starting at {}",
            rows.len(),
            self.path.display(),
            start
        );
        Ok(rows)
    }

    fn total_row_count(&self) -> Result<usize, LedgerError> {
        Ok(self.line_offsets()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_memory_source_positions() {
        let mut source = MemoryRowSource::new(row(&["uuid", "timestamp"]));
        source.push(row(&["a", "1"]));
        source.push(row(&["b", "2"]));
        source.push(row(&["c", "3"]));

        assert_eq!(source.total_row_count().unwrap(), 4);
        let rows = source.rows(3, 10).unwrap();
        assert_eq!(rows, vec![row(&["b", "2"]), row(&["c", "3"])]);
        assert!(source.rows(1, 1).is_err());
        assert!(source.rows(9, 1).unwrap().is_empty());
    }

    #[test]
    fn test_memory_source_row_mut() {
        let mut source = MemoryRowSource::new(row(&["uuid", "timestamp"]));
        source.push(row(&["a", "1"]));
        source.row_mut(2).unwrap()[0] = "z".to_string();
        assert_eq!(source.rows(2, 1).unwrap()[0][0], "z");
        assert!(source.row_mut(1).is_none());
    }

    #[test]
    fn test_jsonl_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"["uuid","timestamp"]"#).unwrap();
        writeln!(file, r#"["a","1"]"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"["b","2"]"#).unwrap();
        drop(file);

        let source = JsonlRowSource::open(&path).unwrap();
        assert_eq!(source.header().unwrap(), row(&["uuid", "timestamp"]));
        assert_eq!(source.total_row_count().unwrap(), 3);
        assert_eq!(source.rows(3, 5).unwrap(), vec![row(&["b", "2"])]);
    }

    #[test]
    fn test_jsonl_source_sees_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n[\"a\",\"1\"]\n").unwrap();

        let source = JsonlRowSource::open(&path).unwrap();
        assert_eq!(source.total_row_count().unwrap(), 2);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, r#"["b","2"]"#).unwrap();
        assert_eq!(source.total_row_count().unwrap(), 3);
    }

    #[test]
    fn test_jsonl_huge_count_reads_what_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n[\"a\",\"1\"]\n[\"b\",\"2\"]\n").unwrap();

        let source = JsonlRowSource::open(&path).unwrap();
        assert_eq!(source.rows(2, usize::MAX).unwrap().len(), 2);
        assert_eq!(source.rows(3, usize::MAX).unwrap(), vec![row(&["b", "2"])]);
        assert!(source.rows(usize::MAX, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_partial_line_completed_later() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n[\"a\",\"1\"]\n[\"b\",").unwrap();

        let source = JsonlRowSource::open(&path).unwrap();
        assert_eq!(source.total_row_count().unwrap(), 3);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "\"2\"]").unwrap();
        writeln!(file, r#"["c","3"]"#).unwrap();
        assert_eq!(source.total_row_count().unwrap(), 4);
        assert_eq!(
            source.rows(3, 2).unwrap(),
            vec![row(&["b", "2"]), row(&["c", "3"])]
        );
    }

    #[test]
    fn test_jsonl_rewritten_file_reindexed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n[\"a\",\"1\"]\n[\"b\",\"2\"]\n").unwrap();

        let source = JsonlRowSource::open(&path).unwrap();
        assert_eq!(source.total_row_count().unwrap(), 3);

        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n[\"z\",\"9\"]\n").unwrap();
        assert_eq!(source.total_row_count().unwrap(), 2);
        assert_eq!(source.rows(2, 1).unwrap(), vec![row(&["z", "9"])]);
    }

    #[test]
    fn test_jsonl_bad_row_is_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "[\"uuid\",\"timestamp\"]\n{not json}\n").unwrap();

        let source = JsonlRowSource::open(&path).unwrap();
        let err = source.rows(2, 1).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_jsonl_missing_file() {
        assert!(JsonlRowSource::open("/nonexistent/ledger.jsonl").is_err());
    }
}
