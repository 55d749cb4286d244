//! Reading persistence.
//!
//! The [`ReadingStore`] trait is the durable side of the pipeline: every
//! ingested reading is appended, publishers read the latest one back, and
//! the query API reads time ranges.
//!
//! Two implementations are provided:
//! - [`MemoryStore`] keeps readings in process memory
//! - [`FileStore`] appends JSON lines to a file and indexes them in memory

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Reading;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No reading has been stored yet.
    #[error("no weather data available")]
    Empty,

    /// The underlying storage could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reading could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for reading storage implementations.
///
/// All methods are synchronous; async callers should run them on a
/// blocking-capable thread.
pub trait ReadingStore: Send + Sync {
    /// Append a reading. Stored readings are never mutated.
    fn append(&self, reading: &Reading) -> Result<(), StoreError>;

    /// The most recent reading by timestamp.
    fn latest(&self) -> Result<Reading, StoreError>;

    /// Readings with `start <= timestamp < end`, oldest first.
    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>, StoreError>;
}

/// In-memory reading store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings.
    pub fn len(&self) -> usize {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, reading: Reading) {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reading);
    }
}

impl ReadingStore for MemoryStore {
    fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        self.push(*reading);
        Ok(())
    }

    fn latest(&self) -> Result<Reading, StoreError> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);

        // `max_by_key` keeps the last of equal keys, so ties go to the most
        // recently appended reading.
        readings
            .iter()
            .max_by_key(|r| r.timestamp())
            .copied()
            .ok_or(StoreError::Empty)
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);

        let mut matching: Vec<Reading> = readings
            .iter()
            .filter(|r| r.timestamp() >= start && r.timestamp() < end)
            .copied()
            .collect();
        matching.sort_by_key(|r| r.timestamp());
        Ok(matching)
    }
}

/// Append-only JSON-lines store.
///
/// Each reading is written as one line and flushed before it becomes
/// visible to queries. Existing lines are loaded on open.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
    index: MemoryStore,
    skipped_lines: usize,
}

impl FileStore {
    /// Open (or create) the store file at `path`.
    ///
    /// Lines that fail to parse, such as a partial line left by a crash,
    /// are skipped and counted in [`FileStore::skipped_lines`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let index = MemoryStore::new();
        let mut skipped_lines = 0;
        let mut unterminated = false;

        let mut reader = BufReader::new(&file);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            unterminated = line.last() != Some(&b'\n');

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Reading>(&line) {
                Ok(reading) => index.push(reading),
                Err(_) => skipped_lines += 1,
            }
        }

        // Terminate a partial last line so the next append starts clean.
        if unterminated {
            (&file).write_all(b"\n")?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
            skipped_lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of unreadable lines found when the file was opened.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Number of readings currently indexed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl ReadingStore for FileStore {
    fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(reading)?;
        line.push('\n');

        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }

        self.index.push(*reading);
        Ok(())
    }

    fn latest(&self) -> Result<Reading, StoreError> {
        self.index.latest()
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        self.index.range(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Measurements;
    use chrono::{Duration, TimeZone};
    use std::io::Write as _;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap()
    }

    fn reading_at(minutes: i64, temperature: f64) -> Reading {
        Reading::new(
            base_time() + Duration::minutes(minutes),
            Measurements {
                temperature,
                humidity: 50.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_latest_on_empty_store() {
        let store = MemoryStore::new();
        assert!(matches!(store.latest(), Err(StoreError::Empty)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_latest_by_timestamp() {
        let store = MemoryStore::new();
        store.append(&reading_at(10, 12.0)).unwrap();
        store.append(&reading_at(20, 14.0)).unwrap();
        // Out-of-order append of an older reading.
        store.append(&reading_at(5, 9.0)).unwrap();

        assert_eq!(store.latest().unwrap().temperature(), 14.0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_latest_tie_prefers_last_appended() {
        let store = MemoryStore::new();
        store.append(&reading_at(10, 12.0)).unwrap();
        store.append(&reading_at(10, 13.0)).unwrap();

        assert_eq!(store.latest().unwrap().temperature(), 13.0);
    }

    #[test]
    fn test_range_is_half_open_and_sorted() {
        let store = MemoryStore::new();
        for (minutes, temp) in [(30, 3.0), (0, 0.0), (10, 1.0), (20, 2.0)] {
            store.append(&reading_at(minutes, temp)).unwrap();
        }

        let results = store
            .range(base_time(), base_time() + Duration::minutes(30))
            .unwrap();
        let temps: Vec<f64> = results.iter().map(|r| r.temperature()).collect();

        assert_eq!(temps, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_range_empty_window() {
        let store = MemoryStore::new();
        store.append(&reading_at(0, 1.0)).unwrap();

        let results = store
            .range(base_time() + Duration::hours(1), base_time() + Duration::hours(2))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");

        {
            let store = FileStore::open(&path).unwrap();
            store.append(&reading_at(0, 5.0)).unwrap();
            store.append(&reading_at(1, 6.0)).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.skipped_lines(), 0);
        assert_eq!(store.latest().unwrap().temperature(), 6.0);
        assert_eq!(store.latest().unwrap(), reading_at(1, 6.0));
    }

    #[test]
    fn test_file_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");

        {
            let store = FileStore::open(&path).unwrap();
            store.append(&reading_at(0, 5.0)).unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"timestamp\": \"2024-01-17T1").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped_lines(), 1);
    }

    #[test]
    fn test_file_store_append_after_truncated_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");

        {
            let store = FileStore::open(&path).unwrap();
            store.append(&reading_at(0, 5.0)).unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"timestamp\": \"2024-01-17T1").unwrap();
        }
        {
            let store = FileStore::open(&path).unwrap();
            assert_eq!(store.skipped_lines(), 1);
            store.append(&reading_at(5, 7.0)).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.skipped_lines(), 1);
        assert_eq!(store.latest().unwrap(), reading_at(5, 7.0));
    }

    #[test]
    fn test_file_store_skips_non_utf8_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");
        std::fs::write(&path, b"\xff\xfe\n").unwrap();

        let store = FileStore::open(&path).unwrap();
        store.append(&reading_at(0, 5.0)).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped_lines(), 1);
    }

    #[test]
    fn test_file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("wx").join("readings.jsonl");

        let store = FileStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
