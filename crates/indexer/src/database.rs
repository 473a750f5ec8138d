//! Growable memory-mapped record database.
//!
//! A database file is a 16-byte header followed by a flat array of
//! fixed-width records (see [`crate::record`]). The header stores the
//! populated-slot count, written through the mapping on every append, so
//! reopening a database recovers the exact count without scanning.
//!
//! Growth multiplies capacity by 10, resizes the backing file and remaps.
//! The builder must own the database exclusively when that happens: the
//! initial build holds the database lock for its whole walk, and a reindex
//! grows only its private temp database.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{IndexError, Result};
use crate::record::{IndexedRecord, RECORD_LEN};

/// Slots allocated for a freshly created database.
pub const INITIAL_CAPACITY: usize = 100;
/// Capacity multiplier applied when the database fills up.
pub const GROWTH_FACTOR: usize = 10;

const MAGIC: [u8; 4] = *b"MOLE";
const FORMAT_VERSION: u32 = 1;
const COUNT_OFFSET: usize = 8;
const HEADER_LEN: usize = 16;

/// Capacity/count-tracked, memory-mapped array of records.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    file: File,
    map: MmapMut,
    capacity: usize,
    count: usize,
}

impl Database {
    /// Creates (or truncates) a database file with the given capacity.
    pub fn create(path: &Path, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| storage_error(path, source))?;
        file.set_len(file_len(capacity))
            .map_err(|source| storage_error(path, source))?;
        let mut map = map_file(&file, capacity).map_err(|source| storage_error(path, source))?;

        map[..4].copy_from_slice(&MAGIC);
        map[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        map[COUNT_OFFSET..HEADER_LEN].copy_from_slice(&0u64.to_le_bytes());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map,
            capacity,
            count: 0,
        })
    }

    /// Opens an existing database, deriving capacity from the file size and
    /// the record count from the header. Returns `None` if the file does
    /// not exist.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(storage_error(path, source)),
        };
        let len = file
            .metadata()
            .map_err(|source| storage_error(path, source))?
            .len();

        if len < HEADER_LEN as u64 || (len - HEADER_LEN as u64) % RECORD_LEN as u64 != 0 {
            return Err(IndexError::Corrupt(format!(
                "{}: size {len} does not fit the record layout",
                path.display()
            )));
        }
        let capacity = ((len - HEADER_LEN as u64) / RECORD_LEN as u64) as usize;
        if capacity == 0 {
            return Err(IndexError::Corrupt(format!(
                "{}: no record slots",
                path.display()
            )));
        }

        let map = map_file(&file, capacity).map_err(|source| storage_error(path, source))?;
        if map[..4] != MAGIC {
            return Err(IndexError::Corrupt(format!(
                "{}: bad magic",
                path.display()
            )));
        }
        let version = u32::from_le_bytes(map[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "{}: unsupported format version {version}",
                path.display()
            )));
        }
        let count = u64::from_le_bytes(map[COUNT_OFFSET..HEADER_LEN].try_into().unwrap()) as usize;
        if count > capacity {
            return Err(IndexError::Corrupt(format!(
                "{}: count {count} exceeds capacity {capacity}",
                path.display()
            )));
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            file,
            map,
            capacity,
            count,
        }))
    }

    /// Appends a record into the next free slot and returns its index.
    /// When the append fills the last slot the database grows before
    /// returning, so capacity is always ahead of the count.
    pub fn append(&mut self, record: &IndexedRecord) -> Result<usize> {
        let index = self.count;
        let start = slot_offset(index);
        record.encode(&mut self.map[start..start + RECORD_LEN]);
        self.count += 1;
        let count = self.count as u64;
        self.map[COUNT_OFFSET..HEADER_LEN].copy_from_slice(&count.to_le_bytes());
        if self.count == self.capacity {
            self.grow()?;
        }
        Ok(index)
    }

    /// Flushes dirty pages and remaps the file at 10x capacity.
    fn grow(&mut self) -> Result<()> {
        self.map
            .flush()
            .map_err(|source| storage_error(&self.path, source))?;
        let new_capacity = self.capacity.saturating_mul(GROWTH_FACTOR);
        self.file
            .set_len(file_len(new_capacity))
            .map_err(|source| storage_error(&self.path, source))?;
        self.map = map_file(&self.file, new_capacity)
            .map_err(|source| storage_error(&self.path, source))?;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Decodes the record at `index`; `None` outside `[0, count)`.
    pub fn record(&self, index: usize) -> Option<IndexedRecord> {
        if index >= self.count {
            return None;
        }
        let start = slot_offset(index);
        Some(IndexedRecord::decode(&self.map[start..start + RECORD_LEN]))
    }

    /// Iterates the populated slots in append order.
    pub fn records(&self) -> impl Iterator<Item = IndexedRecord> + '_ {
        (0..self.count).map(|index| {
            let start = slot_offset(index);
            IndexedRecord::decode(&self.map[start..start + RECORD_LEN])
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        self.map
            .flush()
            .map_err(|source| storage_error(&self.path, source))
    }

    /// Repoints this instance after its backing file was renamed.
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.map.flush();
    }
}

fn file_len(capacity: usize) -> u64 {
    (HEADER_LEN + capacity * RECORD_LEN) as u64
}

fn slot_offset(index: usize) -> usize {
    HEADER_LEN + index * RECORD_LEN
}

fn map_file(file: &File, capacity: usize) -> io::Result<MmapMut> {
    unsafe { MmapOptions::new().len(file_len(capacity) as usize).map_mut(file) }
}

fn storage_error(path: &Path, source: io::Error) -> IndexError {
    IndexError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TypeTag;
    use tempfile::TempDir;

    fn record(n: usize) -> IndexedRecord {
        IndexedRecord::new(
            &format!("file-{n}.jpg"),
            &format!("/tree/file-{n}.jpg"),
            n as i64,
            1000,
            TypeTag::Jpeg,
        )
    }

    #[test]
    fn create_append_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        {
            let mut db = Database::create(&path, INITIAL_CAPACITY).unwrap();
            for n in 1..=5 {
                db.append(&record(n)).unwrap();
            }
            db.flush().unwrap();
        }

        let db = Database::open(&path).unwrap().expect("file exists");
        assert_eq!(db.len(), 5);
        assert_eq!(db.capacity(), INITIAL_CAPACITY);
        assert_eq!(db.record(0).unwrap(), record(1));
        assert_eq!(db.record(4).unwrap(), record(5));
        assert!(db.record(5).is_none());
    }

    #[test]
    fn zero_size_record_survives_reopen() {
        // The legacy format recovered the count by scanning for the first
        // zero-size slot, so an indexed empty file truncated the database
        // on reload. The header count keeps it.
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        {
            let mut db = Database::create(&path, INITIAL_CAPACITY).unwrap();
            db.append(&IndexedRecord::new("a", "/t/a", 0, 7, TypeTag::Zip))
                .unwrap();
            db.append(&record(2)).unwrap();
            db.flush().unwrap();
        }

        let db = Database::open(&path).unwrap().unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.record(0).unwrap().size, 0);
    }

    #[test]
    fn grows_tenfold_keeping_records_intact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let mut db = Database::create(&path, INITIAL_CAPACITY).unwrap();

        for n in 0..INITIAL_CAPACITY {
            db.append(&record(n)).unwrap();
        }
        // The filling append triggered exactly one growth step.
        assert_eq!(db.capacity(), INITIAL_CAPACITY * GROWTH_FACTOR);
        assert_eq!(db.len(), INITIAL_CAPACITY);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            file_len(INITIAL_CAPACITY * GROWTH_FACTOR)
        );

        for n in 0..INITIAL_CAPACITY {
            assert_eq!(db.record(n).unwrap(), record(n));
        }

        db.append(&record(INITIAL_CAPACITY)).unwrap();
        assert_eq!(db.len(), INITIAL_CAPACITY + 1);
    }

    #[test]
    fn missing_file_opens_as_none() {
        let temp = TempDir::new().unwrap();
        assert!(Database::open(&temp.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn rejects_foreign_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        std::fs::write(&path, vec![0u8; HEADER_LEN + RECORD_LEN]).unwrap();

        assert!(matches!(
            Database::open(&path),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        std::fs::write(&path, b"MOLE").unwrap();

        assert!(matches!(
            Database::open(&path),
            Err(IndexError::Corrupt(_))
        ));
    }
}
