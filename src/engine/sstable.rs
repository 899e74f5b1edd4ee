//! STRATA - SSTable (Sorted String Table)
//! Immutable on-disk unit produced once by a flush or a compaction and never
//! mutated afterwards; only bulk-deleted when its level is compacted away.
//!
//! ## File Layout
//! ```text
//! [data area: concatenated encoded records in insertion order]
//! [index area: bincode map key -> { offset, len, deleted }]
//! [trailer: five u64 LE - version, data_start, data_len, index_start, index_len]
//! ```
//! Both areas are exact contiguous byte ranges with no padding; the index
//! has exactly one entry per distinct key in the data area. The trailer is
//! the last 40 bytes of the file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::types::{Record, SearchOutcome};

/// Current on-disk format version written into the trailer.
pub const TABLE_VERSION: u64 = 0;

/// Size of the fixed trailer at end-of-file.
pub const TRAILER_LEN: u64 = 40;

/// Area descriptors recovered from the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta {
    pub version: u64,
    pub data_start: u64,
    pub data_len: u64,
    pub index_start: u64,
    pub index_len: u64,
}

impl TableMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TRAILER_LEN as usize);
        buf.put_u64_le(self.version);
        buf.put_u64_le(self.data_start);
        buf.put_u64_le(self.data_len);
        buf.put_u64_le(self.index_start);
        buf.put_u64_le(self.index_len);
        buf
    }

    fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < TRAILER_LEN as usize {
            return Err(StrataError::CorruptIndex(format!(
                "trailer too short: {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            version: data.get_u64_le(),
            data_start: data.get_u64_le(),
            data_len: data.get_u64_le(),
            index_start: data.get_u64_le(),
            index_len: data.get_u64_le(),
        })
    }
}

/// Byte range of one record inside the data area. Tombstoned entries keep
/// their flag in the index so lookups can short-circuit without a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub offset: u64,
    pub len: u64,
    pub deleted: bool,
}

/// One immutable sorted table, identified by (level, generation).
#[derive(Debug)]
pub struct SsTable {
    /// Shared read handle, guarded per-table.
    file: Mutex<File>,
    path: PathBuf,
    meta: TableMeta,
    index: HashMap<String, Position>,
    sorted_keys: Vec<String>,
    file_size: u64,
    level: usize,
    generation: u64,
}

impl SsTable {
    /// Serialize `records` into a new table file at `path`, fsync it, and
    /// reopen it read-only.
    pub fn create(
        path: &Path,
        level: usize,
        generation: u64,
        records: &[Record],
    ) -> Result<Self> {
        let mut data_area = Vec::new();
        let mut index = HashMap::with_capacity(records.len());
        let mut sorted_keys = Vec::with_capacity(records.len());

        for record in records {
            let encoded = record.encode()?;
            index.insert(
                record.key.clone(),
                Position {
                    offset: data_area.len() as u64,
                    len: encoded.len() as u64,
                    deleted: record.deleted,
                },
            );
            sorted_keys.push(record.key.clone());
            data_area.extend_from_slice(&encoded);
        }
        sorted_keys.sort();

        let index_area =
            bincode::serialize(&index).map_err(|e| StrataError::Encode(e.to_string()))?;
        let meta = TableMeta {
            version: TABLE_VERSION,
            data_start: 0,
            data_len: data_area.len() as u64,
            index_start: data_area.len() as u64,
            index_len: index_area.len() as u64,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&data_area)?;
        file.write_all(&index_area)?;
        file.write_all(&meta.encode())?;
        file.sync_all()?;
        drop(file);

        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            meta,
            index,
            sorted_keys,
            file_size,
            level,
            generation,
        })
    }

    /// Open an existing table read-only: read the trailer, decode the index
    /// area, and build the sorted key list.
    pub fn load(path: &Path, level: usize, generation: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < TRAILER_LEN {
            return Err(StrataError::CorruptIndex(format!(
                "{:?}: file shorter than trailer",
                path
            )));
        }

        file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let mut trailer = [0u8; TRAILER_LEN as usize];
        file.read_exact(&mut trailer)?;
        let meta = TableMeta::decode(&trailer)?;

        let data_end = meta.data_start.checked_add(meta.data_len);
        let index_end = meta
            .index_start
            .checked_add(meta.index_len)
            .and_then(|end| end.checked_add(TRAILER_LEN));
        if data_end != Some(meta.index_start) || index_end != Some(file_size) {
            return Err(StrataError::CorruptIndex(format!(
                "{:?}: area descriptors do not cover the file",
                path
            )));
        }

        file.seek(SeekFrom::Start(meta.index_start))?;
        let mut index_area = vec![0u8; meta.index_len as usize];
        file.read_exact(&mut index_area)?;
        let index: HashMap<String, Position> = bincode::deserialize(&index_area)
            .map_err(|e| StrataError::CorruptIndex(format!("{:?}: {}", path, e)))?;

        let mut sorted_keys: Vec<String> = index.keys().cloned().collect();
        sorted_keys.sort();

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            meta,
            index,
            sorted_keys,
            file_size,
            level,
            generation,
        })
    }

    /// Binary-search point lookup. A tombstoned index entry short-circuits
    /// as `Deleted` without touching the data area.
    pub fn search(&self, key: &str) -> Result<SearchOutcome> {
        if self
            .sorted_keys
            .binary_search_by(|k| k.as_str().cmp(key))
            .is_err()
        {
            return Ok(SearchOutcome::NotFound);
        }

        let position = *self.index.get(key).ok_or_else(|| {
            StrataError::CorruptIndex(format!("{:?}: key list out of sync with index", self.path))
        })?;
        if position.deleted {
            return Ok(SearchOutcome::Deleted);
        }
        if position
            .offset
            .checked_add(position.len)
            .map_or(true, |end| end > self.meta.data_len)
        {
            return Err(StrataError::CorruptIndex(format!(
                "{:?}: position for {:?} outside the data area",
                self.path, key
            )));
        }

        let mut buf = vec![0u8; position.len as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.meta.data_start + position.offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(SearchOutcome::Found(Record::decode(&buf)?))
    }

    /// Export every record ascending by key, tombstones included. Used by
    /// compaction; reads the data area once.
    pub fn records(&self) -> Result<Vec<Record>> {
        let mut data = vec![0u8; self.meta.data_len as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.meta.data_start))?;
            file.read_exact(&mut data)?;
        }

        let mut records = Vec::with_capacity(self.sorted_keys.len());
        for key in &self.sorted_keys {
            let position = self.index.get(key).ok_or_else(|| {
                StrataError::CorruptIndex(format!(
                    "{:?}: key list out of sync with index",
                    self.path
                ))
            })?;
            if position.deleted {
                records.push(Record::tombstone(key.clone()));
                continue;
            }
            let start = position.offset as usize;
            let end = start.checked_add(position.len as usize).unwrap_or(usize::MAX);
            let slice = data.get(start..end).ok_or_else(|| {
                StrataError::CorruptIndex(format!(
                    "{:?}: position for {:?} outside the data area",
                    self.path, key
                ))
            })?;
            records.push(Record::decode(slice)?);
        }
        Ok(records)
    }

    /// Total file size in bytes, as written.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Level this table belongs to.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Generation index within the level.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the read handle and unlink the backing file. Compaction cleanup
    /// only; the table is unusable afterwards.
    pub fn remove(self) -> Result<()> {
        log::info!("removing table file {:?}", self.path);
        drop(self.file);
        fs::remove_file(&self.path)?;
        Ok(())
    }
}
