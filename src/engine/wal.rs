//! STRATA - Write-Ahead Log (WAL)
//! Provides durability by logging every mutation to disk before it is
//! acknowledged. The log is fully replayed into a fresh memtable at startup
//! and reset once its contents are durably captured in a level-0 SSTable.
//!
//! ## Binary Format (per frame)
//! ```text
//! [len: 8 bytes LE = payload length][payload: encoded record][crc: 4 bytes LE]
//! ```
//! The CRC32 covers the payload only and is validated on replay; a mismatch
//! aborts recovery rather than silently serving wrong data.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};

use crate::engine::memtable::Memtable;
use crate::error::{Result, StrataError};
use crate::types::Record;

/// File name of the write-ahead log inside the data directory.
pub const WAL_FILE: &str = "wal.log";

const LEN_PREFIX: usize = 8;
const CRC_LEN: usize = 4;

/// Append-only mutation log. The engine guards it with one exclusive lock.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl Wal {
    /// Open or create the log under `dir` and replay its contents into a
    /// fresh memtable. Replay corruption is fatal: the engine refuses to
    /// start on a log it cannot trust.
    pub fn open(dir: &Path, sync_writes: bool) -> Result<(Self, Memtable)> {
        let path = dir.join(WAL_FILE);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let memtable = replay(&data)?;
        if !data.is_empty() {
            log::info!(
                "write-ahead log replayed ({} bytes, {} entries)",
                data.len(),
                memtable.entry_count()
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((
            Self {
                path,
                file,
                sync_writes,
            },
            memtable,
        ))
    }

    /// Append one record frame. Called with the record already applied to
    /// the memtable; the frame makes it recoverable until the next flush.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let payload = record.encode()?;
        let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len() + CRC_LEN);
        frame.put_u64_le(payload.len() as u64);
        frame.put_slice(&payload);
        frame.put_u32_le(crc32fast::hash(&payload));

        self.file.write_all(&frame)?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Close, delete, and reopen the log file empty. Invoked only after the
    /// corresponding memtable snapshot has been written to an SSTable.
    pub fn reset(&mut self) -> Result<()> {
        log::info!("resetting write-ahead log");
        fs::remove_file(&self.path)?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replay a full log image frame by frame into a fresh memtable, applying
/// sets and deletes as encoded.
fn replay(data: &[u8]) -> Result<Memtable> {
    let mut memtable = Memtable::new();
    let mut offset = 0usize;

    while offset < data.len() {
        if data.len() - offset < LEN_PREFIX {
            return Err(StrataError::Corruption(format!(
                "truncated length prefix at offset {}",
                offset
            )));
        }
        let mut prefix = &data[offset..offset + LEN_PREFIX];
        let len = prefix.get_u64_le() as usize;
        offset += LEN_PREFIX;

        let remaining = data.len() - offset;
        if remaining < CRC_LEN || len > remaining - CRC_LEN {
            return Err(StrataError::Corruption(format!(
                "truncated frame at offset {}: payload of {} bytes expected",
                offset, len
            )));
        }
        let payload = &data[offset..offset + len];
        offset += len;
        let mut crc_bytes = &data[offset..offset + CRC_LEN];
        let crc = crc_bytes.get_u32_le();
        offset += CRC_LEN;

        if crc32fast::hash(payload) != crc {
            return Err(StrataError::Corruption(format!(
                "checksum mismatch at offset {}",
                offset - CRC_LEN
            )));
        }

        let record = Record::decode(payload)
            .map_err(|e| StrataError::Corruption(format!("unreadable record: {}", e)))?;
        if record.deleted {
            memtable.delete(&record.key);
        } else {
            memtable.set(record.key, record.value);
        }
    }

    Ok(memtable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchOutcome;

    #[test]
    fn test_open_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (wal, memtable) = Wal::open(dir.path(), true).unwrap();
        assert!(memtable.is_empty());
        assert!(wal.path().exists());
    }

    #[test]
    fn test_replay_set_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut wal, _) = Wal::open(dir.path(), true).unwrap();
            wal.write(&Record::put("a", b"1".to_vec())).unwrap();
            wal.write(&Record::put("b", b"2".to_vec())).unwrap();
            wal.write(&Record::tombstone("a")).unwrap();
        }

        let (_, memtable) = Wal::open(dir.path(), true).unwrap();
        assert_eq!(memtable.live_count(), 1);
        assert_eq!(memtable.search("a"), SearchOutcome::Deleted);
        assert_eq!(
            memtable.search("b"),
            SearchOutcome::Found(Record::put("b", b"2".to_vec()))
        );
    }

    #[test]
    fn test_replay_overwrite_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut wal, _) = Wal::open(dir.path(), false).unwrap();
            wal.write(&Record::put("k", b"old".to_vec())).unwrap();
            wal.write(&Record::put("k", b"new".to_vec())).unwrap();
        }

        let (_, memtable) = Wal::open(dir.path(), false).unwrap();
        assert_eq!(
            memtable.search("k"),
            SearchOutcome::Found(Record::put("k", b"new".to_vec()))
        );
    }

    #[test]
    fn test_corrupt_payload_fails_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut wal, _) = Wal::open(dir.path(), true).unwrap();
            wal.write(&Record::put("a", b"1".to_vec())).unwrap();
        }

        // Flip a payload byte past the length prefix.
        let path = dir.path().join(WAL_FILE);
        let mut data = fs::read(&path).unwrap();
        data[LEN_PREFIX + 2] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        let err = Wal::open(dir.path(), true).unwrap_err();
        assert!(matches!(err, StrataError::Corruption(_)));
    }

    #[test]
    fn test_truncated_frame_fails_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut wal, _) = Wal::open(dir.path(), true).unwrap();
            wal.write(&Record::put("a", b"1".to_vec())).unwrap();
        }

        let path = dir.path().join(WAL_FILE);
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - 3]).unwrap();

        let err = Wal::open(dir.path(), true).unwrap_err();
        assert!(matches!(err, StrataError::Corruption(_)));
    }

    #[test]
    fn test_reset_empties_log() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wal, _) = Wal::open(dir.path(), true).unwrap();
        wal.write(&Record::put("a", b"1".to_vec())).unwrap();
        wal.reset().unwrap();

        assert_eq!(fs::metadata(wal.path()).unwrap().len(), 0);

        // The log accepts writes again after a reset.
        wal.write(&Record::put("b", b"2".to_vec())).unwrap();
        drop(wal);
        let (_, memtable) = Wal::open(dir.path(), true).unwrap();
        assert_eq!(memtable.search("a"), SearchOutcome::NotFound);
        assert_eq!(memtable.live_count(), 1);
    }

    #[test]
    fn test_frame_layout() {
        let dir = tempfile::tempdir().unwrap();
        let record = Record::put("k", b"v".to_vec());
        {
            let (mut wal, _) = Wal::open(dir.path(), true).unwrap();
            wal.write(&record).unwrap();
        }

        let data = fs::read(dir.path().join(WAL_FILE)).unwrap();
        let payload = record.encode().unwrap();
        assert_eq!(data.len(), LEN_PREFIX + payload.len() + CRC_LEN);

        let mut prefix = &data[..LEN_PREFIX];
        assert_eq!(prefix.get_u64_le() as usize, payload.len());
        assert_eq!(&data[LEN_PREFIX..LEN_PREFIX + payload.len()], &payload[..]);
    }
}
