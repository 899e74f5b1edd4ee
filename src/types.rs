//! STRATA - Core Type Definitions
//! The record type, its binary codec, and the tri-state lookup outcome
//! shared by the memtable, the write-ahead log, and the SSTables.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// A single key-value record.
///
/// A record with `deleted == true` is a tombstone: its value must be treated
/// as absent regardless of any residual bytes. The write-ahead log and the
/// SSTable data area both store records in the encoded form produced by
/// [`Record::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
    pub deleted: bool,
}

impl Record {
    /// Create a live record (SET operation).
    pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
            deleted: false,
        }
    }

    /// Create a tombstone record (DELETE operation).
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            deleted: true,
        }
    }

    /// Returns true if this record is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.deleted
    }

    /// The record's value, or `None` for tombstones.
    pub fn value(&self) -> Option<&[u8]> {
        if self.deleted {
            None
        } else {
            Some(&self.value)
        }
    }

    /// Consume the record, yielding its value unless tombstoned.
    pub fn into_value(self) -> Option<Vec<u8>> {
        if self.deleted {
            None
        } else {
            Some(self.value)
        }
    }

    /// Serialize to the byte form shared by the WAL and the SSTable data area.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StrataError::Encode(e.to_string()))
    }

    /// Deserialize a record previously produced by [`Record::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| StrataError::Decode(e.to_string()))
    }
}

/// Outcome of a point lookup against the memtable, one SSTable, or the
/// whole table tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Key present with a live value.
    Found(Record),
    /// Key present but tombstoned. Older data must not be consulted.
    Deleted,
    /// Key absent here; the caller may fall through to older data.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_live_record() {
        let record = Record::put("user:1", b"alice".to_vec());
        let encoded = record.encode().unwrap();
        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.value(), Some(&b"alice"[..]));
    }

    #[test]
    fn test_roundtrip_tombstone() {
        let record = Record::tombstone("user:1");
        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.key, "user:1");
        assert!(decoded.is_tombstone());
        assert_eq!(decoded.value(), None);
        assert_eq!(decoded.into_value(), None);
    }

    #[test]
    fn test_tombstone_hides_residual_bytes() {
        let record = Record {
            key: "k".to_string(),
            value: b"stale".to_vec(),
            deleted: true,
        };
        assert_eq!(record.value(), None);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = Record::decode(&[0xFF; 3]).unwrap_err();
        assert!(matches!(err, StrataError::Decode(_)));
    }

    #[test]
    fn test_empty_value_roundtrip() {
        let record = Record::put("empty", Vec::new());
        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.value(), Some(&[][..]));
    }
}
