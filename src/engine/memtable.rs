//! STRATA - Memtable (In-Memory Ordered Write Buffer)
//! The memtable holds the most recent writes before they are flushed to an
//! SSTable. Tombstones keep their slot in the map so lookups stop before
//! consulting older tables and so flushes persist deletions.
//!
//! The engine guards the memtable with one exclusive lock; every operation
//! here assumes that lock is held.

use std::collections::BTreeMap;
use std::mem;

use crate::types::{Record, SearchOutcome};

/// One slot in the memtable. A tombstoned slot has an empty value.
#[derive(Debug, Clone)]
struct MemEntry {
    value: Vec<u8>,
    deleted: bool,
}

/// Ordered in-memory index of the most recent writes.
///
/// The live-record counter tracks non-tombstone entries only; it is the
/// flush-threshold signal. Inserting a tombstone for an absent key does not
/// touch the counter, and re-setting a tombstoned key restores it, so the
/// counter always equals the number of live records.
#[derive(Debug, Default)]
pub struct Memtable {
    entries: BTreeMap<String, MemEntry>,
    live: usize,
}

impl Memtable {
    /// Create a new, empty memtable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-tombstone) records.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Total entries, tombstones included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the memtable holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tri-state point lookup.
    pub fn search(&self, key: &str) -> SearchOutcome {
        match self.entries.get(key) {
            Some(entry) if entry.deleted => SearchOutcome::Deleted,
            Some(entry) => SearchOutcome::Found(Record::put(key, entry.value.clone())),
            None => SearchOutcome::NotFound,
        }
    }

    /// Insert or overwrite a key. Overwriting clears any tombstone.
    /// Returns the previous record only if it was live.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> Option<Record> {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                let prev = mem::replace(
                    entry,
                    MemEntry {
                        value,
                        deleted: false,
                    },
                );
                if prev.deleted {
                    self.live += 1;
                    None
                } else {
                    Some(Record::put(key, prev.value))
                }
            }
            None => {
                self.entries.insert(
                    key,
                    MemEntry {
                        value,
                        deleted: false,
                    },
                );
                self.live += 1;
                None
            }
        }
    }

    /// Tombstone a key.
    ///
    /// A live key is cleared, decrements the live count, and is reported
    /// back. An absent key gets a bare tombstone entry so later compaction
    /// can still suppress stale values found in older tables. Tombstoning an
    /// already-deleted key is a no-op.
    pub fn delete(&mut self, key: &str) -> Option<Record> {
        match self.entries.get_mut(key) {
            Some(entry) if entry.deleted => None,
            Some(entry) => {
                let prev = mem::replace(
                    entry,
                    MemEntry {
                        value: Vec::new(),
                        deleted: true,
                    },
                );
                self.live -= 1;
                Some(Record::put(key, prev.value))
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    MemEntry {
                        value: Vec::new(),
                        deleted: true,
                    },
                );
                None
            }
        }
    }

    /// In-order export of every record, tombstones included, ascending by key.
    pub fn records(&self) -> Vec<Record> {
        self.entries
            .iter()
            .map(|(key, entry)| Record {
                key: key.clone(),
                value: entry.value.clone(),
                deleted: entry.deleted,
            })
            .collect()
    }

    /// Consuming variant of [`Memtable::records`].
    pub fn into_records(self) -> Vec<Record> {
        self.entries
            .into_iter()
            .map(|(key, entry)| Record {
                key,
                value: entry.value,
                deleted: entry.deleted,
            })
            .collect()
    }

    /// Detach the current contents and leave an empty memtable in place,
    /// returning the detached snapshot. The caller's exclusive lock makes
    /// the exchange atomic with respect to concurrent operations.
    pub fn swap(&mut self) -> Memtable {
        Memtable {
            entries: mem::take(&mut self.entries),
            live: mem::replace(&mut self.live, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_search() {
        let mut table = Memtable::new();
        table.set("key1", b"value1".to_vec());
        assert_eq!(
            table.search("key1"),
            SearchOutcome::Found(Record::put("key1", b"value1".to_vec()))
        );
        assert_eq!(table.search("missing"), SearchOutcome::NotFound);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut table = Memtable::new();
        assert_eq!(table.set("key", b"old".to_vec()), None);
        let prev = table.set("key", b"new".to_vec()).unwrap();
        assert_eq!(prev.value(), Some(&b"old"[..]));
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.entry_count(), 1);
    }

    #[test]
    fn test_delete_live_key() {
        let mut table = Memtable::new();
        table.set("key", b"value".to_vec());
        let prev = table.delete("key").unwrap();
        assert_eq!(prev.value(), Some(&b"value"[..]));
        assert_eq!(table.search("key"), SearchOutcome::Deleted);
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.entry_count(), 1); // tombstone still occupies its slot
    }

    #[test]
    fn test_delete_absent_key_inserts_tombstone() {
        let mut table = Memtable::new();
        assert_eq!(table.delete("ghost"), None);
        assert_eq!(table.search("ghost"), SearchOutcome::Deleted);
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.entry_count(), 1);
    }

    #[test]
    fn test_delete_twice_is_noop() {
        let mut table = Memtable::new();
        table.set("key", b"value".to_vec());
        assert!(table.delete("key").is_some());
        assert_eq!(table.delete("key"), None);
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_set_revives_tombstone() {
        let mut table = Memtable::new();
        table.set("key", b"v1".to_vec());
        table.delete("key");
        assert_eq!(table.live_count(), 0);

        // Reviving yields no previous record: the old value was tombstoned.
        assert_eq!(table.set("key", b"v2".to_vec()), None);
        assert_eq!(table.live_count(), 1);
        assert_eq!(
            table.search("key"),
            SearchOutcome::Found(Record::put("key", b"v2".to_vec()))
        );
    }

    #[test]
    fn test_records_sorted_and_duplicate_free() {
        let mut table = Memtable::new();
        table.set("charlie", b"3".to_vec());
        table.set("alpha", b"1".to_vec());
        table.set("bravo", b"2".to_vec());
        table.set("alpha", b"1b".to_vec());
        table.delete("bravo");

        let records = table.records();
        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie"]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(records[1].is_tombstone());
        assert_eq!(records[0].value(), Some(&b"1b"[..]));
    }

    #[test]
    fn test_swap_detaches_everything() {
        let mut table = Memtable::new();
        table.set("a", b"1".to_vec());
        table.set("b", b"2".to_vec());
        table.delete("c");

        let snapshot = table.swap();
        assert!(table.is_empty());
        assert_eq!(table.live_count(), 0);
        assert_eq!(snapshot.entry_count(), 3);
        assert_eq!(snapshot.live_count(), 2);

        // Writes after the swap land only in the fresh tree.
        table.set("d", b"4".to_vec());
        assert_eq!(snapshot.search("d"), SearchOutcome::NotFound);
        assert_eq!(table.entry_count(), 1);
    }

    #[test]
    fn test_into_records_includes_tombstones() {
        let mut table = Memtable::new();
        table.set("a", b"1".to_vec());
        table.delete("a");
        let records = table.into_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_tombstone());
    }
}
