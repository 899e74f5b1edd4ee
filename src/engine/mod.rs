//! STRATA - Storage Engine Module
//! Top-level module composing the memtable, write-ahead log, and table tree
//! behind the Get/Set/Delete facade.

pub mod memtable;
pub mod metrics;
pub mod sstable;
pub mod table_tree;
pub mod wal;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::types::{Record, SearchOutcome};

use self::memtable::Memtable;
use self::metrics::EngineMetrics;
use self::table_tree::TableTree;
use self::wal::Wal;

/// The core Strata storage engine.
///
/// Constructed once and shared by reference with every caller; all
/// operations take `&self` behind per-component locks. A background checker
/// thread flushes the memtable past its threshold and compacts overfull
/// levels on a configurable cadence, and is stopped when the handle is
/// closed or dropped.
pub struct Strata {
    inner: Arc<Shared>,
    checker: Option<Checker>,
}

/// Engine state shared with the background checker.
struct Shared {
    /// Engine configuration.
    config: Config,
    /// In-memory buffer for recent writes. One exclusive lock for every
    /// operation, including the flush-time swap.
    memtable: Mutex<Memtable>,
    /// Write-ahead log, exclusive.
    wal: Mutex<Wal>,
    /// On-disk tables. Lookups share the read lock; insertion and
    /// compaction take the write lock.
    tables: RwLock<TableTree>,
    /// Lock-free operation counters.
    metrics: EngineMetrics,
}

impl Strata {
    /// Open or create a Strata storage engine at the configured path.
    ///
    /// Replays the write-ahead log into the memtable, loads every on-disk
    /// table, runs one flush/compaction check, then starts the background
    /// checker. Replay or table corruption fails the open.
    pub fn open(config: Config) -> Result<Self> {
        config.ensure_dirs()?;

        let (wal, memtable) = Wal::open(&config.data_dir, config.sync_writes)?;
        let tables = TableTree::load(&config)?;

        log::info!(
            "Strata engine opened at {:?} ({} entries recovered)",
            config.data_dir,
            memtable.entry_count()
        );

        let inner = Arc::new(Shared {
            memtable: Mutex::new(memtable),
            wal: Mutex::new(wal),
            tables: RwLock::new(tables),
            metrics: EngineMetrics::new(),
            config,
        });

        inner.run_checks()?;
        let checker = Checker::spawn(Arc::clone(&inner))?;

        Ok(Self {
            inner,
            checker: Some(checker),
        })
    }

    /// Look up a key: memtable first, then the table tree newest-first.
    /// A tombstone anywhere along the way answers `None` without consulting
    /// older data.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let outcome = self.inner.memtable.lock().search(key);
        let outcome = match outcome {
            SearchOutcome::NotFound => self.inner.tables.read().search(key)?,
            hit => hit,
        };

        let value = match outcome {
            SearchOutcome::Found(record) => record.into_value(),
            SearchOutcome::Deleted | SearchOutcome::NotFound => None,
        };
        self.inner.metrics.record_get(value.as_ref().map(Vec::len));
        Ok(value)
    }

    /// Store a key-value pair.
    /// The write path: memtable (memory), then WAL (disk). The WAL frame
    /// makes the write recoverable until the next flush captures it in a
    /// level-0 table.
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        let record = Record::put(key.into(), value);
        self.inner.metrics.record_set(record.key.len(), record.value.len());

        self.inner
            .memtable
            .lock()
            .set(record.key.clone(), record.value.clone());
        self.inner.wal.lock().write(&record)?;
        Ok(())
    }

    /// Delete a key, writing a tombstone to both the memtable and the WAL.
    /// Returns the previous memtable value, if any; a value living only in
    /// SSTables is still deleted but reports `None`.
    pub fn delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.metrics.record_delete();

        let previous = self.inner.memtable.lock().delete(key);
        self.inner.wal.lock().write(&Record::tombstone(key))?;
        Ok(previous.and_then(Record::into_value))
    }

    /// Flush the memtable into a new level-0 table, then reset the WAL.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Compact every level currently over its table-count or byte-size
    /// threshold.
    pub fn compact(&self) -> Result<()> {
        self.inner.compact()
    }

    /// Live memtable record count (the flush-threshold signal).
    pub fn memtable_len(&self) -> usize {
        self.inner.memtable.lock().live_count()
    }

    /// Engine operation counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    /// Stop the background checker and release the handle.
    pub fn close(mut self) {
        self.stop_checker();
    }

    fn stop_checker(&mut self) {
        if let Some(checker) = self.checker.take() {
            let _ = checker.stop.send(());
            let _ = checker.handle.join();
            log::info!("background checker stopped");
        }
    }
}

impl Drop for Strata {
    fn drop(&mut self) {
        self.stop_checker();
    }
}

impl Shared {
    /// Swap the memtable and persist the detached snapshot as a level-0
    /// table, tombstones included, then reset the WAL.
    ///
    /// Table-creation-before-WAL-reset is the durability-critical ordering.
    /// The WAL lock is held across the whole sequence so a concurrent write
    /// cannot append a frame that the reset would erase before its record
    /// is captured in any table.
    fn flush(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        let snapshot = self.memtable.lock().swap();
        if snapshot.is_empty() {
            return Ok(());
        }

        log::info!("flushing memtable ({} records)", snapshot.entry_count());
        self.tables.write().create_table(&snapshot.into_records(), 0)?;
        wal.reset()?;
        self.metrics.record_flush();
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        let compacted = self.tables.write().check()?;
        if compacted > 0 {
            self.metrics.record_compactions(compacted as u64);
        }
        Ok(())
    }

    /// One background pass: flush when the memtable crosses its threshold,
    /// then compact any level over its limits.
    fn run_checks(&self) -> Result<()> {
        if self.memtable.lock().live_count() >= self.config.memtable_threshold {
            self.flush()?;
        }
        self.compact()
    }
}

/// Stoppable periodic flush/compaction checker tied to the engine handle.
struct Checker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Checker {
    fn spawn(inner: Arc<Shared>) -> io::Result<Self> {
        let (stop, stop_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let interval = inner.config.check_interval;

        let handle = thread::Builder::new()
            .name("strata-checker".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        log::debug!("running background checks");
                        if let Err(err) = inner.run_checks() {
                            log::error!("background check failed: {}", err);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self { stop, handle })
    }
}
