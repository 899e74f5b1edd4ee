//! STRATA - Engine Configuration
//! Defines tunable parameters for the LSM storage engine.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Strata storage engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all data files (WAL, SSTables).
    pub data_dir: PathBuf,

    /// Byte capacity of level 0. Each subsequent level holds 10x the previous.
    pub level0_size: u64,

    /// Maximum number of tables per level before compaction.
    pub table_limit: usize,

    /// Live-record count in the memtable before triggering a flush.
    pub memtable_threshold: usize,

    /// Cadence of the background flush/compaction checker.
    pub check_interval: Duration,

    /// Whether to sync WAL writes to disk immediately (fsync).
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            level0_size: 1024 * 1024, // 1 MB
            table_limit: 4,
            memtable_threshold: 3000,
            check_interval: Duration::from_secs(3),
            sync_writes: true,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the level-0 byte capacity.
    pub fn with_level0_size(mut self, size: u64) -> Self {
        self.level0_size = size;
        self
    }

    /// Set the per-level table count limit.
    pub fn with_table_limit(mut self, limit: usize) -> Self {
        self.table_limit = limit;
        self
    }

    /// Set the memtable live-record count before flush.
    pub fn with_memtable_threshold(mut self, threshold: usize) -> Self {
        self.memtable_threshold = threshold;
        self
    }

    /// Set the background check interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set whether WAL writes are fsynced immediately.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = Config::new("/tmp/strata-test")
            .with_level0_size(4096)
            .with_table_limit(2)
            .with_memtable_threshold(10)
            .with_check_interval(Duration::from_millis(50))
            .with_sync_writes(false);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/strata-test"));
        assert_eq!(config.level0_size, 4096);
        assert_eq!(config.table_limit, 2);
        assert_eq!(config.memtable_threshold, 10);
        assert_eq!(config.check_interval, Duration::from_millis(50));
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.level0_size, 1024 * 1024);
        assert_eq!(config.table_limit, 4);
        assert!(config.sync_writes);
    }
}
