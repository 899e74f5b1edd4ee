//! STRATA - Table Tree (Levels & Compaction)
//! Manages SSTables across fixed levels 0-9. New tables enter a level as the
//! next generation; lookups scan levels ascending and generations newest to
//! oldest; compaction merges a whole level into one table at the next level
//! once its table count or byte size crosses a threshold.
//!
//! The engine guards the tree with one read/write lock: lookups share the
//! read lock, insertion and compaction serialize on the write lock.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::memtable::Memtable;
use crate::engine::sstable::SsTable;
use crate::error::Result;
use crate::types::{Record, SearchOutcome};

/// Number of fixed levels.
pub const MAX_LEVELS: usize = 10;

/// Parse a `<level>.<generation>.db` table file name.
fn parse_table_name(name: &str) -> Option<(usize, u64)> {
    let stem = name.strip_suffix(".db")?;
    let (level, generation) = stem.split_once('.')?;
    let level: usize = level.parse().ok()?;
    let generation: u64 = generation.parse().ok()?;
    if level >= MAX_LEVELS {
        return None;
    }
    Some((level, generation))
}

fn table_path(dir: &Path, level: usize, generation: u64) -> PathBuf {
    dir.join(format!("{}.{}.db", level, generation))
}

/// SSTables across levels 0-9, each level ordered by ascending generation.
pub struct TableTree {
    levels: Vec<Vec<SsTable>>,
    data_dir: PathBuf,
    level0_size: u64,
    table_limit: usize,
}

impl TableTree {
    /// Scan the data directory and load every `.db` table file into its
    /// level, ordered by generation. Files that do not parse as
    /// `<level>.<generation>.db` are skipped with a warning.
    pub fn load(config: &Config) -> Result<Self> {
        let mut tree = Self {
            levels: (0..MAX_LEVELS).map(|_| Vec::new()).collect(),
            data_dir: config.data_dir.clone(),
            level0_size: config.level0_size,
            table_limit: config.table_limit,
        };

        for entry in fs::read_dir(&tree.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".db") {
                continue;
            }
            let Some((level, generation)) = parse_table_name(name) else {
                log::warn!("skipping unrecognized table file {:?}", name);
                continue;
            };
            let table = SsTable::load(&entry.path(), level, generation)?;
            tree.levels[level].push(table);
        }
        for level in &mut tree.levels {
            level.sort_by_key(SsTable::generation);
        }

        let total: usize = tree.levels.iter().map(Vec::len).sum();
        log::info!("table tree loaded ({} tables)", total);
        Ok(tree)
    }

    /// Point lookup across every table: levels ascending, generations newest
    /// to oldest. The first table reporting `Found` or `Deleted` settles the
    /// search; a tombstone hit maps to "not found" at the facade.
    pub fn search(&self, key: &str) -> Result<SearchOutcome> {
        for level in &self.levels {
            for table in level.iter().rev() {
                match table.search(key)? {
                    SearchOutcome::NotFound => continue,
                    outcome => return Ok(outcome),
                }
            }
        }
        Ok(SearchOutcome::NotFound)
    }

    /// Serialize `records` into a new table registered at `level` with the
    /// next generation index.
    pub fn create_table(&mut self, records: &[Record], level: usize) -> Result<()> {
        let generation = self.levels[level]
            .last()
            .map(|t| t.generation() + 1)
            .unwrap_or(0);
        let path = table_path(&self.data_dir, level, generation);
        log::info!("creating table {:?} ({} records)", path, records.len());

        let table = SsTable::create(&path, level, generation, records)?;
        self.levels[level].push(table);
        Ok(())
    }

    /// Number of tables currently registered at `level`.
    pub fn table_count(&self, level: usize) -> usize {
        self.levels[level].len()
    }

    /// Aggregate byte size of every table at `level`.
    pub fn level_size(&self, level: usize) -> u64 {
        self.levels[level].iter().map(SsTable::file_size).sum()
    }

    /// Byte capacity of `level`: level 0 from config, 10x per level after.
    fn level_capacity(&self, level: usize) -> u64 {
        self.level0_size.saturating_mul(10u64.saturating_pow(level as u32))
    }

    /// Compact every level whose table count or aggregate size crosses its
    /// threshold. Returns the number of levels compacted.
    pub fn check(&mut self) -> Result<usize> {
        let mut compacted = 0;
        for level in 0..MAX_LEVELS {
            if self.levels[level].len() > self.table_limit
                || self.level_size(level) > self.level_capacity(level)
            {
                self.compact_level(level)?;
                compacted += 1;
            }
        }
        Ok(compacted)
    }

    /// Merge every table in `level` into one table at the next level
    /// (level 9 merges back into itself).
    ///
    /// Tables are applied oldest to newest so the latest write for each key
    /// survives; tombstones are carried into the merged output. The old
    /// table files are closed and unlinked only after the merged table is
    /// durably written.
    fn compact_level(&mut self, level: usize) -> Result<()> {
        let old_count = self.levels[level].len();
        if old_count == 0 {
            return Ok(());
        }
        let target = (level + 1).min(MAX_LEVELS - 1);
        log::info!(
            "compacting level {} ({} tables, {} bytes) into level {}",
            level,
            old_count,
            self.level_size(level),
            target
        );

        let mut merged = Memtable::new();
        for table in &self.levels[level] {
            for record in table.records()? {
                if record.deleted {
                    merged.delete(&record.key);
                } else {
                    merged.set(record.key, record.value);
                }
            }
        }

        self.create_table(&merged.into_records(), target)?;

        let old: Vec<SsTable> = self.levels[level].drain(..old_count).collect();
        for table in old {
            table.remove()?;
        }
        Ok(())
    }
}
