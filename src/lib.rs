//! STRATA - LSM-Tree Key-Value Storage Engine
//!
//! An embedded, crash-recoverable storage engine based on the
//! Log-Structured Merge-Tree (LSM-Tree) architecture.
//!
//! ## Features
//! - **Write-Ahead Log (WAL)**: length-prefixed, CRC-checked mutation log
//!   replayed on startup
//! - **Memtable**: ordered in-memory write buffer with tombstone tracking
//! - **SSTables**: immutable sorted on-disk tables across fixed levels 0-9
//! - **Compaction**: per-level threshold compaction merging into the next level
//! - **Background checker**: stoppable periodic flush/compaction task
//! - **Metrics**: lock-free atomic counters for observability
//!
//! ## Example
//! ```no_run
//! use strata::{config::Config, engine::Strata};
//!
//! let config = Config::new("./data");
//! let engine = Strata::open(config).unwrap();
//!
//! engine.set("key", b"value".to_vec()).unwrap();
//! assert_eq!(engine.get("key").unwrap(), Some(b"value".to_vec()));
//! engine.delete("key").unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;
