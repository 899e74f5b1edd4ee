//! STRATA - Custom Error Types
//! Defines the error hierarchy for the LSM storage engine.

use thiserror::Error;

/// Custom Result type for the Strata engine.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Error types for the Strata storage engine.
///
/// A missing key is never an error; lookups report it through
/// [`crate::types::SearchOutcome`] instead.
#[derive(Error, Debug)]
pub enum StrataError {
    /// I/O errors from file operations (WAL, SSTable).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed to serialize.
    #[error("record encode failed: {0}")]
    Encode(String),

    /// Malformed record bytes.
    #[error("record decode failed: {0}")]
    Decode(String),

    /// An SSTable index area failed to parse.
    #[error("corrupt table index: {0}")]
    CorruptIndex(String),

    /// The write-ahead log failed framing or checksum validation on replay.
    #[error("corrupt write-ahead log: {0}")]
    Corruption(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
