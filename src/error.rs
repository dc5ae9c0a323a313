//! Error types for FESK sleep decoding

use thiserror::Error;

/// Errors that can occur while decoding, scoring or storing frames
#[derive(Debug, Error)]
pub enum FeskError {
    /// The frame did not contain exactly 224 hex digits after stripping separators.
    /// The whole frame is rejected; the sender has to retransmit it.
    #[error("Malformed frame: {length} hex digits (expected 224)")]
    MalformedFrame { length: usize },

    #[error("Invalid clock policy: {0}")]
    InvalidClock(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Record already stored for timestamp {0}")]
    DuplicateRecord(i64),

    #[error("No record stored for timestamp {0}")]
    RecordNotFound(i64),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
