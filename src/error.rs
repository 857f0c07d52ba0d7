//! Error types for the collaborator boundaries
//!
//! Neither error ever reaches the timer contract: the registry and the
//! escalation coordinator log them and carry on in memory.

use std::path::PathBuf;

/// Failure of a Persistence Adapter operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timer store I/O failed for {key} at {path}: {source}")]
    Io {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timer blob for {key} could not be encoded: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timer blob for {key} is corrupt: {details}")]
    Corrupt { key: String, details: String },

    #[error("timer store writer has stopped, dropping write for {key}")]
    WriterStopped { key: String },
}

/// Failure of an Activity Log Sink write
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("activity log write failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("activity event could not be encoded: {0}")]
    Serialize(#[from] serde_json::Error),
}
