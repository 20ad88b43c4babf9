//! Run-level and record-level error types

use crate::identity::IdentityError;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single record was not loaded
///
/// Never aborts a run; the coordinator records it and moves on.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("write failed after {attempts} attempt(s): {source}")]
    Write {
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

/// Errors that end a run (or stop one from starting)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("graph store unavailable: {0}")]
    Connection(#[source] StorageError),

    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("batch worker failed: {0}")]
    Worker(String),
}
