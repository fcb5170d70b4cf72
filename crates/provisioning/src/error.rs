//! Error model for provisioning runs.
//!
//! Two severities, deliberately kept as two types:
//!
//! - [`RowErrorKind`]: rejects one row; the batch continues. Accumulates
//!   into the job's `failed_count` and the per-row report.
//! - [`JobError`]: aborts the whole job and moves it to `Failed`.

use dirsync_core::{DomainError, JobId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reason a single row was rejected.
///
/// The `Display` form is `Kind:detail` so reports stay grep-able, e.g.
/// `MissingRequiredField:firstName`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RowErrorKind {
    /// A required column was empty after trimming.
    #[error("MissingRequiredField:{0}")]
    MissingRequiredField(String),

    /// The email value failed the basic address syntax check.
    #[error("InvalidEmail:{0}")]
    InvalidEmail(String),

    /// The `active` cell was present but not a recognizable boolean.
    #[error("InvalidActiveFlag:{0}")]
    InvalidActiveFlag(String),

    /// The same login name appeared earlier in this file.
    #[error("DuplicateInBatch:{0}")]
    DuplicateInBatch(String),

    /// CSV structure broke for this row (column-count mismatch etc.).
    #[error("MalformedRow:{0}")]
    MalformedRow(String),

    /// The identity store rejected or failed the write after retries.
    #[error("StoreWriteFailed:{0}")]
    StoreWriteFailed(String),

    /// The email is already used by a different login name.
    #[error("EmailConflict:{0}")]
    EmailConflict(String),
}

/// Job-fatal error: the run stops and the job transitions to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The file holds more data rows than the batch limit allows.
    /// Raised before any row is processed.
    #[error("RowLimitExceeded: file has {found} data rows, limit is {limit}")]
    RowLimitExceeded { found: usize, limit: usize },

    /// A required column is missing from the header row.
    #[error("MissingColumn: required column '{0}' not found in header")]
    MissingColumn(String),

    /// The file could not be read at all (encoding, truncation).
    #[error("UnreadableFile: {0}")]
    UnreadableFile(String),

    /// The run was cancelled by the external caller.
    #[error("Cancelled")]
    Cancelled,

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("internal fault: {0}")]
    Internal(String),
}
