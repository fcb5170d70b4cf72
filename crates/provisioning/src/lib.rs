//! `dirsync-provisioning` — CSV bulk-provisioning reconciliation engine.
//!
//! ## Design
//!
//! - A job ingests untrusted CSV, validates and normalizes each row, diffs
//!   it against the directory, and applies (or dry-runs) the result
//! - Rows are processed strictly in file order; per-row failures are
//!   recorded and never abort the batch
//! - Only the job tracker holds durable state; everything upstream of it
//!   is a pure, single-pass pipeline stage
//! - Counters satisfy `total = created + updated + noop + failed` at every
//!   point of a run
//!
//! ## Components
//!
//! - `parser`: raw bytes → lazy candidate-record stream, fail-fast limits
//! - `validator`: per-record field checks plus in-batch duplicate tracking
//! - `reconciler`: CREATE / UPDATE / NOOP classification with minimal diff
//! - `executor`: applies or simulates operations, with bounded retries
//! - `tracker`: job lifecycle, counters, cancellation, history

pub mod error;
pub mod executor;
pub mod job;
pub mod parser;
pub mod reconciler;
pub mod report;
pub mod tracker;
pub mod validator;

pub use error::{JobError, RowErrorKind};
pub use executor::{Executor, RetryPolicy};
pub use job::{JobStatus, ProvisioningJob, SourceType};
pub use parser::{CandidateRecord, MAX_DATA_ROWS, ParsedRow, RecordStream};
pub use reconciler::Classification;
pub use report::{JobReport, RowClass, RowOutcome};
pub use tracker::{CancelHandle, InMemoryJobStore, JobStore, JobTracker};
pub use validator::{RecordValidator, ValidRecord};
