//! Provisioning job record and its status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dirsync_core::{DomainError, DomainResult, JobId};

use crate::report::{RowClass, RowOutcome};

/// Where the batch came from. Only CSV today; the enum keeps the wire
/// shape stable if other sources appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Csv,
}

/// Job execution status.
///
/// `Pending → Running → {Completed, Failed}`; terminal states are never
/// left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Metadata recorded, no file processed yet.
    Pending,
    /// Counters accumulating as row outcomes arrive.
    Running,
    /// Stream exhausted; row-level rejections do not prevent this state.
    Completed,
    /// Job-wide fault (row limit, unreadable file, cancellation).
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A bulk-provisioning job and its aggregate counters.
///
/// # Invariants
/// - `total_processed == created_count + updated_count + noop_count + failed_count`
///   at every point after execution starts.
/// - Counters never decrease, and only move while `Running`.
/// - Once terminal, the record is immutable except for reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningJob {
    pub id: JobId,
    pub job_name: String,
    pub source_type: SourceType,
    pub source_location: String,
    pub triggered_by: String,
    pub dry_run: bool,
    pub status: JobStatus,
    pub total_processed: u32,
    pub created_count: u32,
    pub updated_count: u32,
    pub noop_count: u32,
    /// Updates that flipped a record from active to inactive. Subset of
    /// `updated_count`; not part of the counter invariant sum.
    pub deactivated_count: u32,
    pub failed_count: u32,
    /// Job-fatal reason; set only when `status == Failed`. Row-level
    /// rejection reasons live in the per-row report instead.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningJob {
    /// Create a new job in `Pending`.
    pub fn new(
        job_name: impl Into<String>,
        source_location: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            job_name: job_name.into(),
            source_type: SourceType::Csv,
            source_location: source_location.into(),
            triggered_by: triggered_by.into(),
            dry_run: false,
            status: JobStatus::Pending,
            total_processed: 0,
            created_count: 0,
            updated_count: 0,
            noop_count: 0,
            deactivated_count: 0,
            failed_count: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Enter `Running` and pin the dry-run flag for the rest of the
    /// job's lifetime.
    pub fn start(&mut self, dry_run: bool) -> DomainResult<()> {
        if self.status != JobStatus::Pending {
            return Err(DomainError::invariant(format!(
                "cannot start job in status {:?}",
                self.status
            )));
        }
        self.dry_run = dry_run;
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal transition to `Completed`. Emitted exactly once.
    pub fn complete(&mut self) -> DomainResult<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::invariant(format!(
                "cannot complete job in status {:?}",
                self.status
            )));
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal transition to `Failed`, recording the job-fatal reason.
    pub fn fail(&mut self, message: impl Into<String>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot fail job in status {:?}",
                self.status
            )));
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Fold one row outcome into the counters.
    pub fn record_outcome(&mut self, outcome: &RowOutcome) -> DomainResult<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::invariant(
                "counters only accumulate while running",
            ));
        }
        self.total_processed += 1;
        match &outcome.class {
            RowClass::Created => self.created_count += 1,
            RowClass::Updated { deactivated, .. } => {
                self.updated_count += 1;
                if *deactivated {
                    self.deactivated_count += 1;
                }
            }
            RowClass::Noop => self.noop_count += 1,
            RowClass::Rejected { .. } => self.failed_count += 1,
        }
        Ok(())
    }

    /// Counter invariant: every processed row is accounted for exactly once.
    pub fn counters_consistent(&self) -> bool {
        self.total_processed
            == self.created_count + self.updated_count + self.noop_count + self.failed_count
    }
}
