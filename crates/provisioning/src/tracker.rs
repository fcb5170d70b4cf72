//! Job tracker: owns job lifecycle, durable counters, and the pipeline.
//!
//! The tracker is the only component exposed to external callers and the
//! only one with durable state. Each job owns its own counters and its own
//! cancellation flag; concurrent jobs share nothing but the directory
//! itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, info, warn};

use dirsync_core::{DomainError, DomainResult, JobId};
use dirsync_directory::DirectoryStore;

use crate::error::JobError;
use crate::executor::{Executor, RetryPolicy};
use crate::job::ProvisioningJob;
use crate::parser;
use crate::reconciler;
use crate::report::{JobReport, RowClass, RowOutcome};
use crate::validator::RecordValidator;

/// Persistence for job records.
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `Conflict` on a duplicate ID.
    fn insert(&self, job: ProvisioningJob) -> DomainResult<()>;

    /// Replace an existing job record.
    fn update(&self, job: &ProvisioningJob) -> DomainResult<()>;

    fn get(&self, id: JobId) -> DomainResult<Option<ProvisioningJob>>;

    /// All jobs, most recent first.
    fn list_recent(&self) -> DomainResult<Vec<ProvisioningJob>>;
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, ProvisioningJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: ProvisioningJob) -> DomainResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(DomainError::conflict(format!("job already exists: {}", job.id)));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    fn update(&self, job: &ProvisioningJob) -> DomainResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(DomainError::not_found());
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn get(&self, id: JobId) -> DomainResult<Option<ProvisioningJob>> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    fn list_recent(&self) -> DomainResult<Vec<ProvisioningJob>> {
        let mut jobs: Vec<_> = self.jobs.read().unwrap().values().cloned().collect();
        // created_at descending; IDs are time-ordered so they break ties.
        jobs.sort_by(|a, b| (b.created_at, b.id.as_uuid()).cmp(&(a.created_at, a.id.as_uuid())));
        Ok(jobs)
    }
}

impl<T: JobStore + ?Sized> JobStore for Arc<T> {
    fn insert(&self, job: ProvisioningJob) -> DomainResult<()> {
        (**self).insert(job)
    }

    fn update(&self, job: &ProvisioningJob) -> DomainResult<()> {
        (**self).update(job)
    }

    fn get(&self, id: JobId) -> DomainResult<Option<ProvisioningJob>> {
        (**self).get(id)
    }

    fn list_recent(&self) -> DomainResult<Vec<ProvisioningJob>> {
        (**self).list_recent()
    }
}

/// Cooperative cancellation flag for one job. Cloneable; cancelling any
/// clone stops the pipeline at the next between-rows check.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The provisioning job tracker.
pub struct JobTracker<J, D> {
    jobs: J,
    directory: D,
    retry: RetryPolicy,
    cancel_flags: Mutex<HashMap<JobId, CancelHandle>>,
}

impl<J: JobStore, D: DirectoryStore> JobTracker<J, D> {
    pub fn new(jobs: J, directory: D) -> Self {
        Self {
            jobs,
            directory,
            retry: RetryPolicy::default(),
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    /// Override the retry budget for store writes.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record a new job (status `Pending`) and register its cancellation
    /// flag.
    pub fn create_job(
        &self,
        job_name: impl Into<String>,
        source_location: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Result<ProvisioningJob, JobError> {
        let job = ProvisioningJob::new(job_name, source_location, triggered_by);
        self.jobs.insert(job.clone())?;
        self.cancel_flags
            .lock()
            .unwrap()
            .insert(job.id, CancelHandle::default());
        info!(job_id = %job.id, job_name = %job.job_name, "provisioning job created");
        Ok(job)
    }

    /// Cancellation handle for a job, usable from another thread while
    /// `execute_job` runs.
    pub fn cancel_handle(&self, id: JobId) -> Option<CancelHandle> {
        self.cancel_flags.lock().unwrap().get(&id).cloned()
    }

    /// Request cooperative cancellation. Already-applied real-mode writes
    /// are not rolled back.
    pub fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let handle = self.cancel_handle(id).ok_or(JobError::NotFound(id))?;
        handle.cancel();
        info!(job_id = %id, "provisioning job cancellation requested");
        Ok(())
    }

    pub fn get_job(&self, id: JobId) -> Result<ProvisioningJob, JobError> {
        self.jobs.get(id)?.ok_or(JobError::NotFound(id))
    }

    /// Job history, most recent first.
    pub fn list_jobs(&self) -> Result<Vec<ProvisioningJob>, JobError> {
        Ok(self.jobs.list_recent()?)
    }

    /// Run the full pipeline for a pending job.
    ///
    /// Streams Parser → Validator → Reconciler → Executor row-by-row in
    /// file order, folding each outcome into the counters as it arrives.
    /// Row-level rejections never fail the job; the terminal transition is
    /// emitted exactly once.
    pub fn execute_job(
        &self,
        id: JobId,
        file: &[u8],
        dry_run: bool,
    ) -> Result<JobReport, JobError> {
        let mut job = self.get_job(id)?;
        job.start(dry_run)?;
        self.jobs.update(&job)?;
        info!(job_id = %id, dry_run, source = %job.source_location, "provisioning job started");

        let cancel = self.cancel_handle(id).unwrap_or_default();
        match self.run_pipeline(&mut job, file, &cancel) {
            Ok(rows) => {
                job.complete()?;
                self.jobs.update(&job)?;
                info!(
                    job_id = %id,
                    total = job.total_processed,
                    created = job.created_count,
                    updated = job.updated_count,
                    noop = job.noop_count,
                    failed = job.failed_count,
                    "provisioning job completed"
                );
                Ok(JobReport { job, rows })
            }
            Err(err) => {
                job.fail(err.to_string())?;
                self.jobs.update(&job)?;
                error!(job_id = %id, error = %err, "provisioning job failed");
                Err(err)
            }
        }
    }

    fn run_pipeline(
        &self,
        job: &mut ProvisioningJob,
        file: &[u8],
        cancel: &CancelHandle,
    ) -> Result<Vec<RowOutcome>, JobError> {
        let stream = parser::parse(file)?;
        let mut validator = RecordValidator::new();
        let executor = Executor::new(&self.directory, job.dry_run, self.retry.clone());

        let mut rows = Vec::new();
        for parsed in stream {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let outcome = match parsed.result {
                Err(reason) => RowOutcome::rejected(parsed.row_number, reason),
                Ok(candidate) => match validator.validate(&candidate) {
                    Err(reason) => RowOutcome::rejected(parsed.row_number, reason),
                    Ok(valid) => match reconciler::reconcile(&valid, &self.directory) {
                        Err(reason) => RowOutcome::rejected(parsed.row_number, reason),
                        Ok(classification) => executor.execute(parsed.row_number, classification),
                    },
                },
            };

            if let RowClass::Rejected { reason } = &outcome.class {
                warn!(job_id = %job.id, row = outcome.row_number, reason = %reason, "row rejected");
            }

            job.record_outcome(&outcome)?;
            self.jobs.update(job)?;
            rows.push(outcome);
        }

        Ok(rows)
    }
}
