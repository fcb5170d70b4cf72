//! Execution: apply or simulate one classified operation at a time.
//!
//! Dry-run and real-run share every decision path; the only difference is
//! whether the store write actually happens. That keeps the two modes
//! classifying identically for identical input.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use dirsync_directory::{DirectoryStore, FieldDiff, IdentityRecord, StoreError};

use crate::error::RowErrorKind;
use crate::reconciler::Classification;
use crate::report::RowOutcome;

/// Retry budget for transient store failures. Fixed backoff; deterministic
/// failures (conflicts) are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 is treated as 1).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Email ownership changes a dry run would have made, overlaid on the
/// store so later rows in the same batch see them. Stays empty in real
/// mode, where the store itself reflects the writes.
#[derive(Debug, Default)]
struct SimulatedWrites {
    /// email → login name that would own it after the simulated write.
    claimed: HashMap<String, String>,
    /// Emails a simulated update would have freed up.
    released: HashSet<String>,
}

impl SimulatedWrites {
    fn claim(&mut self, email: String, login_name: String) {
        self.released.remove(&email);
        self.claimed.insert(email, login_name);
    }

    fn release(&mut self, email: String) {
        self.claimed.remove(&email);
        self.released.insert(email);
    }
}

/// Applies (real mode) or simulates (dry-run) classified operations
/// against the directory, one row at a time. No lock is held across rows.
pub struct Executor<S> {
    store: S,
    dry_run: bool,
    retry: RetryPolicy,
    simulated: Mutex<SimulatedWrites>,
}

impl<S: DirectoryStore> Executor<S> {
    pub fn new(store: S, dry_run: bool, retry: RetryPolicy) -> Self {
        Self {
            store,
            dry_run,
            retry,
            simulated: Mutex::new(SimulatedWrites::default()),
        }
    }

    /// Execute one classified row. Never aborts the batch: every failure
    /// becomes a `Rejected` outcome for this row.
    pub fn execute(&self, row_number: u64, classification: Classification) -> RowOutcome {
        match classification {
            Classification::Noop => RowOutcome::noop(row_number),
            Classification::Create(record) => self.execute_create(row_number, record),
            Classification::Update {
                login_name,
                diff,
                deactivates,
            } => self.execute_update(row_number, &login_name, diff, deactivates),
        }
    }

    fn execute_create(&self, row_number: u64, record: IdentityRecord) -> RowOutcome {
        match self.email_conflict(&record.email, &record.login_name) {
            Ok(Some(reason)) => return RowOutcome::rejected(row_number, reason),
            Ok(None) => {}
            Err(e) => {
                return RowOutcome::rejected(
                    row_number,
                    RowErrorKind::StoreWriteFailed(e.to_string()),
                );
            }
        }

        if self.dry_run {
            debug!(row = row_number, login_name = %record.login_name, "dry-run: would create");
            self.simulated
                .lock()
                .unwrap()
                .claim(record.email, record.login_name);
            return RowOutcome::created(row_number);
        }

        match self.with_retry(|| self.store.create_user(record.clone())) {
            Ok(()) => RowOutcome::created(row_number),
            Err(e) => RowOutcome::rejected(row_number, RowErrorKind::StoreWriteFailed(e.to_string())),
        }
    }

    fn execute_update(
        &self,
        row_number: u64,
        login_name: &str,
        diff: FieldDiff,
        deactivates: bool,
    ) -> RowOutcome {
        if let Some(email) = &diff.email {
            match self.email_conflict(email, login_name) {
                Ok(Some(reason)) => return RowOutcome::rejected(row_number, reason),
                Ok(None) => {}
                Err(e) => {
                    return RowOutcome::rejected(
                        row_number,
                        RowErrorKind::StoreWriteFailed(e.to_string()),
                    );
                }
            }
        }

        let diff_fields: Vec<String> = diff
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        if self.dry_run {
            debug!(row = row_number, login_name, fields = ?diff_fields, "dry-run: would update");
            if let Some(new_email) = &diff.email {
                match self.store.find_by_login_name(login_name) {
                    Ok(Some(current)) => {
                        let mut simulated = self.simulated.lock().unwrap();
                        simulated.release(current.email);
                        simulated.claim(new_email.clone(), login_name.to_string());
                    }
                    Ok(None) => {}
                    Err(e) => {
                        return RowOutcome::rejected(
                            row_number,
                            RowErrorKind::StoreWriteFailed(e.to_string()),
                        );
                    }
                }
            }
            return RowOutcome::updated(row_number, diff_fields, deactivates);
        }

        match self.with_retry(|| self.store.update_user(login_name, &diff)) {
            Ok(()) => RowOutcome::updated(row_number, diff_fields, deactivates),
            Err(e) => RowOutcome::rejected(row_number, RowErrorKind::StoreWriteFailed(e.to_string())),
        }
    }

    /// The same knowably-invalid check in both modes: an email already
    /// held by a different login name would be rejected by the store, so
    /// dry-run reports it identically.
    fn email_conflict(
        &self,
        email: &str,
        login_name: &str,
    ) -> Result<Option<RowErrorKind>, StoreError> {
        {
            let simulated = self.simulated.lock().unwrap();
            if let Some(owner) = simulated.claimed.get(email) {
                if owner != login_name {
                    return Ok(Some(RowErrorKind::EmailConflict(format!(
                        "email '{}' already used by '{}'",
                        email, owner
                    ))));
                }
                return Ok(None);
            }
            if simulated.released.contains(email) {
                return Ok(None);
            }
        }
        match self.store.find_by_email(email)? {
            Some(existing) if existing.login_name != login_name => {
                Ok(Some(RowErrorKind::EmailConflict(format!(
                    "email '{}' already used by '{}'",
                    email, existing.login_name
                ))))
            }
            _ => Ok(None),
        }
    }

    fn with_retry(&self, mut op: impl FnMut() -> Result<(), StoreError>) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry.attempts() => {
                    warn!(attempt, error = %e, "transient store failure, retrying");
                    if !self.retry.base_delay.is_zero() {
                        thread::sleep(self.retry.base_delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
