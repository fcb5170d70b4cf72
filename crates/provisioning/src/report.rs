//! Per-row outcomes and the final job report surfaced to callers.

use serde::{Deserialize, Serialize};

use crate::error::RowErrorKind;
use crate::job::ProvisioningJob;

/// How a single row ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    Created,
    Updated {
        /// Names of the fields the update touched (minimal diff).
        diff_fields: Vec<String>,
        /// True when the update flipped the record from active to inactive.
        deactivated: bool,
    },
    Noop,
    Rejected { reason: RowErrorKind },
}

/// Outcome of one data row, attributed by its 1-based row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutcome {
    pub row_number: u64,
    pub class: RowClass,
}

impl RowOutcome {
    pub fn created(row_number: u64) -> Self {
        Self {
            row_number,
            class: RowClass::Created,
        }
    }

    pub fn updated(row_number: u64, diff_fields: Vec<String>, deactivated: bool) -> Self {
        Self {
            row_number,
            class: RowClass::Updated {
                diff_fields,
                deactivated,
            },
        }
    }

    pub fn noop(row_number: u64) -> Self {
        Self {
            row_number,
            class: RowClass::Noop,
        }
    }

    pub fn rejected(row_number: u64, reason: RowErrorKind) -> Self {
        Self {
            row_number,
            class: RowClass::Rejected { reason },
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.class, RowClass::Rejected { .. })
    }
}

/// Final report for an executed job: frozen counters plus the row detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: ProvisioningJob,
    pub rows: Vec<RowOutcome>,
}

impl JobReport {
    /// Rejected rows only, in original file order.
    pub fn rejections(&self) -> impl Iterator<Item = &RowOutcome> {
        self.rows.iter().filter(|r| r.is_rejected())
    }
}
