//! Per-record validation and normalization.
//!
//! Validation is pure with respect to the identity store: its only state is
//! the set of login names already accepted earlier in the same stream,
//! which backs the duplicate-in-batch check.

use std::collections::HashSet;

use dirsync_directory::IdentityRecord;

use crate::error::RowErrorKind;
use crate::parser::CandidateRecord;

/// A record that passed validation, with all fields trimmed and `active`
/// resolved to a concrete boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecord {
    pub row_number: u64,
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
}

impl ValidRecord {
    pub fn to_identity(&self) -> IdentityRecord {
        IdentityRecord {
            login_name: self.login_name.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            active: self.active,
        }
    }
}

/// Stateful validator for one batch.
///
/// Only records that validate fully claim their login name; a rejected row
/// does not block a later row from using the same name.
#[derive(Debug, Default)]
pub struct RecordValidator {
    seen: HashSet<String>,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&mut self, record: &CandidateRecord) -> Result<ValidRecord, RowErrorKind> {
        let login_name = required(&record.login_name, "loginName")?;
        let email = required(&record.email, "email")?;
        let first_name = required(&record.first_name, "firstName")?;
        let last_name = required(&record.last_name, "lastName")?;

        if !is_plausible_email(&email) {
            return Err(RowErrorKind::InvalidEmail(email));
        }

        let active = match &record.active {
            // Column absent from the header entirely: default true.
            None => true,
            Some(raw) => parse_active(raw)?,
        };

        if !self.seen.insert(login_name.clone()) {
            return Err(RowErrorKind::DuplicateInBatch(login_name));
        }

        Ok(ValidRecord {
            row_number: record.row_number,
            login_name,
            email,
            first_name,
            last_name,
            active,
        })
    }
}

fn required(raw: &str, field: &str) -> Result<String, RowErrorKind> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RowErrorKind::MissingRequiredField(field.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Basic address syntax: one `@`, non-empty local and domain parts, no
/// whitespace. Deliberately not a full RFC 5322 check.
fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
}

/// Accepted spellings are exactly `true`/`false`, case-insensitively.
/// Anything else, including an empty cell, is a rejection rather than a
/// silent default.
fn parse_active(raw: &str) -> Result<bool, RowErrorKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RowErrorKind::InvalidActiveFlag(raw.trim().to_string())),
    }
}
