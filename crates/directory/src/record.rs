//! Identity records and the minimal field diff applied on update.

use serde::{Deserialize, Serialize};

/// A directory entry, keyed by its unique `login_name`.
///
/// `email` is also unique across the store; the store enforces both
/// constraints on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
}

/// Minimal diff for an update: only fields that actually changed are set.
///
/// An empty diff means the incoming record matches the stored one and no
/// write should be issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: Option<bool>,
}

impl FieldDiff {
    /// Compute the diff that would turn `current` into `incoming`.
    ///
    /// Field-by-field exact string equality; no case folding or other
    /// normalization happens here.
    pub fn between(current: &IdentityRecord, incoming: &IdentityRecord) -> Self {
        Self {
            email: (current.email != incoming.email).then(|| incoming.email.clone()),
            first_name: (current.first_name != incoming.first_name)
                .then(|| incoming.first_name.clone()),
            last_name: (current.last_name != incoming.last_name)
                .then(|| incoming.last_name.clone()),
            active: (current.active != incoming.active).then_some(incoming.active),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.active.is_none()
    }

    /// Names of the changed fields, for per-row reporting.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.email.is_some() {
            names.push("email");
        }
        if self.first_name.is_some() {
            names.push("firstName");
        }
        if self.last_name.is_some() {
            names.push("lastName");
        }
        if self.active.is_some() {
            names.push("active");
        }
        names
    }

    /// Whether applying this diff flips the record from active to inactive.
    pub fn deactivates(&self, current: &IdentityRecord) -> bool {
        current.active && self.active == Some(false)
    }

    /// Apply the diff to a record in place.
    pub fn apply_to(&self, record: &mut IdentityRecord) {
        if let Some(email) = &self.email {
            record.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            record.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            record.last_name = last_name.clone();
        }
        if let Some(active) = self.active {
            record.active = active;
        }
    }
}
