//! Directory store abstraction and the in-memory reference implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::record::{FieldDiff, IdentityRecord};

/// Directory store error.
///
/// `Unavailable` and `Timeout` are transient: a caller with a retry budget
/// may try the same write again. `Conflict` and `NotFound` are
/// deterministic and must not be retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out: {0}")]
    Timeout(String),
    #[error("no record for login name: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Identity store abstraction.
///
/// Writes are atomic at single-record granularity; no multi-record
/// transaction is offered or assumed.
pub trait DirectoryStore: Send + Sync {
    /// Look up a record by its natural key.
    fn find_by_login_name(&self, login_name: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Look up a record by email (secondary uniqueness constraint).
    fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Create a new record. Fails with `Conflict` if the login name or
    /// email is already taken.
    fn create_user(&self, record: IdentityRecord) -> Result<(), StoreError>;

    /// Apply a minimal diff to an existing record. Fails with `Conflict`
    /// if a changed email collides with another record.
    fn update_user(&self, login_name: &str, diff: &FieldDiff) -> Result<(), StoreError>;
}

impl<T: DirectoryStore + ?Sized> DirectoryStore for &T {
    fn find_by_login_name(&self, login_name: &str) -> Result<Option<IdentityRecord>, StoreError> {
        (**self).find_by_login_name(login_name)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        (**self).find_by_email(email)
    }

    fn create_user(&self, record: IdentityRecord) -> Result<(), StoreError> {
        (**self).create_user(record)
    }

    fn update_user(&self, login_name: &str, diff: &FieldDiff) -> Result<(), StoreError> {
        (**self).update_user(login_name, diff)
    }
}

impl<T: DirectoryStore + ?Sized> DirectoryStore for Arc<T> {
    fn find_by_login_name(&self, login_name: &str) -> Result<Option<IdentityRecord>, StoreError> {
        (**self).find_by_login_name(login_name)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        (**self).find_by_email(email)
    }

    fn create_user(&self, record: IdentityRecord) -> Result<(), StoreError> {
        (**self).create_user(record)
    }

    fn update_user(&self, login_name: &str, diff: &FieldDiff) -> Result<(), StoreError> {
        (**self).update_user(login_name, diff)
    }
}

/// In-memory directory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    users: RwLock<HashMap<String, IdentityRecord>>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed a record directly, bypassing constraint checks. Test helper.
    pub fn seed(&self, record: IdentityRecord) {
        self.users
            .write()
            .unwrap()
            .insert(record.login_name.clone(), record);
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn find_by_login_name(&self, login_name: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.users.read().unwrap().get(login_name).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn create_user(&self, record: IdentityRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(&record.login_name) {
            return Err(StoreError::Conflict(format!(
                "login name '{}' already exists",
                record.login_name
            )));
        }
        if users.values().any(|u| u.email == record.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already in use",
                record.email
            )));
        }
        users.insert(record.login_name.clone(), record);
        Ok(())
    }

    fn update_user(&self, login_name: &str, diff: &FieldDiff) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap();
        if let Some(email) = &diff.email {
            if users
                .values()
                .any(|u| u.login_name != login_name && &u.email == email)
            {
                return Err(StoreError::Conflict(format!(
                    "email '{}' already in use",
                    email
                )));
            }
        }
        let record = users
            .get_mut(login_name)
            .ok_or_else(|| StoreError::NotFound(login_name.to_string()))?;
        diff.apply_to(record);
        Ok(())
    }
}
