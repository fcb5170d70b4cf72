//! Reconciliation: classify a valid record against the directory's
//! current state.

use dirsync_directory::{DirectoryStore, FieldDiff, IdentityRecord};

use crate::error::RowErrorKind;
use crate::validator::ValidRecord;

/// What the executor should do for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No record under this login name yet.
    Create(IdentityRecord),
    /// Record exists and at least one comparable field differs.
    Update {
        login_name: String,
        /// Only the changed fields; unchanged fields are never rewritten.
        diff: FieldDiff,
        /// The update flips the record from active to inactive.
        deactivates: bool,
    },
    /// Record exists and every comparable field is identical.
    Noop,
}

/// Look up the record by its natural key and classify it.
///
/// Comparison is exact string equality on the validator's normalized
/// values; in particular no case folding of email domains happens here.
/// A failed lookup is a row-level failure, not a job-wide one.
pub fn reconcile<S: DirectoryStore + ?Sized>(
    record: &ValidRecord,
    store: &S,
) -> Result<Classification, RowErrorKind> {
    let incoming = record.to_identity();
    let current = store
        .find_by_login_name(&incoming.login_name)
        .map_err(|e| RowErrorKind::StoreWriteFailed(e.to_string()))?;

    match current {
        None => Ok(Classification::Create(incoming)),
        Some(current) => {
            let diff = FieldDiff::between(&current, &incoming);
            if diff.is_empty() {
                Ok(Classification::Noop)
            } else {
                Ok(Classification::Update {
                    deactivates: diff.deactivates(&current),
                    login_name: incoming.login_name,
                    diff,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_directory::InMemoryDirectoryStore;

    fn valid(login: &str, email: &str, first: &str, last: &str, active: bool) -> ValidRecord {
        ValidRecord {
            row_number: 1,
            login_name: login.to_string(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            active,
        }
    }

    fn seed_john(store: &InMemoryDirectoryStore) {
        store.seed(IdentityRecord {
            login_name: "john.doe".to_string(),
            email: "john@example.com".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            active: true,
        });
    }

    #[test]
    fn unknown_login_name_classifies_as_create() {
        let store = InMemoryDirectoryStore::new();
        let record = valid("john.doe", "john@example.com", "John", "Doe", true);

        let class = reconcile(&record, &store).unwrap();
        match class {
            Classification::Create(incoming) => assert_eq!(incoming.login_name, "john.doe"),
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn identical_record_classifies_as_noop() {
        let store = InMemoryDirectoryStore::new();
        seed_john(&store);

        let record = valid("john.doe", "john@example.com", "John", "Doe", true);
        assert_eq!(reconcile(&record, &store).unwrap(), Classification::Noop);
    }

    #[test]
    fn changed_email_produces_minimal_diff() {
        let store = InMemoryDirectoryStore::new();
        seed_john(&store);

        let record = valid("john.doe", "john2@example.com", "John", "Doe", true);
        match reconcile(&record, &store).unwrap() {
            Classification::Update {
                login_name,
                diff,
                deactivates,
            } => {
                assert_eq!(login_name, "john.doe");
                assert_eq!(diff.field_names(), vec!["email"]);
                assert_eq!(diff.email.as_deref(), Some("john2@example.com"));
                assert!(!deactivates);
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn flipping_active_off_is_flagged_as_deactivation() {
        let store = InMemoryDirectoryStore::new();
        seed_john(&store);

        let record = valid("john.doe", "john@example.com", "John", "Doe", false);
        match reconcile(&record, &store).unwrap() {
            Classification::Update {
                diff, deactivates, ..
            } => {
                assert_eq!(diff.field_names(), vec!["active"]);
                assert!(deactivates);
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn comparison_does_not_case_fold_emails() {
        let store = InMemoryDirectoryStore::new();
        seed_john(&store);

        // Same address up to case; still an update because comparison is
        // exact string equality.
        let record = valid("john.doe", "John@Example.com", "John", "Doe", true);
        assert!(matches!(
            reconcile(&record, &store).unwrap(),
            Classification::Update { .. }
        ));
    }
}
