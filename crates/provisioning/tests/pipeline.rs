//! End-to-end pipeline scenarios: whole files through the job tracker
//! against an in-memory directory.

use std::sync::Arc;

use proptest::prelude::*;

use dirsync_directory::{DirectoryStore, IdentityRecord, InMemoryDirectoryStore};
use dirsync_provisioning::{
    InMemoryJobStore, JobStatus, JobTracker, RetryPolicy, RowClass, RowErrorKind,
};

type Tracker = JobTracker<InMemoryJobStore, Arc<InMemoryDirectoryStore>>;

fn harness() -> (Tracker, Arc<InMemoryDirectoryStore>) {
    dirsync_observability::init();
    let directory = InMemoryDirectoryStore::arc();
    let tracker = JobTracker::new(InMemoryJobStore::new(), directory.clone())
        .with_retry_policy(RetryPolicy::no_retry());
    (tracker, directory)
}

fn run(tracker: &Tracker, file: &str, dry_run: bool) -> dirsync_provisioning::JobReport {
    let job = tracker
        .create_job("CSV Import", "users.csv", "admin")
        .expect("create job");
    tracker
        .execute_job(job.id, file.as_bytes(), dry_run)
        .expect("execute job")
}

const JOHN_FILE: &str =
    "loginName,email,firstName,lastName,active\njohn.doe,john@example.com,John,Doe,true\n";

#[test]
fn first_run_creates_then_identical_run_is_noop() {
    let (tracker, directory) = harness();

    let report = run(&tracker, JOHN_FILE, false);
    assert_eq!(report.job.status, JobStatus::Completed);
    assert_eq!(report.job.created_count, 1);
    assert_eq!(report.job.noop_count, 0);
    assert!(directory.find_by_login_name("john.doe").unwrap().is_some());

    // Idempotence: same file again yields NOOP for every row.
    let report = run(&tracker, JOHN_FILE, false);
    assert_eq!(report.job.status, JobStatus::Completed);
    assert_eq!(report.job.created_count, 0);
    assert_eq!(report.job.noop_count, 1);
    assert_eq!(report.rows[0].class, RowClass::Noop);
}

#[test]
fn changed_email_yields_update_with_minimal_diff() {
    let (tracker, _) = harness();
    run(&tracker, JOHN_FILE, false);

    let changed =
        "loginName,email,firstName,lastName,active\njohn.doe,john2@example.com,John,Doe,true\n";
    let report = run(&tracker, changed, false);

    assert_eq!(report.job.updated_count, 1);
    match &report.rows[0].class {
        RowClass::Updated {
            diff_fields,
            deactivated,
        } => {
            assert_eq!(diff_fields, &vec!["email".to_string()]);
            assert!(!deactivated);
        }
        other => panic!("expected Updated, got {other:?}"),
    }
}

#[test]
fn empty_first_name_rejects_the_row_but_completes_the_job() {
    let (tracker, directory) = harness();

    let file = "loginName,email,firstName,lastName,active\n\
                john.doe,john@example.com,,Doe,true\n\
                jane.smith,jane@example.com,Jane,Smith,true\n";
    let report = run(&tracker, file, false);

    assert_eq!(report.job.status, JobStatus::Completed);
    assert_eq!(report.job.failed_count, 1);
    assert_eq!(report.job.created_count, 1);

    let rejections: Vec<_> = report.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].row_number, 1);
    match &rejections[0].class {
        RowClass::Rejected { reason } => {
            assert_eq!(reason.to_string(), "MissingRequiredField:firstName")
        }
        other => panic!("expected Rejected, got {other:?}"),
    }

    // The bad row never reached the store; the good one did.
    assert!(directory.find_by_login_name("john.doe").unwrap().is_none());
    assert!(directory.find_by_login_name("jane.smith").unwrap().is_some());
}

#[test]
fn duplicate_login_name_in_batch_keeps_first_occurrence() {
    let (tracker, directory) = harness();

    let file = "loginName,email,firstName,lastName\n\
                john.doe,john@example.com,John,Doe\n\
                john.doe,second@example.com,Johnny,Doe\n";
    let report = run(&tracker, file, false);

    assert_eq!(report.job.created_count, 1);
    assert_eq!(report.job.failed_count, 1);
    assert_eq!(report.rows[0].class, RowClass::Created);
    match &report.rows[1].class {
        RowClass::Rejected {
            reason: RowErrorKind::DuplicateInBatch(name),
        } => assert_eq!(name, "john.doe"),
        other => panic!("expected DuplicateInBatch, got {other:?}"),
    }

    // First occurrence won.
    let stored = directory.find_by_login_name("john.doe").unwrap().unwrap();
    assert_eq!(stored.email, "john@example.com");
}

#[test]
fn deactivation_is_counted_separately() {
    let (tracker, _) = harness();
    run(&tracker, JOHN_FILE, false);

    let deactivate =
        "loginName,email,firstName,lastName,active\njohn.doe,john@example.com,John,Doe,false\n";
    let report = run(&tracker, deactivate, false);

    assert_eq!(report.job.updated_count, 1);
    assert_eq!(report.job.deactivated_count, 1);
    assert!(report.job.counters_consistent());
}

#[test]
fn email_collision_across_login_names_is_rejected() {
    let (tracker, _) = harness();
    run(&tracker, JOHN_FILE, false);

    // Different login name, same email.
    let colliding =
        "loginName,email,firstName,lastName\njane.smith,john@example.com,Jane,Smith\n";
    let report = run(&tracker, colliding, false);

    assert_eq!(report.job.failed_count, 1);
    match &report.rows[0].class {
        RowClass::Rejected {
            reason: RowErrorKind::EmailConflict(_),
        } => {}
        other => panic!("expected EmailConflict, got {other:?}"),
    }
}

#[test]
fn dry_run_and_real_run_classify_identically() {
    let (tracker, directory) = harness();
    directory.seed(IdentityRecord {
        login_name: "existing.user".to_string(),
        email: "existing@example.com".to_string(),
        first_name: "Existing".to_string(),
        last_name: "User".to_string(),
        active: true,
    });

    let file = "loginName,email,firstName,lastName,active\n\
                new.user,new@example.com,New,User,true\n\
                existing.user,changed@example.com,Existing,User,true\n\
                existing.user,dup@example.com,Dup,User,true\n\
                bad.row,not-an-email,Bad,Row,true\n";

    let dry = run(&tracker, file, true);
    // Dry run must not have touched the store.
    assert_eq!(directory.len(), 1);

    let real = run(&tracker, file, false);

    let dry_classes: Vec<_> = dry.rows.iter().map(|r| &r.class).collect();
    let real_classes: Vec<_> = real.rows.iter().map(|r| &r.class).collect();
    assert_eq!(dry_classes, real_classes);

    assert_eq!(dry.job.created_count, real.job.created_count);
    assert_eq!(dry.job.updated_count, real.job.updated_count);
    assert_eq!(dry.job.noop_count, real.job.noop_count);
    assert_eq!(dry.job.failed_count, real.job.failed_count);

    // Only the real run persisted anything.
    assert_eq!(directory.len(), 2);
}

#[test]
fn dry_run_tracks_email_handoff_within_the_batch() {
    let (tracker, directory) = harness();
    directory.seed(IdentityRecord {
        login_name: "john.doe".to_string(),
        email: "john@example.com".to_string(),
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        active: true,
    });

    // Row 0 moves john off his address, row 1 gives it to a new user.
    let file = "loginName,email,firstName,lastName\n\
                john.doe,john.new@example.com,John,Doe\n\
                jane.smith,john@example.com,Jane,Smith\n";

    let dry = run(&tracker, file, true);
    assert_eq!(dry.job.updated_count, 1);
    assert_eq!(dry.job.created_count, 1);
    assert_eq!(dry.job.failed_count, 0);
    assert_eq!(directory.len(), 1);

    let real = run(&tracker, file, false);
    let dry_classes: Vec<_> = dry.rows.iter().map(|r| &r.class).collect();
    let real_classes: Vec<_> = real.rows.iter().map(|r| &r.class).collect();
    assert_eq!(dry_classes, real_classes);
    assert_eq!(
        directory
            .find_by_email("john@example.com")
            .unwrap()
            .unwrap()
            .login_name,
        "jane.smith"
    );
}

#[test]
fn job_history_lists_both_runs_most_recent_first() {
    let (tracker, _) = harness();
    let first = tracker.create_job("first", "a.csv", "admin").unwrap();
    tracker
        .execute_job(first.id, JOHN_FILE.as_bytes(), true)
        .unwrap();
    let second = tracker.create_job("second", "b.csv", "admin").unwrap();
    tracker
        .execute_job(second.id, b"loginName,email\nx,y\n", false)
        .unwrap_err();

    let jobs = tracker.list_jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, second.id);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert_eq!(jobs[1].id, first.id);
    assert_eq!(jobs[1].status, JobStatus::Completed);
}

// ─────────────────────────────────────────────────────────────────────────────
// Property tests
// ─────────────────────────────────────────────────────────────────────────────

/// One generated CSV cell set: login and email are drawn from small
/// independent pools so that duplicate logins and cross-login email
/// collisions actually occur.
#[derive(Debug, Clone)]
struct GenRow {
    login: String,
    email_tag: u8,
    first: String,
    last: String,
    active: bool,
    blank_first: bool,
}

fn gen_row() -> impl Strategy<Value = GenRow> {
    (
        0u8..8,
        0u8..4,
        "[A-Za-z]{1,8}",
        "[A-Za-z]{1,8}",
        any::<bool>(),
        prop::bool::weighted(0.15),
    )
        .prop_map(|(login_n, email_tag, first, last, active, blank_first)| GenRow {
            login: format!("user{login_n}"),
            email_tag,
            first,
            last,
            active,
            blank_first,
        })
}

fn render_file(rows: &[GenRow]) -> String {
    let mut out = String::from("loginName,email,firstName,lastName,active\n");
    for row in rows {
        let first = if row.blank_first { "" } else { row.first.as_str() };
        out.push_str(&format!(
            "{},addr{}@example.com,{},{},{}\n",
            row.login, row.email_tag, first, row.last, row.active
        ));
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: for any generated file, the counter invariant holds and
    /// the sum equals the number of data rows.
    #[test]
    fn counters_always_account_for_every_row(rows in prop::collection::vec(gen_row(), 0..40)) {
        let (tracker, _) = harness();
        let file = render_file(&rows);
        let report = run(&tracker, &file, false);

        prop_assert_eq!(report.job.status, JobStatus::Completed);
        prop_assert!(report.job.counters_consistent());
        prop_assert_eq!(report.job.total_processed as usize, rows.len());
        prop_assert_eq!(report.rows.len(), rows.len());
    }

    /// Property: dry-run and a subsequent real run on the same initial
    /// store state classify every row identically.
    #[test]
    fn dry_run_matches_real_run(rows in prop::collection::vec(gen_row(), 0..40)) {
        let (tracker, directory) = harness();
        let file = render_file(&rows);

        let dry = run(&tracker, &file, true);
        prop_assert!(directory.is_empty());

        let real = run(&tracker, &file, false);

        let dry_classes: Vec<_> = dry.rows.iter().map(|r| r.class.clone()).collect();
        let real_classes: Vec<_> = real.rows.iter().map(|r| r.class.clone()).collect();
        prop_assert_eq!(dry_classes, real_classes);
        prop_assert_eq!(dry.job.created_count, real.job.created_count);
        prop_assert_eq!(dry.job.failed_count, real.job.failed_count);
    }

    /// Property: running the same file twice in real mode leaves every
    /// accepted row as NOOP the second time.
    #[test]
    fn second_real_run_is_all_noops(rows in prop::collection::vec(gen_row(), 0..40)) {
        let (tracker, _) = harness();
        let file = render_file(&rows);

        let first = run(&tracker, &file, false);
        let second = run(&tracker, &file, false);

        prop_assert_eq!(second.job.created_count, 0);
        prop_assert_eq!(second.job.updated_count, 0);
        prop_assert_eq!(
            second.job.noop_count,
            first.job.created_count + first.job.updated_count + first.job.noop_count
        );
        prop_assert_eq!(second.job.failed_count, first.job.failed_count);
    }
}
