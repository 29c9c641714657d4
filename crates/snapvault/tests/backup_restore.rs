//! End-to-end tests for the backup and restore subsystem.
//!
//! Each test drives the full [`BackupService`] surface: real worker
//! pool, file-backed SQLite job store, in-memory content store.

mod common;

use serde_json::json;

use common::{TestHarness, SCHEDULER_SECRET};
use snapvault::api::RestoreRequest;
use snapvault::content::{Collection, ContentStore};
use snapvault::error::{SnapvaultError, ValidationError};
use snapvault::jobs::{JobQuery, JobStatus};
use snapvault::scheduler::AutoBackupFrequency;
use snapvault::snapshot::deserialize;

#[test]
fn full_backup_captures_every_collection() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    let record = harness.run_backup("full", Some("Nightly"));
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress_percent, 100);
    assert_eq!(record.label.as_deref(), Some("Nightly"));

    let payload = harness
        .service
        .store()
        .get_content(&record.id)
        .unwrap()
        .unwrap();
    assert_eq!(record.size_bytes, payload.len() as u64);

    let doc = deserialize(&payload).unwrap();
    assert_eq!(doc.collections.len(), Collection::ALL.len());
    assert_eq!(doc.records(Collection::Posts).len(), 2);
    assert_eq!(doc.records(Collection::Settings).len(), 1);
}

#[test]
fn partial_kinds_capture_exactly_their_collections() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    let content_only = harness.run_backup("content_only", None);
    let payload = harness
        .service
        .store()
        .get_content(&content_only.id)
        .unwrap()
        .unwrap();
    let doc = deserialize(&payload).unwrap();
    let keys: Vec<&str> = doc.collections.keys().map(String::as_str).collect();
    assert_eq!(keys, ["categories", "post_tags", "posts", "tags"]);

    let settings_only = harness.run_backup("settings_only", None);
    let payload = harness
        .service
        .store()
        .get_content(&settings_only.id)
        .unwrap()
        .unwrap();
    let doc = deserialize(&payload).unwrap();
    let keys: Vec<&str> = doc.collections.keys().map(String::as_str).collect();
    assert_eq!(keys, ["activity_log", "comments", "settings"]);
}

#[test]
fn backup_of_an_empty_store_completes() {
    let harness = TestHarness::new();

    let record = harness.run_backup("full", None);
    assert_eq!(record.status, JobStatus::Completed);
    // Structure alone makes the payload non-empty.
    assert!(record.size_bytes > 0);
}

#[test]
fn failed_collection_read_fails_the_job() {
    let harness = TestHarness::new();
    harness.seed_sample_content();
    harness.content.fail_reads_of(Collection::Posts);

    let record = harness.run_backup("full", None);
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.progress_percent, 0);
    let message = record.error_message.expect("failure must carry a message");
    assert!(message.contains("posts"), "got: {message}");

    // No payload is kept for a failed job.
    assert!(harness
        .service
        .store()
        .get_content(&record.id)
        .unwrap()
        .is_none());
}

#[test]
fn restore_returns_the_store_to_the_backed_up_state() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    let backup = harness.run_backup("full", Some("Before migration"));

    // Live data drifts: posts replaced, settings mutated, tags emptied.
    harness
        .content
        .seed(Collection::Posts, vec![json!({"id": "post-99"})]);
    harness.content.seed(
        Collection::Settings,
        vec![json!({"id": "site", "theme": "light"})],
    );
    harness.content.seed(Collection::Tags, vec![]);

    let stats = harness
        .service
        .restore(
            RestoreRequest {
                job_id: backup.id.clone(),
                confirm: true,
            },
            &harness.admin(),
        )
        .unwrap();

    assert_eq!(stats.collections["posts"], 2);
    assert_eq!(stats.collections["tags"], 1);
    assert_eq!(harness.content.count(Collection::Posts), 2);
    assert_eq!(harness.content.count(Collection::Tags), 1);
    let settings = harness
        .content
        .list_collection(Collection::Settings)
        .unwrap();
    assert_eq!(settings[0]["theme"], "dark");
}

#[test]
fn restoring_the_rollback_snapshot_undoes_a_restore() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    let backup = harness.run_backup("content_only", None);
    harness
        .content
        .seed(Collection::Posts, vec![json!({"id": "drifted"})]);

    let stats = harness
        .service
        .restore(
            RestoreRequest {
                job_id: backup.id.clone(),
                confirm: true,
            },
            &harness.admin(),
        )
        .unwrap();
    assert_eq!(harness.content.count(Collection::Posts), 2);

    // The rollback snapshot holds the drifted state; restoring it undoes
    // the restore.
    harness
        .service
        .restore(
            RestoreRequest {
                job_id: stats.rollback_job_id,
                confirm: true,
            },
            &harness.admin(),
        )
        .unwrap();
    let posts = harness.content.list_collection(Collection::Posts).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], "drifted");
}

#[test]
fn restore_guardrails_hold_through_the_facade() {
    let harness = TestHarness::new();
    harness.seed_sample_content();
    let backup = harness.run_backup("full", None);

    // Missing confirmation.
    let err = harness
        .service
        .restore(
            RestoreRequest {
                job_id: backup.id.clone(),
                confirm: false,
            },
            &harness.admin(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SnapvaultError::Validation(ValidationError::ConfirmationRequired)
    ));

    // Insufficient privilege.
    assert!(harness
        .service
        .restore(
            RestoreRequest {
                job_id: backup.id.clone(),
                confirm: true,
            },
            &harness.editor(),
        )
        .is_err());

    // Unknown job.
    let err = harness
        .service
        .restore(
            RestoreRequest {
                job_id: "no-such-job".to_string(),
                confirm: true,
            },
            &harness.admin(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SnapvaultError::Validation(ValidationError::JobNotFound(_))
    ));
}

#[test]
fn progress_is_monotone_and_ends_at_one_hundred() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    let mut rx = harness.service.subscribe_progress();
    let record = harness.run_backup("full", None);

    // The terminal event lands just after the store transition; poll
    // briefly rather than racing the worker thread.
    let mut last_percent = 0;
    let mut events = 0;
    for _ in 0..200 {
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.job_id, record.id);
            assert!(
                event.percent >= last_percent,
                "progress went backwards: {} after {}",
                event.percent,
                last_percent
            );
            last_percent = event.percent;
            events += 1;
        }
        if last_percent == 100 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(events >= 3, "expected several checkpoints, got {events}");
    assert_eq!(last_percent, 100);
}

#[test]
fn scheduler_runs_once_per_period_via_the_external_trigger() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    assert!(matches!(
        harness.service.tick_scheduler("wrong").unwrap_err(),
        SnapvaultError::Validation(ValidationError::BadSchedulerSecret)
    ));

    harness
        .service
        .update_scheduler_settings(true, AutoBackupFrequency::Daily)
        .unwrap();

    let outcome = harness.service.tick_scheduler(SCHEDULER_SECRET).unwrap();
    assert!(outcome.ran);
    let record = harness.wait_for_terminal(&outcome.job_id.unwrap());
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.created_by, "system");

    // Within the same period nothing more runs.
    assert!(!harness.service.tick_scheduler(SCHEDULER_SECRET).unwrap().ran);
    assert_eq!(
        harness.service.list_jobs(&JobQuery::default()).unwrap().total,
        1
    );
}

#[test]
fn audit_trail_records_backup_and_restore() {
    let harness = TestHarness::new();
    harness.seed_sample_content();

    // content_only leaves the activity log itself out of the restore, so
    // both audit entries survive it.
    let backup = harness.run_backup("content_only", None);
    harness.wait_for_audit("backup_completed");
    harness
        .service
        .restore(
            RestoreRequest {
                job_id: backup.id,
                confirm: true,
            },
            &harness.admin(),
        )
        .unwrap();

    let log = harness
        .content
        .list_collection(Collection::ActivityLog)
        .unwrap();
    let actions: Vec<&str> = log
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"backup_completed"));
    assert!(actions.contains(&"restore_completed"));
}
