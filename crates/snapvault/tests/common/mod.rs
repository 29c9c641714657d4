//! Shared test utilities for snapvault integration tests.
//!
//! `TestHarness` runs a full [`BackupService`] against a file-backed
//! database in a temp directory and a seeded in-memory content store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use snapvault::auth::{Actor, Role};
use snapvault::api::{BackupService, BackupServiceConfig, StartBackupRequest};
use snapvault::content::{Collection, ContentStore, MemoryContentStore};
use snapvault::db::Database;
use snapvault::jobs::JobRecord;

pub const SCHEDULER_SECRET: &str = "integration-secret";

/// Isolated service instance over a real on-disk database.
pub struct TestHarness {
    /// Holds the database file alive for the test's duration.
    temp_dir: TempDir,
    pub service: BackupService,
    pub content: Arc<MemoryContentStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("backups.db"))
            .expect("Failed to open test database");

        let content = Arc::new(MemoryContentStore::new());
        let service = BackupService::new(
            db,
            Arc::clone(&content) as Arc<dyn ContentStore>,
            BackupServiceConfig {
                worker_count: 1,
                scheduler_secret: SCHEDULER_SECRET.to_string(),
                ..BackupServiceConfig::default()
            },
        );

        Self {
            temp_dir,
            service,
            content,
        }
    }

    /// Seeds a small but representative content set across every
    /// collection group.
    pub fn seed_sample_content(&self) {
        self.content.seed(
            Collection::Posts,
            vec![
                json!({"id": "post-1", "title": "Launch notes", "views": 120}),
                json!({"id": "post-2", "title": "Retro", "views": 48}),
            ],
        );
        self.content.seed(
            Collection::Categories,
            vec![json!({"id": "cat-1", "name": "engineering"})],
        );
        self.content
            .seed(Collection::Tags, vec![json!({"id": "tag-1", "name": "rust"})]);
        self.content.seed(
            Collection::PostTags,
            vec![json!({"postId": "post-1", "tagId": "tag-1"})],
        );
        self.content.seed(
            Collection::Comments,
            vec![json!({"id": "com-1", "postId": "post-1", "body": "Nice"})],
        );
        self.content.seed(
            Collection::Settings,
            vec![json!({"id": "site", "theme": "dark", "title": "Blog"})],
        );
        self.content
            .seed(Collection::Ads, vec![json!({"id": "ad-1", "slot": "header"})]);
        self.content.seed(
            Collection::Redirects,
            vec![json!({"id": "r-1", "from": "/old", "to": "/new"})],
        );
    }

    pub fn admin(&self) -> Actor {
        Actor::new("root", Role::Admin)
    }

    pub fn editor(&self) -> Actor {
        Actor::new("alice", Role::Editor)
    }

    /// Starts a backup and blocks until its job reaches a terminal state.
    pub fn run_backup(&self, kind: &str, label: Option<&str>) -> JobRecord {
        let response = self
            .service
            .start_backup(
                StartBackupRequest {
                    kind: kind.to_string(),
                    label: label.map(String::from),
                },
                &self.admin(),
            )
            .expect("start_backup failed");
        self.wait_for_terminal(&response.job_id)
    }

    /// Polls until an audit entry with the given action appears. The
    /// worker appends it just after the terminal transition, so tests
    /// inspecting the trail wait here instead of racing the thread.
    pub fn wait_for_audit(&self, action: &str) {
        for _ in 0..300 {
            let log = self
                .content
                .list_collection(Collection::ActivityLog)
                .expect("activity log read failed");
            if log.iter().any(|e| e["action"] == action) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("audit entry '{}' never appeared", action);
    }

    /// Polls until the job leaves IN_PROGRESS.
    pub fn wait_for_terminal(&self, job_id: &str) -> JobRecord {
        for _ in 0..300 {
            let record = self.service.get_job(job_id).expect("get_job failed");
            if record.status.is_terminal() {
                return record;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("job {} never reached a terminal state", job_id);
    }
}
