//! Backup progress broadcaster for real-time job status streaming.
//!
//! The persisted progress counter in the job store is the source of
//! truth; the broadcast channel is a best-effort mirror for UIs polling
//! less aggressively. Send errors (no receivers) are ignored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::jobs::{BackupKind, JobStore};

/// Coarse stage of a running backup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupStage {
    Dispatched,
    FetchingContent,
    FetchingSecondary,
    Serializing,
    Completed,
    Failed,
}

impl std::fmt::Display for BackupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStage::Dispatched => write!(f, "Dispatched"),
            BackupStage::FetchingContent => write!(f, "Fetching content collections"),
            BackupStage::FetchingSecondary => write!(f, "Fetching secondary collections"),
            BackupStage::Serializing => write!(f, "Serializing snapshot"),
            BackupStage::Completed => write!(f, "Completed"),
            BackupStage::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for a backup job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Which collections the backup covers.
    pub kind: BackupKind,
    /// Current stage.
    pub stage: BackupStage,
    /// 0–100, non-decreasing per job.
    pub percent: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupProgressEvent {
    fn new(job_id: &str, kind: BackupKind, stage: BackupStage, percent: u8, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
            stage,
            percent,
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }
}

/// Broadcasts backup progress events for streaming.
#[derive(Clone)]
pub struct BackupProgressBroadcaster {
    sender: Arc<broadcast::Sender<BackupProgressEvent>>,
}

impl BackupProgressBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<BackupProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one job that persists checkpoints through
    /// the store and mirrors them onto the channel.
    pub fn start_job(&self, job_id: &str, kind: BackupKind, store: JobStore) -> ProgressTracker {
        ProgressTracker {
            job_id: job_id.to_string(),
            kind,
            store,
            sender: Arc::clone(&self.sender),
        }
    }
}

impl Default for BackupProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single backup job.
pub struct ProgressTracker {
    job_id: String,
    kind: BackupKind,
    store: JobStore,
    sender: Arc<broadcast::Sender<BackupProgressEvent>>,
}

impl ProgressTracker {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Records a checkpoint: persisted first, then broadcast.
    ///
    /// A persistence error is logged and swallowed here; losing one
    /// checkpoint must not abort a running snapshot build.
    pub fn checkpoint(&self, stage: BackupStage, percent: u8, message: &str) {
        if let Err(e) = self.store.update_progress(&self.job_id, percent) {
            log::error!(
                "Failed to persist {}% checkpoint for job {}: {}",
                percent,
                self.job_id,
                e
            );
        }
        let event = BackupProgressEvent::new(&self.job_id, self.kind, stage, percent, message);
        let _ = self.sender.send(event);
    }

    /// Broadcasts the terminal completed event. The store transition is
    /// done by the orchestrator, not here.
    pub fn completed(&self, size_bytes: u64) {
        let event = BackupProgressEvent::new(
            &self.job_id,
            self.kind,
            BackupStage::Completed,
            100,
            &format!("Backup completed ({} bytes)", size_bytes),
        );
        let _ = self.sender.send(event);
    }

    /// Broadcasts the terminal failed event.
    pub fn failed(&self, error: &str) {
        let mut event = BackupProgressEvent::new(
            &self.job_id,
            self.kind,
            BackupStage::Failed,
            0,
            "Backup failed",
        );
        event.error = Some(error.to_string());
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Actor, Role};
    use crate::db::Database;
    use crate::jobs::JobStatus;

    fn test_store() -> JobStore {
        JobStore::new(Database::open_in_memory().expect("open in-memory DB"))
    }

    #[test]
    fn test_checkpoint_persists_and_broadcasts() {
        let store = test_store();
        let record = store
            .create(BackupKind::Full, None, &Actor::new("t", Role::Admin))
            .unwrap();

        let broadcaster = BackupProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = broadcaster.start_job(&record.id, BackupKind::Full, store.clone());

        tracker.checkpoint(BackupStage::FetchingContent, 40, "Fetching posts");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.job_id, record.id);
        assert_eq!(event.percent, 40);
        assert_eq!(event.stage, BackupStage::FetchingContent);

        let persisted = store.get(&record.id).unwrap().unwrap();
        assert_eq!(persisted.progress_percent, 40);
        assert_eq!(persisted.status, JobStatus::InProgress);
    }

    #[test]
    fn test_send_without_receivers_is_fine() {
        let store = test_store();
        let record = store
            .create(BackupKind::Full, None, &Actor::new("t", Role::Admin))
            .unwrap();

        let broadcaster = BackupProgressBroadcaster::new(10);
        let tracker = broadcaster.start_job(&record.id, BackupKind::Full, store);
        // No subscribers; must not panic or error.
        tracker.checkpoint(BackupStage::Dispatched, 10, "Dispatched");
        tracker.completed(123);
    }

    #[test]
    fn test_failed_event_carries_error() {
        let store = test_store();
        let broadcaster = BackupProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = broadcaster.start_job("j1", BackupKind::SettingsOnly, store);

        tracker.failed("collection read failed");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.stage, BackupStage::Failed);
        assert_eq!(event.error.as_deref(), Some("collection read failed"));
    }
}
