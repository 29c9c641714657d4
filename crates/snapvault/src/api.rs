//! Service facade.
//!
//! [`BackupService`] wires the store, the orchestrators, and the
//! scheduler together behind one surface, with serde DTOs at the edge.
//! Callers hand in an [`Actor`]; the external scheduler trigger instead
//! authenticates with a shared secret.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::Actor;
use crate::broadcast::{BackupProgressBroadcaster, BackupProgressEvent};
use crate::content::ContentStore;
use crate::db::Database;
use crate::error::{AuthError, Result, ValidationError};
use crate::jobs::{BackupKind, JobListPage, JobQuery, JobRecord, JobStore};
use crate::orchestrator::{BackupOrchestrator, RestoreOrchestrator, RestoreStats};
use crate::scheduler::{AutoBackupFrequency, AutoBackupSettings, BackupScheduler, TickOutcome};

/// Tunables for a [`BackupService`].
#[derive(Debug, Clone)]
pub struct BackupServiceConfig {
    /// Snapshot worker threads.
    pub worker_count: usize,
    /// Progress broadcast channel capacity.
    pub progress_capacity: usize,
    /// How often the scheduler loop ticks.
    pub scheduler_interval: Duration,
    /// Shared secret the external scheduler trigger must present.
    pub scheduler_secret: String,
}

impl Default for BackupServiceConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            progress_capacity: 100,
            scheduler_interval: Duration::from_secs(60),
            scheduler_secret: String::new(),
        }
    }
}

/// Request to start a backup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBackupRequest {
    /// One of `full`, `content_only`, `settings_only`.
    pub kind: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// The id of the job a start request created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBackupResponse {
    pub job_id: String,
}

/// Request to restore a backup into the live store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub job_id: String,
    /// Must be true; restores are destructive.
    #[serde(default)]
    pub confirm: bool,
}

/// Job counts by status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
}

/// The backup subsystem's outward surface.
pub struct BackupService {
    store: JobStore,
    backup: Arc<BackupOrchestrator>,
    restore: RestoreOrchestrator,
    scheduler: BackupScheduler,
    scheduler_secret: String,
}

impl BackupService {
    /// Builds the full subsystem over an open database and the
    /// platform's content store.
    pub fn new(
        db: Database,
        content: Arc<dyn ContentStore>,
        config: BackupServiceConfig,
    ) -> Self {
        let store = JobStore::new(db.clone());
        let broadcaster = BackupProgressBroadcaster::new(config.progress_capacity);
        let backup = Arc::new(BackupOrchestrator::new(
            store.clone(),
            Arc::clone(&content),
            broadcaster,
            config.worker_count,
        ));
        let restore = RestoreOrchestrator::new(store.clone(), content);
        let scheduler = BackupScheduler::new(db, Arc::clone(&backup), config.scheduler_interval);

        Self {
            store,
            backup,
            restore,
            scheduler,
            scheduler_secret: config.scheduler_secret,
        }
    }

    /// Starts a backup job and returns its id without waiting.
    pub fn start_backup(
        &self,
        request: StartBackupRequest,
        actor: &Actor,
    ) -> Result<StartBackupResponse> {
        let kind = BackupKind::parse(&request.kind)
            .ok_or_else(|| ValidationError::UnknownKind(request.kind.clone()))?;
        let job_id = self
            .backup
            .start_backup(kind, request.label.as_deref(), actor)?;
        Ok(StartBackupResponse { job_id })
    }

    /// Fetches one job's metadata. The snapshot payload never rides
    /// along; it stays in the database until a restore needs it.
    pub fn get_job(&self, job_id: &str) -> Result<JobRecord> {
        self.store
            .get(job_id)?
            .ok_or_else(|| ValidationError::JobNotFound(job_id.to_string()).into())
    }

    /// Lists job metadata, filtered and paginated.
    pub fn list_jobs(&self, query: &JobQuery) -> Result<JobListPage> {
        self.store.list(query)
    }

    /// Job counts by status.
    pub fn job_counts(&self) -> Result<JobCounts> {
        let (in_progress, completed, failed) = self.store.counts()?;
        Ok(JobCounts {
            in_progress,
            completed,
            failed,
        })
    }

    /// Deletes a job record and its payload. Admin-only; a deleted
    /// backup cannot be restored.
    pub fn delete_job(&self, job_id: &str, actor: &Actor) -> Result<()> {
        if !actor.can_restore() {
            return Err(AuthError::RestoreForbidden {
                actor: actor.id.clone(),
            }
            .into());
        }
        if !self.store.delete(job_id)? {
            return Err(ValidationError::JobNotFound(job_id.to_string()).into());
        }
        Ok(())
    }

    /// Restores a completed backup into the live content store.
    pub fn restore(&self, request: RestoreRequest, actor: &Actor) -> Result<RestoreStats> {
        self.restore.restore(&request.job_id, actor, request.confirm)
    }

    /// Subscribes to live progress events for all running backups.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<BackupProgressEvent> {
        self.backup.broadcaster().subscribe()
    }

    /// Current automatic-backup settings.
    pub fn scheduler_settings(&self) -> Result<AutoBackupSettings> {
        self.scheduler.settings()
    }

    /// Updates the automatic-backup settings.
    pub fn update_scheduler_settings(
        &self,
        enabled: bool,
        frequency: AutoBackupFrequency,
    ) -> Result<()> {
        self.scheduler.update_settings(enabled, frequency)
    }

    /// External scheduler trigger. Verifies the shared secret, then runs
    /// one scheduling decision.
    pub fn tick_scheduler(&self, secret: &str) -> Result<TickOutcome> {
        if secret != self.scheduler_secret {
            return Err(ValidationError::BadSchedulerSecret.into());
        }
        self.scheduler.sweep_stale_jobs();
        self.scheduler.maybe_run_scheduled_backup(chrono::Utc::now())
    }

    /// Starts the internal scheduler loop. `trigger_rx` wakes it for an
    /// immediate tick.
    pub fn run_scheduler(&self, trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        self.scheduler.start(trigger_rx)
    }

    /// Signals every background component to stop. Workers finish their
    /// current task before exiting.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        self.backup.shutdown();
    }

    /// Access to the underlying store, for embedding callers.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Access to the restore orchestrator, for single-item version
    /// restores.
    pub fn restorer(&self) -> &RestoreOrchestrator {
        &self.restore
    }
}
