//! Typed job store over the raw repository.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::{Result, SnapvaultError, ValidationError};
use crate::jobs::record::{format_timestamp, BackupKind, JobRecord, JobStatus};

/// Query parameters for job listing.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One page of job metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListPage {
    pub jobs: Vec<JobRecord>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Persistent job store backed by rusqlite.
///
/// Owns every state transition of the job state machine. Transitions
/// into a terminal state are enforced at the SQL level, so concurrent
/// callers cannot corrupt a record no matter how they interleave.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates a new in-progress record and returns it.
    pub fn create(
        &self,
        kind: BackupKind,
        label: Option<&str>,
        actor: &Actor,
    ) -> Result<JobRecord> {
        let now = Utc::now();
        let now_str = format_timestamp(now);
        let row = JobRow {
            id: Uuid::new_v4().to_string(),
            kind: kind.as_str().to_string(),
            label: label.map(|s| s.to_string()),
            status: JobStatus::InProgress.as_str().to_string(),
            progress_percent: 0,
            size_bytes: "0".to_string(),
            error_message: None,
            created_by: actor.id.clone(),
            created_at: now_str.clone(),
            updated_at: now_str,
            completed_at: None,
        };
        job_repo::insert(&self.db, &row)?;

        log::info!("Created {} backup job {} for {}", kind, row.id, actor);
        Ok(JobRecord::from_row(&row))
    }

    /// Records a progress checkpoint for an in-progress job.
    ///
    /// Checkpoints are clamped to 100. A checkpoint lower than the
    /// current value is dropped silently, which keeps observed progress
    /// non-decreasing even if reports arrive out of order. Updates on
    /// terminal records are rejected with an error.
    pub fn update_progress(&self, id: &str, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        let now = format_timestamp(Utc::now());
        if job_repo::update_progress(&self.db, id, percent, &now)? {
            log::debug!("Job {} progress {}%", id, percent);
            return Ok(());
        }

        match self.get(id)? {
            None => Err(ValidationError::JobNotFound(id.to_string()).into()),
            Some(record) if record.status.is_terminal() => {
                Err(SnapvaultError::Database(DatabaseError::TerminalTransition {
                    job_id: id.to_string(),
                    status: record.status.to_string(),
                    attempted: "progress update",
                }))
            }
            // Out-of-order checkpoint; the stored value already moved past it.
            Some(_) => Ok(()),
        }
    }

    /// Completes a job, attaching the serialized payload.
    ///
    /// Calling this on an already-terminal record is a warning-logged
    /// no-op; the first terminal transition wins.
    pub fn complete(&self, id: &str, content: &[u8], size_bytes: u64) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let size = size_bytes.to_string();
        if job_repo::complete(&self.db, id, content, &size, &now)? {
            log::info!("Job {} completed, {} bytes", id, size);
            return Ok(());
        }

        match self.get(id)? {
            None => Err(ValidationError::JobNotFound(id.to_string()).into()),
            Some(record) => {
                log::warn!(
                    "complete() on job {} ignored: already {}",
                    id,
                    record.status
                );
                Ok(())
            }
        }
    }

    /// Fails a job with an operator-readable message. Same idempotence
    /// rule as [`complete`](Self::complete).
    pub fn fail(&self, id: &str, error_message: &str) -> Result<()> {
        let now = format_timestamp(Utc::now());
        if job_repo::fail(&self.db, id, error_message, &now)? {
            log::warn!("Job {} failed: {}", id, error_message);
            return Ok(());
        }

        match self.get(id)? {
            None => Err(ValidationError::JobNotFound(id.to_string()).into()),
            Some(record) => {
                log::warn!("fail() on job {} ignored: already {}", id, record.status);
                Ok(())
            }
        }
    }

    /// Returns a job's metadata, content omitted.
    pub fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        let row = job_repo::find_by_id(&self.db, id)?;
        Ok(row.as_ref().map(JobRecord::from_row))
    }

    /// Returns the stored snapshot payload of a job, if any is attached.
    pub fn get_content(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(job_repo::get_content(&self.db, id)?)
    }

    /// Lists job metadata newest-first with filters and pagination.
    pub fn list(&self, query: &JobQuery) -> Result<JobListPage> {
        let filter = JobFilter {
            status: query.status.clone(),
            kind: query.kind.clone(),
            created_by: query.created_by.clone(),
            limit: query.limit,
            offset: query.offset,
        };
        let (rows, total) = job_repo::query(&self.db, &filter)?;
        Ok(JobListPage {
            jobs: rows.iter().map(JobRecord::from_row).collect(),
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// Deletes a record and its payload permanently. Returns whether a
    /// row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = job_repo::delete(&self.db, id)?;
        if removed {
            log::info!("Deleted backup job {}", id);
        }
        Ok(removed)
    }

    /// Counts per status: (in progress, completed, failed).
    pub fn counts(&self) -> Result<(u64, u64, u64)> {
        Ok((
            job_repo::count_by_status(&self.db, JobStatus::InProgress.as_str())?,
            job_repo::count_by_status(&self.db, JobStatus::Completed.as_str())?,
            job_repo::count_by_status(&self.db, JobStatus::Failed.as_str())?,
        ))
    }

    /// Fails every in-progress record whose last update is older than
    /// `older_than`. These are jobs whose worker died before reaching a
    /// terminal transition; nothing will ever finish them.
    pub fn fail_stale(&self, older_than: Duration) -> Result<Vec<String>> {
        let now = Utc::now();
        let cutoff = format_timestamp(now - older_than);
        let swept = job_repo::fail_stale(
            &self.db,
            &cutoff,
            "backup worker did not report completion; marked failed by staleness sweep",
            &format_timestamp(now),
        )?;
        if !swept.is_empty() {
            log::warn!("Staleness sweep failed {} orphaned job(s): {:?}", swept.len(), swept);
        }
        Ok(swept)
    }
}
