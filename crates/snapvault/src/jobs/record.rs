//! Job record domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobRow;
use crate::wire::u64_string;

/// Which collections a backup includes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Full,
    ContentOnly,
    SettingsOnly,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Full => "full",
            BackupKind::ContentOnly => "content_only",
            BackupKind::SettingsOnly => "settings_only",
        }
    }

    pub fn parse(s: &str) -> Option<BackupKind> {
        match s {
            "full" => Some(BackupKind::Full),
            "content_only" => Some(BackupKind::ContentOnly),
            "settings_only" => Some(BackupKind::SettingsOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a job record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal records never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn parse_status(s: &str, job_id: &str) -> JobStatus {
    match s {
        "in_progress" => JobStatus::InProgress,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        other => {
            log::warn!(
                "Unknown job status '{}' for job {}, defaulting to InProgress",
                other,
                job_id
            );
            JobStatus::InProgress
        }
    }
}

fn parse_kind(s: &str, job_id: &str) -> BackupKind {
    BackupKind::parse(s).unwrap_or_else(|| {
        log::warn!(
            "Unknown backup kind '{}' for job {}, defaulting to full",
            s,
            job_id
        );
        BackupKind::Full
    })
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// One backup attempt. Metadata only; the snapshot payload is fetched
/// separately via [`crate::jobs::JobStore::get_content`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Unique job identifier (UUID), immutable.
    pub id: String,
    /// Which collections this backup covers.
    pub kind: BackupKind,
    /// Optional human-supplied description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Current state-machine position.
    pub status: JobStatus,
    /// 0–100. Only meaningful while in progress; 100 once completed.
    pub progress_percent: u8,
    /// Exact serialized payload length once completed. Crosses the wire
    /// as a string so multi-gigabyte values never lose precision.
    #[serde(with = "u64_string")]
    pub size_bytes: u64,
    /// Set only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Requester identity; "system" for scheduled runs.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Builds the typed record from a raw database row.
    pub fn from_row(row: &JobRow) -> Self {
        let size_bytes = row.size_bytes.parse::<u64>().unwrap_or_else(|e| {
            log::warn!(
                "Corrupt size_bytes '{}' for job {}: {}; treating as 0",
                row.size_bytes,
                row.id,
                e
            );
            0
        });

        Self {
            id: row.id.clone(),
            kind: parse_kind(&row.kind, &row.id),
            label: row.label.clone(),
            status: parse_status(&row.status, &row.id),
            progress_percent: row.progress_percent.min(100),
            size_bytes,
            error_message: row.error_message.clone(),
            created_by: row.created_by.clone(),
            created_at: parse_timestamp(&row.created_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
        }
    }

    /// Returns true once the record reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
