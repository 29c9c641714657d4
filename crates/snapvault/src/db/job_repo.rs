//! Job record repository: row-level operations for the `backup_jobs` table.
//!
//! List and lookup queries never select the `content` column; snapshot
//! payloads can be multi-megabyte and are only pulled by the dedicated
//! `get_content` accessor when a restore actually needs them.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Columns selected for metadata views. `content` is deliberately absent.
const META_COLUMNS: &str = "id, kind, label, status, progress_percent, size_bytes, \
     error_message, created_by, created_at, updated_at, completed_at";

/// A raw job row from the database, without the content payload.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub kind: String,
    pub label: Option<String>,
    pub status: String,
    pub progress_percent: u8,
    pub size_bytes: String,
    pub error_message: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            label: row.get("label")?,
            status: row.get("status")?,
            progress_percent: row.get("progress_percent")?,
            size_bytes: row.get("size_bytes")?,
            error_message: row.get("error_message")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row with status `in_progress` and zero progress.
pub fn insert(db: &Database, row: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO backup_jobs (id, kind, label, status, progress_percent, size_bytes,
             error_message, created_by, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.kind,
                row.label,
                row.status,
                row.progress_percent,
                row.size_bytes,
                row.error_message,
                row.created_by,
                row.created_at,
                row.updated_at,
                row.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by ID, metadata only.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {} FROM backup_jobs WHERE id = ?1", META_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Fetches the serialized snapshot payload of a completed job.
pub fn get_content(db: &Database, id: &str) -> Result<Option<Vec<u8>>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT content FROM backup_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, Option<String>>(0))?;
        match rows.next() {
            Some(Ok(content)) => Ok(content.map(|s| s.into_bytes())),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Advances the progress counter of an in-progress job.
///
/// The WHERE clause enforces both state-machine rules in one statement:
/// terminal records are never touched and progress never goes backwards.
/// Returns whether a row was actually updated.
pub fn update_progress(
    db: &Database,
    id: &str,
    percent: u8,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE backup_jobs SET progress_percent = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'in_progress' AND progress_percent <= ?2",
            params![id, percent, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// Transitions a job to `completed`, attaching content and size.
///
/// Only fires on in-progress rows, so calling it twice (or after `fail`)
/// is a no-op rather than a corruption. Returns whether the transition
/// happened.
pub fn complete(
    db: &Database,
    id: &str,
    content: &[u8],
    size_bytes: &str,
    completed_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let content = std::str::from_utf8(content).map_err(|e| DatabaseError::CorruptValue {
            job_id: id.to_string(),
            column: "content",
            reason: e.to_string(),
        })?;
        let changed = conn.execute(
            "UPDATE backup_jobs SET status = 'completed', progress_percent = 100,
             size_bytes = ?2, content = ?3, updated_at = ?4, completed_at = ?4
             WHERE id = ?1 AND status = 'in_progress'",
            params![id, size_bytes, content, completed_at],
        )?;
        Ok(changed > 0)
    })
}

/// Transitions a job to `failed`, recording the error and resetting
/// progress. Same idempotence rule as [`complete`].
pub fn fail(
    db: &Database,
    id: &str,
    error_message: &str,
    completed_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE backup_jobs SET status = 'failed', progress_percent = 0,
             error_message = ?2, content = NULL, updated_at = ?3, completed_at = ?3
             WHERE id = ?1 AND status = 'in_progress'",
            params![id, error_message, completed_at],
        )?;
        Ok(changed > 0)
    })
}

/// Fails every in-progress job whose last update is older than the
/// cutoff. Returns the ids of the rows swept.
pub fn fail_stale(
    db: &Database,
    cutoff: &str,
    error_message: &str,
    completed_at: &str,
) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id FROM backup_jobs WHERE status = 'in_progress' AND updated_at < ?1",
        )?;
        let stale: Vec<String> = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for id in &stale {
            conn.execute(
                "UPDATE backup_jobs SET status = 'failed', progress_percent = 0,
                 error_message = ?2, updated_at = ?3, completed_at = ?3
                 WHERE id = ?1 AND status = 'in_progress'",
                params![id, error_message, completed_at],
            )?;
        }
        Ok(stale)
    })
}

/// Deletes a job row and its stored content permanently.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM backup_jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Queries job metadata with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref kind) = filter.kind {
            conditions.push(format!("kind = ?{}", param_values.len() + 1));
            param_values.push(Box::new(kind.clone()));
        }
        if let Some(ref created_by) = filter.created_by {
            conditions.push(format!("created_by = ?{}", param_values.len() + 1));
            param_values.push(Box::new(created_by.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM backup_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT {} FROM backup_jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            META_COLUMNS,
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM backup_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
