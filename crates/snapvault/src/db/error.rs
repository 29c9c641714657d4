//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A stored value could not be interpreted.
    #[error("Corrupt value in column '{column}' of job '{job_id}': {reason}")]
    CorruptValue {
        job_id: String,
        column: &'static str,
        reason: String,
    },

    /// A state transition was attempted on a terminal job record.
    #[error("Job '{job_id}' is already terminal ({status}); {attempted} rejected")]
    TerminalTransition {
        job_id: String,
        status: String,
        attempted: &'static str,
    },
}
