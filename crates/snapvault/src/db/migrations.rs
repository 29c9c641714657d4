//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. Some migrations (ALTER TABLE ADD COLUMN)
//! are handled conditionally to support idempotent execution.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    /// Whether this migration needs conditional handling
    /// (e.g. ADD COLUMN that may already exist).
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN; skip if column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const CREATE_BACKUP_JOBS: &str = "
CREATE TABLE backup_jobs (
    id               TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'in_progress',
    progress_percent INTEGER NOT NULL DEFAULT 0,
    -- Stored as TEXT: SQLite integers are signed 64-bit and the JSON
    -- layer would clamp to 2^53, so the exact decimal string is kept
    -- end to end.
    size_bytes       TEXT NOT NULL DEFAULT '0',
    content          TEXT,
    error_message    TEXT,
    created_by       TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    completed_at     TEXT
);
CREATE INDEX idx_backup_jobs_status ON backup_jobs(status);
CREATE INDEX idx_backup_jobs_created_at ON backup_jobs(created_at);
";

const CREATE_SCHEDULER_STATE: &str = "
CREATE TABLE scheduler_state (
    id                    INTEGER PRIMARY KEY CHECK (id = 1),
    auto_backup_enabled   INTEGER NOT NULL DEFAULT 0,
    auto_backup_frequency TEXT NOT NULL DEFAULT 'daily',
    last_auto_backup      TEXT
);
INSERT INTO scheduler_state (id, auto_backup_enabled, auto_backup_frequency)
VALUES (1, 0, 'daily');
";

const ADD_LABEL_TO_BACKUP_JOBS: &str = "ALTER TABLE backup_jobs ADD COLUMN label TEXT;";

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_backup_jobs_table",
        sql: CREATE_BACKUP_JOBS,
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_scheduler_state_table",
        sql: CREATE_SCHEDULER_STATE,
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add_label_to_backup_jobs",
        sql: ADD_LABEL_TO_BACKUP_JOBS,
        kind: MigrationKind::AddColumn {
            table: "backup_jobs",
            column: "label",
        },
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    // Create the migrations tracking table.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!(
                "Skipping migration v{} (condition not met)",
                migration.version
            );
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // Validate identifier: only alphanumeric and underscores allowed.
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        // Running again should be a no-op.
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_backup_jobs_has_label_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        assert!(column_exists(&conn, "backup_jobs", "label").unwrap());
    }

    #[test]
    fn test_scheduler_state_singleton_exists() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM scheduler_state", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        // The CHECK constraint forbids a second row.
        let result = conn.execute(
            "INSERT INTO scheduler_state (id, auto_backup_enabled, auto_backup_frequency)
             VALUES (2, 1, 'weekly')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_column_exists_check() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE test_tbl (id TEXT, name TEXT);")
            .unwrap();

        assert!(column_exists(&conn, "test_tbl", "id").unwrap());
        assert!(!column_exists(&conn, "test_tbl", "missing").unwrap());
    }
}
