//! Scheduler state repository: the singleton `scheduler_state` row.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Raw scheduler state row.
#[derive(Debug, Clone, Default)]
pub struct SchedulerRow {
    pub auto_backup_enabled: bool,
    pub auto_backup_frequency: String,
    pub last_auto_backup: Option<String>,
}

/// Loads the singleton scheduler state.
pub fn load(db: &Database) -> Result<SchedulerRow, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn.query_row(
            "SELECT auto_backup_enabled, auto_backup_frequency, last_auto_backup
             FROM scheduler_state WHERE id = 1",
            [],
            |r| {
                Ok(SchedulerRow {
                    auto_backup_enabled: r.get::<_, i64>(0)? != 0,
                    auto_backup_frequency: r.get(1)?,
                    last_auto_backup: r.get(2)?,
                })
            },
        )?;
        Ok(row)
    })
}

/// Saves the singleton scheduler state.
pub fn save(db: &Database, row: &SchedulerRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE scheduler_state SET auto_backup_enabled = ?1,
             auto_backup_frequency = ?2, last_auto_backup = ?3 WHERE id = 1",
            params![
                row.auto_backup_enabled as i64,
                row.auto_backup_frequency,
                row.last_auto_backup,
            ],
        )?;
        Ok(())
    })
}

/// Claims the next automatic run by advancing the last-auto-backup
/// timestamp, but only while the stored value is still absent or at or
/// before `cutoff`. Returns whether this caller won the claim; a false
/// return means another tick already took this interval.
///
/// The due-check and the write are one statement on purpose: racing
/// ticks serialize on the connection, so at most one of them sees a
/// stale timestamp.
pub fn claim_auto_backup(
    db: &Database,
    timestamp: &str,
    cutoff: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE scheduler_state SET last_auto_backup = ?1
             WHERE id = 1 AND (last_auto_backup IS NULL OR last_auto_backup <= ?2)",
            params![timestamp, cutoff],
        )?;
        Ok(changed == 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_after_migration() {
        let db = Database::open_in_memory().unwrap();
        let row = load(&db).unwrap();

        assert!(!row.auto_backup_enabled);
        assert_eq!(row.auto_backup_frequency, "daily");
        assert!(row.last_auto_backup.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        save(
            &db,
            &SchedulerRow {
                auto_backup_enabled: true,
                auto_backup_frequency: "weekly".to_string(),
                last_auto_backup: Some("2026-02-01T00:00:00+00:00".to_string()),
            },
        )
        .unwrap();

        let row = load(&db).unwrap();
        assert!(row.auto_backup_enabled);
        assert_eq!(row.auto_backup_frequency, "weekly");
        assert_eq!(
            row.last_auto_backup.as_deref(),
            Some("2026-02-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_claim_with_no_prior_run() {
        let db = Database::open_in_memory().unwrap();
        assert!(claim_auto_backup(
            &db,
            "2026-03-01T12:00:00+00:00",
            "2026-02-28T12:00:00+00:00"
        )
        .unwrap());

        let row = load(&db).unwrap();
        assert_eq!(
            row.last_auto_backup.as_deref(),
            Some("2026-03-01T12:00:00+00:00")
        );
    }

    #[test]
    fn test_claim_is_exclusive_within_the_cutoff() {
        let db = Database::open_in_memory().unwrap();
        let timestamp = "2026-03-02T12:00:00+00:00";
        let cutoff = "2026-03-01T12:00:00+00:00";

        assert!(claim_auto_backup(&db, timestamp, cutoff).unwrap());
        // Stored value is now past the cutoff, so a repeat claim loses.
        assert!(!claim_auto_backup(&db, timestamp, cutoff).unwrap());

        let row = load(&db).unwrap();
        assert_eq!(row.last_auto_backup.as_deref(), Some(timestamp));
    }

    #[test]
    fn test_claim_succeeds_once_the_stored_run_is_old_enough() {
        let db = Database::open_in_memory().unwrap();
        assert!(claim_auto_backup(
            &db,
            "2026-03-01T12:00:00+00:00",
            "2026-02-28T12:00:00+00:00"
        )
        .unwrap());
        assert!(claim_auto_backup(
            &db,
            "2026-03-03T12:00:00+00:00",
            "2026-03-02T12:00:00+00:00"
        )
        .unwrap());
    }
}
