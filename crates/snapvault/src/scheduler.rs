//! Automatic backup scheduler.
//!
//! A background thread ticks on a fixed interval and, when automatic
//! backups are enabled and the configured period has elapsed since the
//! last run, starts a FULL backup under the system actor. The
//! last-run timestamp is claimed atomically before the backup is
//! dispatched, so ticks that fire on two instances at once cannot
//! double-run. Each tick also sweeps jobs stuck IN_PROGRESS past the
//! staleness cutoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::Actor;
use crate::db::{scheduler_repo, Database};
use crate::error::Result;
use crate::jobs::{format_timestamp, parse_timestamp, BackupKind};
use crate::orchestrator::BackupOrchestrator;

/// How long a job may sit IN_PROGRESS before a tick fails it as stale.
const STALE_JOB_CUTOFF_HOURS: i64 = 1;

/// How often automatic backups run once enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoBackupFrequency {
    Daily,
    Weekly,
}

impl AutoBackupFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoBackupFrequency::Daily => "daily",
            AutoBackupFrequency::Weekly => "weekly",
        }
    }

    /// Parses a stored frequency, defaulting to daily on garbage.
    pub fn parse(s: &str) -> AutoBackupFrequency {
        match s {
            "daily" => AutoBackupFrequency::Daily,
            "weekly" => AutoBackupFrequency::Weekly,
            other => {
                log::warn!("Unknown backup frequency '{}', assuming daily", other);
                AutoBackupFrequency::Daily
            }
        }
    }

    /// The elapsed time after which the next automatic run is due.
    pub fn period(&self) -> chrono::Duration {
        match self {
            AutoBackupFrequency::Daily => chrono::Duration::hours(24),
            AutoBackupFrequency::Weekly => chrono::Duration::hours(24 * 7),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AutoBackupFrequency::Daily => "Automated Daily Backup",
            AutoBackupFrequency::Weekly => "Automated Weekly Backup",
        }
    }
}

impl std::fmt::Display for AutoBackupFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed view of the persisted scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBackupSettings {
    pub enabled: bool,
    pub frequency: AutoBackupFrequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_auto_backup: Option<DateTime<Utc>>,
}

impl AutoBackupSettings {
    fn from_row(row: scheduler_repo::SchedulerRow) -> Self {
        Self {
            enabled: row.auto_backup_enabled,
            frequency: AutoBackupFrequency::parse(&row.auto_backup_frequency),
            last_auto_backup: row.last_auto_backup.as_deref().map(parse_timestamp),
        }
    }
}

/// What a single scheduler tick did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    /// Whether an automatic backup was started by this tick.
    pub ran: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl TickOutcome {
    fn skipped() -> Self {
        Self {
            ran: false,
            job_id: None,
        }
    }
}

/// Drives automatic backups and the stale-job sweep.
pub struct BackupScheduler {
    db: Database,
    orchestrator: Arc<BackupOrchestrator>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl BackupScheduler {
    pub fn new(db: Database, orchestrator: Arc<BackupOrchestrator>, interval: Duration) -> Self {
        Self {
            db,
            orchestrator,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current scheduler settings.
    pub fn settings(&self) -> Result<AutoBackupSettings> {
        Ok(AutoBackupSettings::from_row(scheduler_repo::load(
            &self.db,
        )?))
    }

    /// Enables or disables automatic backups and sets their frequency.
    /// The last-run timestamp is preserved across setting changes.
    pub fn update_settings(&self, enabled: bool, frequency: AutoBackupFrequency) -> Result<()> {
        let mut row = scheduler_repo::load(&self.db)?;
        row.auto_backup_enabled = enabled;
        row.auto_backup_frequency = frequency.as_str().to_string();
        scheduler_repo::save(&self.db, &row)?;
        log::info!(
            "Automatic backups {} ({})",
            if enabled { "enabled" } else { "disabled" },
            frequency
        );
        Ok(())
    }

    /// Runs one scheduling decision at `now`.
    ///
    /// A run is due when no automatic backup has happened yet or the
    /// last one is at least a period old. The due-check and the
    /// timestamp write are a single conditional update, so when several
    /// ticks race on the same interval exactly one wins the claim and
    /// dispatches; the rest skip.
    pub fn maybe_run_scheduled_backup(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let settings = self.settings()?;
        if !settings.enabled {
            return Ok(TickOutcome::skipped());
        }

        // Claim the interval before dispatching anything.
        let cutoff = now - settings.frequency.period();
        let claimed = scheduler_repo::claim_auto_backup(
            &self.db,
            &format_timestamp(now),
            &format_timestamp(cutoff),
        )?;
        if !claimed {
            return Ok(TickOutcome::skipped());
        }

        let job_id = self.orchestrator.start_backup(
            BackupKind::Full,
            Some(settings.frequency.label()),
            &Actor::system(),
        )?;
        log::info!("Scheduled {} backup started as job {}", settings.frequency, job_id);

        Ok(TickOutcome {
            ran: true,
            job_id: Some(job_id),
        })
    }

    /// Fails jobs stuck IN_PROGRESS past the cutoff.
    pub fn sweep_stale_jobs(&self) {
        let cutoff = chrono::Duration::hours(STALE_JOB_CUTOFF_HOURS);
        match self.orchestrator.store().fail_stale(cutoff) {
            Ok(failed) if !failed.is_empty() => {
                log::warn!("Failed {} stale backup job(s): {:?}", failed.len(), failed);
            }
            Ok(_) => {}
            Err(e) => log::error!("Stale job sweep failed: {}", e),
        }
    }

    /// Starts the tick loop in a background thread.
    /// Accepts a trigger receiver for manual tick requests.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let db = self.db.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        std::thread::spawn(move || {
            let scheduler = BackupScheduler {
                db,
                orchestrator,
                interval,
                shutdown: Arc::clone(&shutdown),
            };

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build scheduler runtime");

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual scheduler tick triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    scheduler.sweep_stale_jobs();
                    if let Err(e) = scheduler.maybe_run_scheduled_backup(Utc::now()) {
                        log::error!("Scheduled backup failed to start: {}", e);
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
