//! Backup job orchestrator.
//!
//! `start_backup` creates the job record and returns its id immediately;
//! the snapshot itself runs on a small worker pool so a caller's request
//! timeout never bounds snapshot size. Workers push every outcome into
//! the job store: an error that escapes the build always reaches the
//! `fail` transition, never an unobserved thread death.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::auth::Actor;
use crate::broadcast::{BackupProgressBroadcaster, BackupStage};
use crate::content::{AuditEntry, ContentStore};
use crate::error::{AuthError, Result, SnapvaultError};
use crate::jobs::{BackupKind, JobStore};
use crate::snapshot::{serialize, SnapshotBuilder};

/// One unit of background work: snapshot + serialize + terminal transition.
struct BackupTask {
    job_id: String,
    kind: BackupKind,
    actor: Actor,
    started: Instant,
}

/// Orchestrates backup jobs over a fixed worker pool.
pub struct BackupOrchestrator {
    store: JobStore,
    broadcaster: BackupProgressBroadcaster,
    task_sender: Sender<BackupTask>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl BackupOrchestrator {
    /// Creates the orchestrator and spawns its workers.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        store: JobStore,
        content: Arc<dyn ContentStore>,
        broadcaster: BackupProgressBroadcaster,
        worker_count: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (task_sender, task_receiver) = bounded::<BackupTask>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_store = store.clone();
            let worker_content = Arc::clone(&content);
            let worker_broadcaster = broadcaster.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    task_rx,
                    shutdown_flag,
                    worker_store,
                    worker_content,
                    worker_broadcaster,
                );
            });
            workers.push(handle);
        }

        info!("Started {} backup worker(s)", worker_count);

        Self {
            store,
            broadcaster,
            task_sender,
            workers,
            shutdown,
        }
    }

    /// Creates a job record and queues the snapshot work, returning the
    /// job id without waiting for the snapshot to finish.
    pub fn start_backup(
        &self,
        kind: BackupKind,
        label: Option<&str>,
        actor: &Actor,
    ) -> Result<String> {
        if !actor.can_start_backup() {
            return Err(AuthError::BackupForbidden {
                actor: actor.id.clone(),
            }
            .into());
        }

        let record = self.store.create(kind, label, actor)?;
        let task = BackupTask {
            job_id: record.id.clone(),
            kind,
            actor: actor.clone(),
            started: Instant::now(),
        };

        if let Err(e) = self.task_sender.send(task) {
            // Pool is gone; the record must not linger in progress.
            let message = format!("backup worker pool unavailable: {}", e);
            self.store.fail(&record.id, &message)?;
            return Err(SnapvaultError::Orchestrator(
                crate::error::OrchestratorError::WorkerPoolUnavailable(message),
            ));
        }

        Ok(record.id)
    }

    /// Subscribes to live progress events.
    pub fn broadcaster(&self) -> &BackupProgressBroadcaster {
        &self.broadcaster
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Signals workers to stop after their current task.
    pub fn shutdown(&self) {
        info!("Shutting down backup workers...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Waits for all workers to finish. Queued tasks are drained first.
    pub fn wait(self) {
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Backup worker {} panicked: {:?}", i, e);
            } else {
                debug!("Backup worker {} finished", i);
            }
        }

        info!("All backup workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<BackupTask>,
    shutdown: Arc<AtomicBool>,
    store: JobStore,
    content: Arc<dyn ContentStore>,
    broadcaster: BackupProgressBroadcaster,
) {
    debug!("Backup worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Backup worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(task) => {
                debug!("Backup worker {} running job {}", worker_id, task.job_id);
                execute_task(&store, content.as_ref(), &broadcaster, task);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Backup worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Backup worker {} stopped", worker_id);
}

/// Runs one backup to a terminal state. Every failure path ends in
/// `fail` plus an audit entry; nothing is rethrown.
fn execute_task(
    store: &JobStore,
    content: &dyn ContentStore,
    broadcaster: &BackupProgressBroadcaster,
    task: BackupTask,
) {
    let _span =
        tracing::info_span!("backup.job", job_id = %task.job_id, kind = %task.kind).entered();

    let tracker = broadcaster.start_job(&task.job_id, task.kind, store.clone());
    tracker.checkpoint(BackupStage::Dispatched, 10, "Backup dispatched");

    let outcome = SnapshotBuilder::new(content)
        .build(task.kind, &tracker)
        .and_then(|doc| {
            tracker.checkpoint(BackupStage::Serializing, 90, "Serializing snapshot");
            serialize(&doc)
        });

    match outcome {
        Ok(bytes) => {
            let size_bytes = bytes.len() as u64;
            if let Err(e) = store.complete(&task.job_id, &bytes, size_bytes) {
                error!("Failed to complete job {}: {}", task.job_id, e);
                return;
            }
            tracker.completed(size_bytes);

            let duration_ms = task.started.elapsed().as_millis();
            let entry = AuditEntry::new(
                &task.actor,
                "backup_completed",
                &task.job_id,
                &format!(
                    "{} backup completed in {} ms, {} bytes",
                    task.kind, duration_ms, size_bytes
                ),
            );
            if let Err(e) = content.append_audit_entry(entry) {
                error!("Failed to audit backup {}: {}", task.job_id, e);
            }
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(fail_err) = store.fail(&task.job_id, &message) {
                error!(
                    "Failed to record failure of job {}: {} (original error: {})",
                    task.job_id, fail_err, message
                );
            }
            tracker.failed(&message);

            let entry = AuditEntry::new(
                &task.actor,
                "backup_failed",
                &task.job_id,
                &format!("{} backup failed: {}", task.kind, message),
            );
            if let Err(audit_err) = content.append_audit_entry(entry) {
                error!("Failed to audit failed backup {}: {}", task.job_id, audit_err);
            }
        }
    }
}
