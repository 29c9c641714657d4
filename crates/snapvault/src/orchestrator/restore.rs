//! Restore orchestrator.
//!
//! Restores replace live collections with a completed snapshot's
//! contents. The operation is destructive, so it is gated behind an
//! explicit confirmation flag and elevated privilege, and it always
//! captures the current state before overwriting: a rollback snapshot
//! for full restores, a version-history entry for single items. Both
//! paths go through the same capture-then-apply helper so the safety
//! invariant cannot drift between them.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::auth::Actor;
use crate::content::{AuditEntry, Collection, ContentStore, ContentStoreError};
use crate::error::{AuthError, RestoreError, Result, SnapvaultError, ValidationError};
use crate::jobs::{BackupKind, JobStatus, JobStore};
use crate::snapshot::{deserialize, serialize, NoopProgress, SnapshotBuilder};

/// Outcome of a successful restore.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStats {
    /// The job whose snapshot was restored.
    pub job_id: String,
    /// Records written per collection.
    pub collections: BTreeMap<String, usize>,
    /// Sum over all collections.
    pub total_records: usize,
    /// Completed job holding the pre-restore state, for undo.
    pub rollback_job_id: String,
    pub duration_ms: u64,
}

/// Orchestrates full-snapshot restores and single-item version restores.
pub struct RestoreOrchestrator {
    store: JobStore,
    content: Arc<dyn ContentStore>,
    /// Job ids with a restore currently running.
    active: Mutex<HashSet<String>>,
}

impl RestoreOrchestrator {
    pub fn new(store: JobStore, content: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            content,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Restores a completed backup into the live content store.
    ///
    /// Collections already written before a partial failure stay
    /// restored; the error names the collection that failed so an
    /// operator can re-run or reconcile precisely.
    pub fn restore(&self, job_id: &str, actor: &Actor, confirm: bool) -> Result<RestoreStats> {
        if !actor.can_restore() {
            return Err(AuthError::RestoreForbidden {
                actor: actor.id.clone(),
            }
            .into());
        }
        if !confirm {
            return Err(ValidationError::ConfirmationRequired.into());
        }

        let record = self
            .store
            .get(job_id)?
            .ok_or_else(|| ValidationError::JobNotFound(job_id.to_string()))?;
        if record.status != JobStatus::Completed {
            return Err(ValidationError::JobNotRestorable {
                id: job_id.to_string(),
                status: record.status.to_string(),
            }
            .into());
        }

        let _guard = self.acquire(job_id)?;

        let payload = self
            .store
            .get_content(job_id)?
            .ok_or_else(|| ValidationError::JobNotFound(job_id.to_string()))?;
        let doc = deserialize(&payload)?;

        let started = Instant::now();

        // Capture: freeze the current live state into its own completed
        // job record, so this restore can itself be undone.
        let (rollback_job_id, collections) = self.snapshot_then_apply(
            || self.capture_rollback(record.kind, job_id, actor),
            |_rollback_job_id| {
                let mut collections: BTreeMap<String, usize> = BTreeMap::new();
                for (name, records) in &doc.collections {
                    let collection = Collection::from_name(name).ok_or_else(|| {
                        SnapvaultError::Restore(RestoreError::UnknownCollection(
                            name.clone(),
                        ))
                    })?;

                    let count = self
                        .content
                        .replace_collection(collection, records.clone())
                        .map_err(|e| {
                            self.audit_failure(actor, job_id, collection, &e.to_string());
                            SnapvaultError::Restore(RestoreError::CollectionWrite {
                                collection,
                                reason: e.to_string(),
                            })
                        })?;
                    log::info!("Restored {} record(s) into {}", count, collection);
                    collections.insert(name.clone(), count);
                }
                Ok(collections)
            },
        )?;

        let total_records: usize = collections.values().sum();
        let duration_ms = started.elapsed().as_millis() as u64;

        let details = format!(
            "restored {} collection(s), {} record(s), in {} ms; rollback snapshot {}",
            collections.len(),
            total_records,
            duration_ms,
            rollback_job_id
        );
        self.audit(actor, "restore_completed", job_id, &details);

        Ok(RestoreStats {
            job_id: job_id.to_string(),
            collections,
            total_records,
            rollback_job_id,
            duration_ms,
        })
    }

    /// Reverts a single item to a prior state.
    ///
    /// The item's current state goes into its version history first, so
    /// restoring an old version never destroys the ability to undo the
    /// restore.
    pub fn restore_version(
        &self,
        collection: Collection,
        item_id: &str,
        target: Value,
        actor: &Actor,
    ) -> Result<()> {
        // Reverting one item needs edit-level privilege, not the full
        // restore privilege.
        if !actor.can_start_backup() {
            return Err(AuthError::VersionRestoreForbidden {
                actor: actor.id.clone(),
            }
            .into());
        }

        let ((), ()) = self.snapshot_then_apply(
            || {
                let current = self.content.get_item(collection, item_id).map_err(|e| {
                    SnapvaultError::Restore(match e {
                        ContentStoreError::ItemNotFound { .. } => {
                            RestoreError::ItemNotFound {
                                collection,
                                item_id: item_id.to_string(),
                            }
                        }
                        other => RestoreError::VersionSnapshot {
                            item_id: item_id.to_string(),
                            reason: other.to_string(),
                        },
                    })
                })?;
                self.content
                    .put_item_version(collection, item_id, current)
                    .map_err(|e| {
                        SnapvaultError::Restore(RestoreError::VersionSnapshot {
                            item_id: item_id.to_string(),
                            reason: e.to_string(),
                        })
                    })
            },
            |_| {
                self.content
                    .put_item(collection, item_id, target.clone())
                    .map_err(|e| {
                        self.audit_failure(actor, item_id, collection, &e.to_string());
                        SnapvaultError::Restore(RestoreError::CollectionWrite {
                            collection,
                            reason: e.to_string(),
                        })
                    })
            },
        )?;

        self.audit(
            actor,
            "version_restored",
            item_id,
            &format!("item in {} reverted to prior version", collection),
        );
        Ok(())
    }

    /// The shared two-step safety pattern: capture current state, then
    /// apply the target state. The apply step only runs once the capture
    /// has durably succeeded.
    fn snapshot_then_apply<C, A, T, U>(&self, capture: C, apply: A) -> Result<(T, U)>
    where
        C: FnOnce() -> Result<T>,
        A: FnOnce(&T) -> Result<U>,
    {
        let captured = capture()?;
        let applied = apply(&captured)?;
        Ok((captured, applied))
    }

    /// Builds and completes a rollback snapshot of the current live
    /// state, returning its job id.
    fn capture_rollback(&self, kind: BackupKind, job_id: &str, actor: &Actor) -> Result<String> {
        let label = format!("Pre-restore snapshot (before restoring {})", job_id);
        let rollback = self.store.create(kind, Some(&label), actor)?;

        let built = SnapshotBuilder::new(self.content.as_ref())
            .build(kind, &NoopProgress)
            .and_then(|doc| serialize(&doc));

        match built {
            Ok(bytes) => {
                self.store
                    .complete(&rollback.id, &bytes, bytes.len() as u64)?;
                Ok(rollback.id)
            }
            Err(e) => {
                // The restore aborts before any live write happens.
                self.store.fail(&rollback.id, &e.to_string())?;
                self.audit(
                    actor,
                    "restore_aborted",
                    job_id,
                    &format!("pre-restore snapshot failed: {}", e),
                );
                Err(SnapvaultError::Snapshot(e))
            }
        }
    }

    /// Marks a job id as having a restore in flight. Two restores of the
    /// same job cannot overlap; overlapping restores of different jobs
    /// are allowed but almost certainly a mistake, so they are logged.
    fn acquire(&self, job_id: &str) -> Result<RestoreGuard<'_>> {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Restore lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if active.contains(job_id) {
            return Err(SnapvaultError::Restore(
                RestoreError::AlreadyRunning(job_id.to_string()),
            ));
        }
        if !active.is_empty() {
            log::warn!(
                "Restore of job {} starting while {} other restore(s) run against the same \
                 content store",
                job_id,
                active.len()
            );
        }
        active.insert(job_id.to_string());
        Ok(RestoreGuard {
            orchestrator: self,
            job_id: job_id.to_string(),
        })
    }

    fn release(&self, job_id: &str) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(job_id);
    }

    fn audit(&self, actor: &Actor, action: &str, resource: &str, details: &str) {
        let entry = AuditEntry::new(actor, action, resource, details);
        if let Err(e) = self.content.append_audit_entry(entry) {
            log::error!("Failed to write audit entry '{}': {}", action, e);
        }
    }

    fn audit_failure(&self, actor: &Actor, resource: &str, collection: Collection, reason: &str) {
        self.audit(
            actor,
            "restore_failed",
            resource,
            &format!("collection '{}' failed: {}", collection, reason),
        );
    }
}

/// Releases the per-job restore slot on drop.
struct RestoreGuard<'a> {
    orchestrator: &'a RestoreOrchestrator,
    job_id: String,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.release(&self.job_id);
    }
}
