use thiserror::Error;

use crate::content::Collection;

#[derive(Error, Debug)]
pub enum SnapvaultError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Restore error: {0}")]
    Restore(#[from] RestoreError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unknown backup kind: '{0}'")]
    UnknownKind(String),

    #[error("Restore requires explicit confirmation")]
    ConfirmationRequired,

    #[error("No job record with id '{0}'")]
    JobNotFound(String),

    #[error("Job '{id}' has status '{status}' and cannot be restored")]
    JobNotRestorable { id: String, status: String },

    #[error("Invalid scheduler secret")]
    BadSchedulerSecret,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Actor '{actor}' is not allowed to start backups")]
    BackupForbidden { actor: String },

    #[error("Actor '{actor}' is not allowed to restore backups")]
    RestoreForbidden { actor: String },

    #[error("Actor '{actor}' is not allowed to revert item versions")]
    VersionRestoreForbidden { actor: String },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read collection '{collection}': {reason}")]
    CollectionRead {
        collection: Collection,
        reason: String,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to deserialize snapshot: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("Unsupported snapshot format version {0}")]
    UnsupportedFormat(u32),
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Failed to restore collection '{collection}': {reason}")]
    CollectionWrite {
        collection: Collection,
        reason: String,
    },

    #[error("A restore of job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Snapshot names unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("Item '{item_id}' not found in collection '{collection}'")]
    ItemNotFound {
        collection: Collection,
        item_id: String,
    },

    #[error("Failed to snapshot current state of '{item_id}' before restore: {reason}")]
    VersionSnapshot { item_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Backup worker pool is unavailable: {0}")]
    WorkerPoolUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SnapvaultError>;
