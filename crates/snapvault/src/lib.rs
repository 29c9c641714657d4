pub mod api;
pub mod auth;
pub mod broadcast;
pub mod content;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod scheduler;
pub mod snapshot;
pub mod wire;

pub use api::{BackupService, BackupServiceConfig, RestoreRequest, StartBackupRequest};
pub use auth::{Actor, Role};
pub use broadcast::{BackupProgressBroadcaster, BackupProgressEvent, BackupStage};
pub use content::{Collection, ContentStore, ContentStoreError, MemoryContentStore};
pub use db::Database;
pub use error::{
    AuthError, RestoreError, Result, SnapshotError, SnapvaultError, ValidationError,
};
pub use jobs::{BackupKind, JobQuery, JobRecord, JobStatus, JobStore};
pub use orchestrator::{BackupOrchestrator, RestoreOrchestrator, RestoreStats};
pub use scheduler::{AutoBackupFrequency, BackupScheduler, TickOutcome};
pub use snapshot::{SnapshotBuilder, SnapshotDocument};
