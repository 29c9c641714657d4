//! Live event fan-out for backup jobs.

mod backup_progress;

pub use backup_progress::{
    BackupProgressBroadcaster, BackupProgressEvent, BackupStage, ProgressTracker,
};
