//! Backup and restore orchestration.

mod backup;
mod restore;

pub use backup::BackupOrchestrator;
pub use restore::{RestoreOrchestrator, RestoreStats};
