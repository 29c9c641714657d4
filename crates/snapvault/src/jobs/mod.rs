//! Job records and the typed job store.
//!
//! A [`JobRecord`] tracks one backup attempt through its state machine:
//! `InProgress` to `Completed` or `Failed`, terminal either way. The
//! [`JobStore`] owns every transition; nothing else writes job rows.

mod record;
mod store;

pub use record::{BackupKind, JobRecord, JobStatus};
pub use store::{JobListPage, JobQuery, JobStore};

pub(crate) use record::{format_timestamp, parse_timestamp};
