//! Point-in-time snapshots of the content store.
//!
//! A snapshot is built in memory as a [`SnapshotDocument`], then frozen
//! to bytes by the serializer. Which collections a document carries is a
//! pure function of the backup kind, so restore can trust the payload's
//! own key set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::Collection;
use crate::jobs::BackupKind;
use crate::wire::u64_string;

mod builder;
mod serializer;

pub use builder::{NoopProgress, ProgressSink, SnapshotBuilder};
pub use serializer::{deserialize, serialize, FORMAT_VERSION};

/// Collections included in a backup of the given kind, fetch order.
pub fn collections_for(kind: BackupKind) -> &'static [Collection] {
    match kind {
        BackupKind::Full => &Collection::ALL,
        BackupKind::ContentOnly => &[
            Collection::Posts,
            Collection::Categories,
            Collection::Tags,
            Collection::PostTags,
        ],
        BackupKind::SettingsOnly => &[
            Collection::Settings,
            Collection::Comments,
            Collection::ActivityLog,
        ],
    }
}

/// Splits a kind's collections into the primary group (the platform's
/// main content) and everything else, for coarse progress reporting.
pub(crate) fn collection_groups(kind: BackupKind) -> (&'static [Collection], &'static [Collection]) {
    match kind {
        BackupKind::Full => (
            &[
                Collection::Posts,
                Collection::Categories,
                Collection::Tags,
                Collection::PostTags,
            ],
            &[
                Collection::Comments,
                Collection::Settings,
                Collection::Ads,
                Collection::Redirects,
                Collection::ActivityLog,
            ],
        ),
        BackupKind::ContentOnly => (
            &[Collection::Posts],
            &[
                Collection::Categories,
                Collection::Tags,
                Collection::PostTags,
            ],
        ),
        BackupKind::SettingsOnly => (
            &[Collection::Settings],
            &[Collection::Comments, Collection::ActivityLog],
        ),
    }
}

/// Aggregate counters over a snapshot. Counts cross the wire as strings
/// for the same precision reason as job sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    #[serde(with = "u64_string")]
    pub total_records: u64,
}

/// In-memory snapshot of the content store at one point in time.
///
/// `BTreeMap` keeps collection order deterministic so serializing the
/// same document twice yields identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub format_version: u32,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub stats: SnapshotStats,
    pub collections: BTreeMap<String, Vec<Value>>,
}

impl SnapshotDocument {
    /// Records in one named collection, empty if absent.
    pub fn records(&self, collection: Collection) -> &[Value] {
        self.collections
            .get(collection.name())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_covers_every_collection() {
        assert_eq!(collections_for(BackupKind::Full).len(), Collection::ALL.len());
    }

    #[test]
    fn test_content_only_is_articles_and_relations() {
        let collections = collections_for(BackupKind::ContentOnly);
        assert!(collections.contains(&Collection::Posts));
        assert!(collections.contains(&Collection::PostTags));
        assert!(!collections.contains(&Collection::Settings));
        assert!(!collections.contains(&Collection::Ads));
    }

    #[test]
    fn test_settings_only_excludes_content() {
        let collections = collections_for(BackupKind::SettingsOnly);
        assert!(collections.contains(&Collection::Settings));
        assert!(collections.contains(&Collection::ActivityLog));
        assert!(!collections.contains(&Collection::Posts));
    }

    #[test]
    fn test_groups_partition_the_kind_set() {
        for kind in [
            BackupKind::Full,
            BackupKind::ContentOnly,
            BackupKind::SettingsOnly,
        ] {
            let (primary, secondary) = collection_groups(kind);
            let mut combined: Vec<Collection> =
                primary.iter().chain(secondary.iter()).copied().collect();
            let mut expected: Vec<Collection> = collections_for(kind).to_vec();
            combined.sort();
            expected.sort();
            assert_eq!(combined, expected, "kind {:?}", kind);
        }
    }
}
