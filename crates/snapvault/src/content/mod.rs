//! Content store boundary.
//!
//! The subsystem never talks to the platform's tables directly; it reads
//! and replaces whole collections through the [`ContentStore`] trait. The
//! platform supplies the real implementation; [`MemoryContentStore`] is a
//! self-contained reference implementation used throughout the tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::Actor;

pub mod memory;

pub use memory::MemoryContentStore;

/// Every collection the platform exposes to the backup subsystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Posts,
    Categories,
    Tags,
    PostTags,
    Comments,
    Settings,
    Ads,
    Redirects,
    ActivityLog,
}

impl Collection {
    /// All collections, in the order they appear in a FULL snapshot.
    pub const ALL: [Collection; 9] = [
        Collection::Posts,
        Collection::Categories,
        Collection::Tags,
        Collection::PostTags,
        Collection::Comments,
        Collection::Settings,
        Collection::Ads,
        Collection::Redirects,
        Collection::ActivityLog,
    ];

    /// Stable wire name, also used as the key inside snapshot documents.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Categories => "categories",
            Collection::Tags => "tags",
            Collection::PostTags => "post_tags",
            Collection::Comments => "comments",
            Collection::Settings => "settings",
            Collection::Ads => "ads",
            Collection::Redirects => "redirects",
            Collection::ActivityLog => "activity_log",
        }
    }

    /// Parses a wire name back into a collection.
    pub fn from_name(name: &str) -> Option<Collection> {
        Collection::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors surfaced by a content store implementation.
#[derive(Error, Debug)]
pub enum ContentStoreError {
    #[error("Failed to read collection '{collection}': {reason}")]
    Read {
        collection: Collection,
        reason: String,
    },

    #[error("Failed to write collection '{collection}': {reason}")]
    Write {
        collection: Collection,
        reason: String,
    },

    #[error("Item '{item_id}' not found in '{collection}'")]
    ItemNotFound {
        collection: Collection,
        item_id: String,
    },
}

/// One row in the platform's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: &Actor, action: &str, resource: &str, details: &str) -> Self {
        Self {
            actor: actor.id.clone(),
            action: action.to_string(),
            resource: resource.to_string(),
            details: details.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Generic repository capability the platform provides.
///
/// `replace_collection` must be atomic per collection: either every row
/// is replaced or none are. Partial failures across *different*
/// collections are the caller's problem to report.
pub trait ContentStore: Send + Sync {
    /// Returns every record in the collection.
    fn list_collection(&self, collection: Collection) -> Result<Vec<Value>, ContentStoreError>;

    /// Replaces the collection's contents wholesale, returning the new
    /// record count. Replacement, not merge.
    fn replace_collection(
        &self,
        collection: Collection,
        records: Vec<Value>,
    ) -> Result<usize, ContentStoreError>;

    /// Appends an entry to the platform audit trail.
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<(), ContentStoreError>;

    /// Fetches a single item by id, for version restore.
    fn get_item(&self, collection: Collection, item_id: &str)
        -> Result<Value, ContentStoreError>;

    /// Writes the item's current state into its version history.
    fn put_item_version(
        &self,
        collection: Collection,
        item_id: &str,
        state: Value,
    ) -> Result<(), ContentStoreError>;

    /// Overwrites a single item.
    fn put_item(
        &self,
        collection: Collection,
        item_id: &str,
        state: Value,
    ) -> Result<(), ContentStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("nope"), None);
    }

    #[test]
    fn test_all_has_no_duplicates() {
        let mut names: Vec<&str> = Collection::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Collection::ALL.len());
    }
}
