//! In-memory content store.
//!
//! Reference implementation of [`ContentStore`] backed by `RwLock`'d
//! maps. Collections can be primed with records and individual
//! collections can be switched to fail, which is how the tests simulate
//! content-store outages.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use serde_json::{json, Value};

use super::{AuditEntry, Collection, ContentStore, ContentStoreError};

/// Thread-safe in-memory implementation of [`ContentStore`].
#[derive(Default)]
pub struct MemoryContentStore {
    collections: RwLock<BTreeMap<Collection, Vec<Value>>>,
    /// Version history per (collection, item id).
    versions: RwLock<BTreeMap<(Collection, String), Vec<Value>>>,
    /// Collections that fail on read.
    fail_reads: RwLock<HashSet<Collection>>,
    /// Collections that fail on write.
    fail_writes: RwLock<HashSet<Collection>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection with records, replacing anything present.
    pub fn seed(&self, collection: Collection, records: Vec<Value>) {
        if let Ok(mut map) = self.collections.write() {
            map.insert(collection, records);
        }
    }

    /// Makes reads of the given collection fail until cleared.
    pub fn fail_reads_of(&self, collection: Collection) {
        if let Ok(mut set) = self.fail_reads.write() {
            set.insert(collection);
        }
    }

    /// Makes writes of the given collection fail until cleared.
    pub fn fail_writes_of(&self, collection: Collection) {
        if let Ok(mut set) = self.fail_writes.write() {
            set.insert(collection);
        }
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut set) = self.fail_reads.write() {
            set.clear();
        }
        if let Ok(mut set) = self.fail_writes.write() {
            set.clear();
        }
    }

    /// Returns the current record count of a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .map(|map| map.get(&collection).map(|v| v.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Returns the recorded version history of an item.
    pub fn versions_of(&self, collection: Collection, item_id: &str) -> Vec<Value> {
        self.versions
            .read()
            .map(|map| {
                map.get(&(collection, item_id.to_string()))
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn read_should_fail(&self, collection: Collection) -> bool {
        self.fail_reads
            .read()
            .map(|set| set.contains(&collection))
            .unwrap_or(false)
    }

    fn write_should_fail(&self, collection: Collection) -> bool {
        self.fail_writes
            .read()
            .map(|set| set.contains(&collection))
            .unwrap_or(false)
    }

    fn item_id(record: &Value) -> Option<String> {
        record
            .get("id")
            .and_then(|v| v.as_str().map(|s| s.to_string()).or_else(|| v.as_u64().map(|n| n.to_string())))
    }
}

impl ContentStore for MemoryContentStore {
    fn list_collection(&self, collection: Collection) -> Result<Vec<Value>, ContentStoreError> {
        if self.read_should_fail(collection) {
            return Err(ContentStoreError::Read {
                collection,
                reason: "simulated read failure".to_string(),
            });
        }
        Ok(self
            .collections
            .read()
            .map(|map| map.get(&collection).cloned().unwrap_or_default())
            .unwrap_or_default())
    }

    fn replace_collection(
        &self,
        collection: Collection,
        records: Vec<Value>,
    ) -> Result<usize, ContentStoreError> {
        if self.write_should_fail(collection) {
            return Err(ContentStoreError::Write {
                collection,
                reason: "simulated write failure".to_string(),
            });
        }
        let count = records.len();
        if let Ok(mut map) = self.collections.write() {
            map.insert(collection, records);
        }
        Ok(count)
    }

    fn append_audit_entry(&self, entry: AuditEntry) -> Result<(), ContentStoreError> {
        let record = json!({
            "actor": entry.actor,
            "action": entry.action,
            "resource": entry.resource,
            "details": entry.details,
            "timestamp": entry.timestamp.to_rfc3339(),
        });
        if let Ok(mut map) = self.collections.write() {
            map.entry(Collection::ActivityLog).or_default().push(record);
        }
        Ok(())
    }

    fn get_item(
        &self,
        collection: Collection,
        item_id: &str,
    ) -> Result<Value, ContentStoreError> {
        let records = self.list_collection(collection)?;
        records
            .into_iter()
            .find(|r| Self::item_id(r).as_deref() == Some(item_id))
            .ok_or_else(|| ContentStoreError::ItemNotFound {
                collection,
                item_id: item_id.to_string(),
            })
    }

    fn put_item_version(
        &self,
        collection: Collection,
        item_id: &str,
        state: Value,
    ) -> Result<(), ContentStoreError> {
        if self.write_should_fail(collection) {
            return Err(ContentStoreError::Write {
                collection,
                reason: "simulated write failure".to_string(),
            });
        }
        if let Ok(mut map) = self.versions.write() {
            map.entry((collection, item_id.to_string()))
                .or_default()
                .push(state);
        }
        Ok(())
    }

    fn put_item(
        &self,
        collection: Collection,
        item_id: &str,
        state: Value,
    ) -> Result<(), ContentStoreError> {
        if self.write_should_fail(collection) {
            return Err(ContentStoreError::Write {
                collection,
                reason: "simulated write failure".to_string(),
            });
        }
        let mut map = match self.collections.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        let records = map.entry(collection).or_default();
        match records
            .iter_mut()
            .find(|r| Self::item_id(r).as_deref() == Some(item_id))
        {
            Some(slot) => {
                *slot = state;
                Ok(())
            }
            None => Err(ContentStoreError::ItemNotFound {
                collection,
                item_id: item_id.to_string(),
            }),
        }
    }
}
