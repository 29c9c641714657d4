//! Snapshot serialization.
//!
//! JSON with sorted object keys (serde_json's default map), so the same
//! document always freezes to the same bytes and a deserialize/serialize
//! round trip is byte-identical. Counter fields ride as decimal strings;
//! see [`crate::wire::u64_string`].

use crate::error::SnapshotError;
use crate::snapshot::SnapshotDocument;

/// Version tag written into every snapshot payload.
pub const FORMAT_VERSION: u32 = 1;

/// Freezes a document to its durable byte representation.
pub fn serialize(doc: &SnapshotDocument) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec(doc).map_err(SnapshotError::Serialize)
}

/// Parses a stored payload back into a document, rejecting payloads from
/// a format this build does not understand.
pub fn deserialize(bytes: &[u8]) -> Result<SnapshotDocument, SnapshotError> {
    let doc: SnapshotDocument =
        serde_json::from_slice(bytes).map_err(SnapshotError::Deserialize)?;
    if doc.format_version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedFormat(doc.format_version));
    }
    Ok(doc)
}
