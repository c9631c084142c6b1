//! Common types for the shared crate

use serde::{Deserialize, Serialize};

/// ISO-8601 timestamp string as persisted in documents
pub type IsoTimestamp = String;

/// Who assigns the id of a new document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdAssignment {
    /// Generated on the device before the first write (offline-first entities)
    Client,
    /// Generated by the store on insert (uniqueness guaranteed by the backend)
    Store,
}

/// A document kind living in a room-scoped collection
pub trait RoomEntity {
    /// Collection name under `rooms/{room}/`
    const COLLECTION: &'static str;
    /// Id strategy for new documents
    const ID_ASSIGNMENT: IdAssignment;
    /// Field the realtime feed sorts by (descending)
    const ORDER_FIELD: &'static str;
}
