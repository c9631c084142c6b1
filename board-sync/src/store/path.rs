//! Hierarchical document paths
//!
//! ```text
//! rooms/{room}/recipes/{id}
//! rooms/{room}/orders/{id}
//! rooms/{room}/meta/orderSeq
//! ```

use std::fmt;

use shared::models::{COUNTER_DOC, RoomId};

use super::{StoreError, StoreResult};

const ROOMS: &str = "rooms";
const META: &str = "meta";

/// A room-scoped collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    room: RoomId,
    name: String,
}

impl CollectionPath {
    pub fn new(room: &RoomId, name: impl Into<String>) -> Self {
        Self {
            room: room.clone(),
            name: name.into(),
        }
    }

    /// `rooms/{room}/meta`
    pub fn meta(room: &RoomId) -> Self {
        Self::new(room, META)
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key prefix shared by every document of the collection (ends with `/`)
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}/", ROOMS, self.room, self.name)
    }

    /// Path of a document in this collection
    pub fn doc(&self, id: &str) -> StoreResult<DocPath> {
        DocPath::new(self.clone(), id)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", ROOMS, self.room, self.name)
    }
}

/// A single document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    /// Build a document path; the id must be a single non-empty segment
    pub fn new(collection: CollectionPath, id: &str) -> StoreResult<Self> {
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::InvalidPath(format!("{}/{}", collection, id)));
        }
        Ok(Self {
            collection,
            id: id.to_string(),
        })
    }

    /// `rooms/{room}/meta/orderSeq`
    pub fn sequence_counter(room: &RoomId) -> Self {
        Self {
            collection: CollectionPath::meta(room),
            id: COUNTER_DOC.to_string(),
        }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage key
    pub fn key(&self) -> String {
        format!("{}{}", self.collection.prefix(), self.id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
