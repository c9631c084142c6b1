//! Document store boundary
//!
//! The synchronization core only needs a handful of capabilities from the
//! backing database:
//!
//! | Capability | Method |
//! |------------|--------|
//! | per-document CRUD | [`DocumentStore::get`] / [`set`](DocumentStore::set) / [`update`](DocumentStore::update) / [`delete`](DocumentStore::delete) |
//! | store-generated ids | [`DocumentStore::add`] |
//! | ordered collection reads | [`DocumentStore::query`] |
//! | read-then-conditional-write | [`DocumentStore::compare_and_set`] |
//! | push change notifications | [`DocumentStore::watch`] |
//!
//! [`RedbStore`] is the embedded implementation shipped with the crate.

pub mod path;
pub mod storage;

pub use path::{CollectionPath, DocPath};
pub use storage::RedbStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::models::RoomId;
use shared::types::{IdAssignment, RoomEntity};
use thiserror::Error;
use tokio::sync::broadcast;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the same call may succeed if simply retried
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Bumped on every committed write, starts at 1
    pub version: u64,
    pub data: Value,
}

impl Document {
    /// Decode into a model, injecting the document id as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".into(), Value::from(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// How `set` treats fields absent from the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Top-level fields in the payload overwrite, others are preserved
    Merge,
    /// The payload becomes the whole document
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Order-by clause for collection queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Sort documents in place; ties fall back to the document id
    pub fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| {
            let ord = compare_values(a.data.get(&self.field), b.data.get(&self.field))
                .then_with(|| a.id.cmp(&b.id));
            match self.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
    }
}

/// Missing < null < bool < number < string; other kinds compare equal
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed { version: u64 },
    /// Someone else wrote first; `current` is the version found
    Conflict { current: Option<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Written,
    Deleted,
}

/// Emitted after every committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub collection: CollectionPath,
    pub doc_id: String,
    pub kind: ChangeKind,
}

/// Capabilities the core requires from the backing document database
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, doc: &DocPath) -> StoreResult<Option<Document>>;

    /// Create or overwrite; returns the new version
    async fn set(&self, doc: &DocPath, data: Map<String, Value>, mode: WriteMode)
    -> StoreResult<u64>;

    /// Merge into an existing document; `NotFound` if it is missing
    async fn update(&self, doc: &DocPath, fields: Map<String, Value>) -> StoreResult<u64>;

    /// Insert with a store-generated id
    async fn add(&self, collection: &CollectionPath, data: Map<String, Value>)
    -> StoreResult<String>;

    /// Remove a document; missing documents are not an error
    async fn delete(&self, doc: &DocPath) -> StoreResult<()>;

    async fn query(&self, collection: &CollectionPath, order: &OrderBy)
    -> StoreResult<Vec<Document>>;

    /// Write only if the document is still at `expected` (`None` = absent)
    async fn compare_and_set(
        &self,
        doc: &DocPath,
        expected: Option<u64>,
        data: Map<String, Value>,
        mode: WriteMode,
    ) -> StoreResult<CasOutcome>;

    /// Subscribe to change notices for every collection
    fn watch(&self) -> broadcast::Receiver<ChangeNotice>;
}

/// Write a document of `E` following its id strategy; returns the id
///
/// Client-assigned entities are merged under the given `id`. Store-assigned
/// entities are inserted and receive a generated id, so no `id` may be given.
pub async fn write_entity<E: RoomEntity>(
    store: &dyn DocumentStore,
    room: &RoomId,
    id: Option<&str>,
    data: Map<String, Value>,
) -> StoreResult<String> {
    let collection = CollectionPath::new(room, E::COLLECTION);
    match (E::ID_ASSIGNMENT, id) {
        (IdAssignment::Client, Some(id)) => {
            store.set(&collection.doc(id)?, data, WriteMode::Merge).await?;
            Ok(id.to_string())
        }
        (IdAssignment::Store, None) => store.add(&collection, data).await,
        (IdAssignment::Client, None) => Err(StoreError::InvalidPath(format!(
            "{} documents need a client-generated id",
            collection
        ))),
        (IdAssignment::Store, Some(id)) => Err(StoreError::InvalidPath(format!(
            "{}{}: ids in this collection are assigned by the store",
            collection.prefix(),
            id
        ))),
    }
}

/// Apply a write to the current body
pub(crate) fn apply_write(current: Option<Value>, data: Map<String, Value>, mode: WriteMode) -> Value {
    match (mode, current) {
        (WriteMode::Merge, Some(Value::Object(mut existing))) => {
            for (k, v) in data {
                existing.insert(k, v);
            }
            Value::Object(existing)
        }
        _ => Value::Object(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            version: 1,
            data,
        }
    }

    #[test]
    fn test_order_by_desc_strings() {
        let mut docs = vec![
            doc("a", json!({"updatedAt": "2026-01-01T00:00:00.000Z"})),
            doc("b", json!({"updatedAt": "2026-03-01T00:00:00.000Z"})),
            doc("c", json!({})),
        ];
        OrderBy::desc("updatedAt").sort(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn test_order_by_ties_use_id() {
        let mut docs = vec![doc("b", json!({"n": 1})), doc("a", json!({"n": 1}))];
        OrderBy::asc("n").sort(&mut docs);
        assert_eq!(docs[0].id, "a");
    }

    #[test]
    fn test_apply_write_merge_preserves() {
        let current = json!({"name": "Tea", "price": 300});
        let mut data = Map::new();
        data.insert("price".into(), json!(350));
        let merged = apply_write(Some(current.clone()), data.clone(), WriteMode::Merge);
        assert_eq!(merged, json!({"name": "Tea", "price": 350}));
        let replaced = apply_write(Some(current), data, WriteMode::Replace);
        assert_eq!(replaced, json!({"price": 350}));
    }

    #[tokio::test]
    async fn test_write_entity_follows_id_strategy() {
        use shared::models::{Order, Recipe};

        let store = RedbStore::in_memory().unwrap();
        let room = RoomId::default();
        let body = |name: &str| match json!({ "name": name }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let id = write_entity::<Recipe>(&store, &room, Some("r_1"), body("Tea"))
            .await
            .unwrap();
        assert_eq!(id, "r_1");
        let recipes = CollectionPath::new(&room, Recipe::COLLECTION);
        assert!(store.get(&recipes.doc("r_1").unwrap()).await.unwrap().is_some());

        let generated = write_entity::<Order>(&store, &room, None, body("A-001"))
            .await
            .unwrap();
        assert_eq!(generated.len(), 20);

        let err = write_entity::<Recipe>(&store, &room, None, body("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        let err = write_entity::<Order>(&store, &room, Some("mine"), body("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        let orders = CollectionPath::new(&room, Order::COLLECTION);
        assert!(store.get(&orders.doc("mine").unwrap()).await.unwrap().is_none());
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }
        let d = doc("xyz", json!({"name": "Tea"}));
        let named: Named = d.decode().unwrap();
        assert_eq!(named.id, "xyz");
        assert_eq!(named.name, "Tea");
    }
}
