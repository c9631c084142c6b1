//! redb-backed document store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `documents` | `rooms/{room}/{collection}/{id}` | JSON `{version, data}` | Every document of every room |
//!
//! Keys sort lexicographically, so a collection query is a prefix range scan.
//! All redb calls run on the blocking pool; write transactions are serialized
//! by redb, which is what makes `compare_and_set` atomic.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::{
    CasOutcome, ChangeKind, ChangeNotice, CollectionPath, DocPath, Document, DocumentStore,
    OrderBy, StoreError, StoreResult, WriteMode, apply_write,
};

/// Table for documents: key = full document path, value = JSON-serialized StoredDoc
const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Length of store-generated document ids
const GENERATED_ID_LEN: usize = 20;

/// Default change notice buffer
pub const DEFAULT_NOTICE_CAPACITY: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
struct StoredDoc {
    version: u64,
    data: Value,
}

/// Precondition checked inside the write transaction
#[derive(Debug, Clone, Copy)]
enum Expect {
    Any,
    Exists,
    Version(Option<u64>),
}

/// Document store backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    notices: broadcast::Sender<ChangeNotice>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("watchers", &self.notices.receiver_count())
            .finish()
    }
}

impl RedbStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate`: a write is on disk once the
    /// call returns, which is what the board relies on after a power cut.
    pub fn open(path: impl AsRef<Path>, notice_capacity: usize) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db, notice_capacity)
    }

    /// Open an in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, DEFAULT_NOTICE_CAPACITY)
    }

    fn init(db: Database, notice_capacity: usize) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
        }
        write_txn.commit()?;

        let (notices, _) = broadcast::channel(notice_capacity.max(1));
        Ok(Self {
            db: Arc::new(db),
            notices,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    fn notify(&self, collection: &CollectionPath, doc_id: &str, kind: ChangeKind) {
        // 没有订阅者时 send 会返回错误，忽略即可
        let _ = self.notices.send(ChangeNotice {
            collection: collection.clone(),
            doc_id: doc_id.to_string(),
            kind,
        });
    }

    async fn write(
        &self,
        doc: &DocPath,
        expect: Expect,
        data: Map<String, Value>,
        mode: WriteMode,
    ) -> StoreResult<CasOutcome> {
        let key = doc.key();
        let outcome = self
            .blocking(move |db| write_blocking(db, &key, expect, data, mode))
            .await?;
        if matches!(outcome, CasOutcome::Committed { .. }) {
            self.notify(doc.collection(), doc.id(), ChangeKind::Written);
        }
        Ok(outcome)
    }
}

fn decode_stored(bytes: &[u8]) -> StoreResult<StoredDoc> {
    Ok(serde_json::from_slice(bytes)?)
}

fn write_blocking(
    db: &Database,
    key: &str,
    expect: Expect,
    data: Map<String, Value>,
    mode: WriteMode,
) -> StoreResult<CasOutcome> {
    let txn = db.begin_write()?;
    let outcome = {
        let mut table = txn.open_table(DOCUMENTS_TABLE)?;
        let current = match table.get(key)? {
            Some(guard) => Some(decode_stored(guard.value())?),
            None => None,
        };
        let current_version = current.as_ref().map(|d| d.version);

        match expect {
            Expect::Exists if current.is_none() => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Expect::Version(expected) if expected != current_version => {
                return Ok(CasOutcome::Conflict {
                    current: current_version,
                });
            }
            _ => {}
        }

        let version = current_version.unwrap_or(0) + 1;
        let stored = StoredDoc {
            version,
            data: apply_write(current.map(|d| d.data), data, mode),
        };
        let bytes = serde_json::to_vec(&stored)?;
        table.insert(key, bytes.as_slice())?;
        CasOutcome::Committed { version }
    };
    txn.commit()?;
    Ok(outcome)
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl DocumentStore for RedbStore {
    async fn get(&self, doc: &DocPath) -> StoreResult<Option<Document>> {
        let key = doc.key();
        let id = doc.id().to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(DOCUMENTS_TABLE)?;
            match table.get(key.as_str())? {
                Some(value) => {
                    let stored = decode_stored(value.value())?;
                    Ok(Some(Document {
                        id,
                        version: stored.version,
                        data: stored.data,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn set(
        &self,
        doc: &DocPath,
        data: Map<String, Value>,
        mode: WriteMode,
    ) -> StoreResult<u64> {
        match self.write(doc, Expect::Any, data, mode).await? {
            CasOutcome::Committed { version } => Ok(version),
            CasOutcome::Conflict { .. } => Err(StoreError::Unavailable(format!(
                "unconditional write to {} reported a conflict",
                doc
            ))),
        }
    }

    async fn update(&self, doc: &DocPath, fields: Map<String, Value>) -> StoreResult<u64> {
        match self.write(doc, Expect::Exists, fields, WriteMode::Merge).await? {
            CasOutcome::Committed { version } => Ok(version),
            CasOutcome::Conflict { .. } => Err(StoreError::Unavailable(format!(
                "unconditional update of {} reported a conflict",
                doc
            ))),
        }
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> StoreResult<String> {
        let prefix = collection.prefix();
        let id = self
            .blocking(move |db| {
                let txn = db.begin_write()?;
                let id = {
                    let mut table = txn.open_table(DOCUMENTS_TABLE)?;
                    let (id, key) = loop {
                        let id = generate_id();
                        let key = format!("{}{}", prefix, id);
                        if table.get(key.as_str())?.is_none() {
                            break (id, key);
                        }
                    };
                    let stored = StoredDoc {
                        version: 1,
                        data: Value::Object(data),
                    };
                    let bytes = serde_json::to_vec(&stored)?;
                    table.insert(key.as_str(), bytes.as_slice())?;
                    id
                };
                txn.commit()?;
                Ok(id)
            })
            .await?;
        self.notify(collection, &id, ChangeKind::Written);
        Ok(id)
    }

    async fn delete(&self, doc: &DocPath) -> StoreResult<()> {
        let key = doc.key();
        let removed = self
            .blocking(move |db| {
                let txn = db.begin_write()?;
                let removed = {
                    let mut table = txn.open_table(DOCUMENTS_TABLE)?;
                    table.remove(key.as_str())?.is_some()
                };
                txn.commit()?;
                Ok(removed)
            })
            .await?;
        if removed {
            self.notify(doc.collection(), doc.id(), ChangeKind::Deleted);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        order: &OrderBy,
    ) -> StoreResult<Vec<Document>> {
        let prefix = collection.prefix();
        let mut docs = self
            .blocking(move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(DOCUMENTS_TABLE)?;

                let mut docs = Vec::new();
                for result in table.range(prefix.as_str()..)? {
                    let (key, value) = result?;
                    let Some(id) = key.value().strip_prefix(prefix.as_str()) else {
                        break;
                    };
                    if id.contains('/') {
                        continue;
                    }
                    let stored = decode_stored(value.value())?;
                    docs.push(Document {
                        id: id.to_string(),
                        version: stored.version,
                        data: stored.data,
                    });
                }
                Ok(docs)
            })
            .await?;
        order.sort(&mut docs);
        Ok(docs)
    }

    async fn compare_and_set(
        &self,
        doc: &DocPath,
        expected: Option<u64>,
        data: Map<String, Value>,
        mode: WriteMode,
    ) -> StoreResult<CasOutcome> {
        self.write(doc, Expect::Version(expected), data, mode).await
    }

    fn watch(&self) -> broadcast::Receiver<ChangeNotice> {
        self.notices.subscribe()
    }
}
