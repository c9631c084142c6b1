//! ChangeFeed - 集合级实时快照订阅
//!
//! Every subscription runs one background task:
//!
//! 1. register for store change notices (before the first read, so nothing
//!    committed in between is missed)
//! 2. read the whole collection, deliver it
//! 3. on every notice for the collection, read again and deliver again
//!
//! A lagged notice channel just means "something changed", so it triggers
//! the same full re-read. Query failures retry with [`FeedConfig`] and then
//! wait for the next notice.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::store::{CollectionPath, Document, DocumentStore, OrderBy, StoreError};

/// Retry settings for snapshot queries
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Retries after the first failed query
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(200),
        }
    }
}

type Snapshot<T> = Option<Arc<Vec<T>>>;

/// Handle of a live subscription
///
/// Owns the last delivered snapshot. Dropping the handle cancels the feed.
pub struct Subscription<T> {
    collection: CollectionPath,
    snapshot: watch::Receiver<Snapshot<T>>,
    token: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Last delivered snapshot (`None` until the first read completes)
    pub fn snapshot(&self) -> Option<Arc<Vec<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next delivery; `None` once the feed has stopped
    pub async fn changed(&mut self) -> Option<Arc<Vec<T>>> {
        self.snapshot.changed().await.ok()?;
        self.snapshot.borrow_and_update().clone()
    }

    /// Wait until a delivered snapshot satisfies `pred`
    pub async fn wait_for<P>(&mut self, mut pred: P) -> Option<Arc<Vec<T>>>
    where
        P: FnMut(&[T]) -> bool,
    {
        let snapshot = self
            .snapshot
            .wait_for(|s| s.as_ref().is_some_and(|items| pred(items.as_slice())))
            .await
            .ok()?;
        snapshot.clone()
    }

    /// Stop the feed; no delivery starts after this returns
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection.to_string())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Subscribes to room-scoped collections
#[derive(Clone)]
pub struct ChangeFeed {
    store: Arc<dyn DocumentStore>,
    config: FeedConfig,
}

impl ChangeFeed {
    pub fn new(store: Arc<dyn DocumentStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> FeedConfig {
        self.config
    }

    /// Start a subscription; `on_change` gets the full ordered snapshot on
    /// every change
    pub fn subscribe<T, F>(
        &self,
        collection: CollectionPath,
        order: OrderBy,
        on_change: F,
    ) -> Subscription<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let token = CancellationToken::new();

        // 必须在首次读取之前注册
        let notices = self.store.watch();

        let worker = FeedWorker {
            store: self.store.clone(),
            collection: collection.clone(),
            order,
            config: self.config,
            token: token.clone(),
            tx,
            on_change,
        };
        tokio::spawn(worker.run(notices));

        Subscription {
            collection,
            snapshot: rx,
            token,
        }
    }
}

struct FeedWorker<T, F> {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    order: OrderBy,
    config: FeedConfig,
    token: CancellationToken,
    tx: watch::Sender<Snapshot<T>>,
    on_change: F,
}

impl<T, F> FeedWorker<T, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: Fn(&[T]) + Send + Sync + 'static,
{
    async fn run(self, mut notices: broadcast::Receiver<crate::store::ChangeNotice>) {
        let collection = self.collection.to_string();
        tracing::debug!(collection = %collection, "Feed started");

        self.refresh().await;

        loop {
            let stale = tokio::select! {
                _ = self.token.cancelled() => break,
                result = notices.recv() => match result {
                    Ok(notice) => {
                        let mut stale = notice.collection == self.collection;
                        // 合并积压的通知，反正都是整集合重读
                        loop {
                            match notices.try_recv() {
                                Ok(n) => stale |= n.collection == self.collection,
                                Err(broadcast::error::TryRecvError::Lagged(_)) => stale = true,
                                Err(_) => break,
                            }
                        }
                        stale
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(collection = %collection, skipped = n, "Feed lagged, resyncing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!(collection = %collection, "Change notices closed, feed stopping");
                        break;
                    }
                },
            };

            if stale {
                self.refresh().await;
            }
        }

        tracing::debug!(collection = %collection, "Feed stopped");
    }

    async fn refresh(&self) {
        if let Some(items) = self.load().await {
            self.deliver(items);
        }
    }

    /// Query with bounded retries; `None` when cancelled or exhausted
    async fn load(&self) -> Option<Vec<T>> {
        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            let result = tokio::select! {
                _ = self.token.cancelled() => return None,
                r = self.store.query(&self.collection, &self.order) => r,
            };
            match result {
                Ok(docs) => return Some(self.decode_all(&docs)),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        collection = %self.collection,
                        attempt,
                        max_attempts = attempts,
                        "Snapshot query failed, retrying: {e}"
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => return None,
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
                Err(e) => {
                    self.log_exhausted(&e, attempts);
                    return None;
                }
            }
        }
        None
    }

    fn log_exhausted(&self, error: &StoreError, attempts: u32) {
        tracing::error!(
            collection = %self.collection,
            attempts,
            "Snapshot query failed, waiting for next change: {error}"
        );
    }

    fn decode_all(&self, docs: &[Document]) -> Vec<T> {
        docs.iter()
            .filter_map(|doc| match doc.decode::<T>() {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(collection = %self.collection, id = %doc.id, "Skipping undecodable document: {e}");
                    None
                }
            })
            .collect()
    }

    fn deliver(&self, items: Vec<T>) {
        if self.token.is_cancelled() {
            return;
        }
        (self.on_change)(&items);
        self.tx.send_replace(Some(Arc::new(items)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CasOutcome, ChangeNotice, DocPath, RedbStore, StoreResult, WriteMode};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{Map, Value, json};
    use shared::models::RoomId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize)]
    struct Item {
        id: String,
        n: i64,
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn items(room: &str) -> CollectionPath {
        CollectionPath::new(&RoomId::normalize(room), "items")
    }

    #[tokio::test]
    async fn test_initial_and_updated_snapshots() {
        let store = Arc::new(RedbStore::in_memory().unwrap());
        let coll = items("moca");
        store
            .set(&coll.doc("a").unwrap(), fields(json!({"n": 1})), WriteMode::Merge)
            .await
            .unwrap();

        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = feed.subscribe::<Item, _>(coll.clone(), OrderBy::desc("n"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let first = sub.wait_for(|items| items.len() == 1).await.unwrap();
        assert_eq!(first[0].id, "a");

        store
            .set(&coll.doc("b").unwrap(), fields(json!({"n": 5})), WriteMode::Merge)
            .await
            .unwrap();
        let second = sub.wait_for(|items| items.len() == 2).await.unwrap();
        assert_eq!(second[0].id, "b");
        assert_eq!(second[0].n, 5);
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_other_rooms_do_not_leak() {
        let store = Arc::new(RedbStore::in_memory().unwrap());
        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let mut sub = feed.subscribe::<Item, _>(items("a"), OrderBy::desc("n"), |_| {});
        sub.wait_for(|items| items.is_empty()).await.unwrap();

        store.add(&items("b"), fields(json!({"n": 1}))).await.unwrap();
        store.add(&items("a"), fields(json!({"n": 2}))).await.unwrap();

        let snap = sub.wait_for(|items| !items.is_empty()).await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].n, 2);
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let store = Arc::new(RedbStore::in_memory().unwrap());
        let coll = items("moca");
        store.add(&coll, fields(json!({"n": "not a number"}))).await.unwrap();
        store.add(&coll, fields(json!({"n": 3}))).await.unwrap();

        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let mut sub = feed.subscribe::<Item, _>(coll, OrderBy::desc("n"), |_| {});
        let snap = sub.wait_for(|_| true).await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].n, 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_deliveries() {
        let store = Arc::new(RedbStore::in_memory().unwrap());
        let coll = items("moca");
        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = feed.subscribe::<Item, _>(coll.clone(), OrderBy::desc("n"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.wait_for(|_| true).await.unwrap();

        sub.cancel();
        let before = calls.load(Ordering::SeqCst);
        store.add(&coll, fields(json!({"n": 1}))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);
        assert!(sub.changed().await.is_none());
    }

    /// Fails the first `failures` queries, then delegates
    struct FlakyStore {
        inner: RedbStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get(&self, doc: &DocPath) -> StoreResult<Option<Document>> {
            self.inner.get(doc).await
        }
        async fn set(&self, doc: &DocPath, data: Map<String, Value>, mode: WriteMode) -> StoreResult<u64> {
            self.inner.set(doc, data, mode).await
        }
        async fn update(&self, doc: &DocPath, fields: Map<String, Value>) -> StoreResult<u64> {
            self.inner.update(doc, fields).await
        }
        async fn add(&self, collection: &CollectionPath, data: Map<String, Value>) -> StoreResult<String> {
            self.inner.add(collection, data).await
        }
        async fn delete(&self, doc: &DocPath) -> StoreResult<()> {
            self.inner.delete(doc).await
        }
        async fn query(&self, collection: &CollectionPath, order: &OrderBy) -> StoreResult<Vec<Document>> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("offline".into()));
            }
            self.inner.query(collection, order).await
        }
        async fn compare_and_set(
            &self,
            doc: &DocPath,
            expected: Option<u64>,
            data: Map<String, Value>,
            mode: WriteMode,
        ) -> StoreResult<CasOutcome> {
            self.inner.compare_and_set(doc, expected, data, mode).await
        }
        fn watch(&self) -> broadcast::Receiver<ChangeNotice> {
            self.inner.watch()
        }
    }

    #[tokio::test]
    async fn test_transient_query_failures_are_retried() {
        let store = Arc::new(FlakyStore {
            inner: RedbStore::in_memory().unwrap(),
            failures: AtomicUsize::new(2),
        });
        let coll = items("moca");
        store.add(&coll, fields(json!({"n": 7}))).await.unwrap();

        let config = FeedConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(5),
        };
        let feed = ChangeFeed::new(store.clone(), config);
        let mut sub = feed.subscribe::<Item, _>(coll, OrderBy::desc("n"), |_| {});
        let snap = sub.wait_for(|_| true).await.unwrap();
        assert_eq!(snap[0].n, 7);
    }
}
