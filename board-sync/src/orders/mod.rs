//! OrderStore - 订单创建、状态流转与实时订阅
//!
//! # Checkout flow
//!
//! ```text
//! cart lines ──► SequenceAllocator ──► "A-042"
//!                                        │
//!                     Order::from_cart ◄─┘
//!                            │
//!                     store.add (store-generated id)
//!                            │
//!                      ChangeFeed ──► kitchen / history subscribers
//! ```
//!
//! Allocation and the order write are two separate steps. If the write fails
//! the number is consumed and the sequence has a gap; numbers are never
//! issued twice.

use std::sync::Arc;

use serde_json::Value;
use shared::models::{Cart, CartLine, Order, OrderStatus, RoomId};
use shared::types::RoomEntity;
use shared::util::{local_hhmm, now_iso};

use crate::feed::{ChangeFeed, Subscription};
use crate::sequence::SequenceAllocator;
use crate::store::{CollectionPath, DocPath, DocumentStore, OrderBy, StoreError, write_entity};
use crate::utils::{AppError, AppResult, ErrorCode};

/// Order collection of one room
#[derive(Clone)]
pub struct OrderStore {
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
    allocator: SequenceAllocator,
    room: RoomId,
}

impl OrderStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        feed: ChangeFeed,
        allocator: SequenceAllocator,
        room: RoomId,
    ) -> Self {
        Self {
            store,
            feed,
            allocator,
            room,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    fn collection(&self) -> CollectionPath {
        CollectionPath::new(&self.room, Order::COLLECTION)
    }

    fn doc(&self, id: &str) -> AppResult<DocPath> {
        Ok(self.collection().doc(id)?)
    }

    fn order_by() -> OrderBy {
        OrderBy::desc(Order::ORDER_FIELD)
    }

    /// Turn cart lines into a numbered order
    ///
    /// An empty cart yields `Ok(None)` without touching the store.
    pub async fn create_from_cart(&self, lines: &[CartLine]) -> AppResult<Option<Order>> {
        if lines.is_empty() {
            tracing::debug!(room = %self.room, "Empty cart, no order created");
            return Ok(None);
        }

        let no = self.allocator.next_number(&self.room).await?;
        let mut order = Order::from_cart(lines, no, local_hhmm(), now_iso())
            .ok_or_else(|| AppError::new(ErrorCode::OrderEmpty))?;

        let mut fields = match serde_json::to_value(&order).map_err(StoreError::from)? {
            Value::Object(map) => map,
            _ => return Err(AppError::internal("Order did not serialize to an object")),
        };
        // 文档 id 由存储分配，不写入正文
        fields.remove("id");

        let id = match write_entity::<Order>(self.store.as_ref(), &self.room, None, fields).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(room = %self.room, no = %order.no, "Order write failed, number consumed: {e}");
                return Err(e.into());
            }
        };
        order.id = id;

        tracing::info!(
            room = %self.room,
            id = %order.id,
            no = %order.no,
            items = order.items.len(),
            total = order.total(),
            "Order created"
        );
        Ok(Some(order))
    }

    /// Create an order from the cart; the cart is cleared only on success
    pub async fn checkout(&self, cart: &mut Cart) -> AppResult<Option<Order>> {
        let order = self.create_from_cart(cart.lines()).await?;
        if order.is_some() {
            cart.clear();
        }
        Ok(order)
    }

    /// Overwrite the status; any transition is accepted
    ///
    /// The order must exist: a deleted order is not brought back.
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> AppResult<()> {
        let doc = self.doc(id)?;
        let mut fields = serde_json::Map::new();
        fields.insert("status".into(), Value::from(status.as_str()));
        fields.insert("updatedAt".into(), Value::from(now_iso()));

        match self.store.update(&doc, fields).await {
            Ok(_) => {
                tracing::debug!(room = %self.room, id = %id, status = %status, "Order status updated");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(order_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Move one step along received → cooking → done → received
    pub async fn advance_status(&self, id: &str) -> AppResult<OrderStatus> {
        let order = self.get(id).await?.ok_or_else(|| order_not_found(id))?;
        let next = order.status.next();
        self.update_status(id, next).await?;
        Ok(next)
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Order>> {
        let doc = self.doc(id)?;
        match self.store.get(&doc).await? {
            Some(d) => Ok(Some(d.decode::<Order>()?)),
            None => Ok(None),
        }
    }

    /// One-shot read ordered by `createdAt` desc
    pub async fn list(&self) -> AppResult<Vec<Order>> {
        let docs = self.store.query(&self.collection(), &Self::order_by()).await?;
        Ok(docs
            .iter()
            .filter_map(|d| match d.decode::<Order>() {
                Ok(o) => Some(o),
                Err(e) => {
                    tracing::warn!(room = %self.room, id = %d.id, "Skipping undecodable order: {e}");
                    None
                }
            })
            .collect())
    }

    /// Hard delete; deleting a missing order succeeds
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let doc = self.doc(id)?;
        self.store.delete(&doc).await?;
        tracing::debug!(room = %self.room, id = %id, "Order deleted");
        Ok(())
    }

    /// Realtime snapshot of the room's orders, newest first
    pub fn subscribe<F>(&self, on_change: F) -> Subscription<Order>
    where
        F: Fn(&[Order]) + Send + Sync + 'static,
    {
        self.feed
            .subscribe(self.collection(), Self::order_by(), on_change)
    }
}

fn order_not_found(id: &str) -> AppError {
    AppError::with_message(ErrorCode::OrderNotFound, format!("Order {} not found", id))
        .with_detail("id", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedConfig;
    use crate::sequence::RetryPolicy;
    use crate::store::{CasOutcome, ChangeNotice, Document, RedbStore, StoreResult, WriteMode};
    use async_trait::async_trait;
    use serde_json::Map;
    use shared::models::{Category, MenuItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    fn orders() -> (OrderStore, Arc<RedbStore>) {
        let store = Arc::new(RedbStore::in_memory().unwrap());
        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let allocator = SequenceAllocator::new(store.clone(), RetryPolicy::default());
        (
            OrderStore::new(store.clone(), feed, allocator.clone(), RoomId::default()),
            store,
        )
    }

    fn omurice() -> MenuItem {
        MenuItem {
            id: "r_omurice".into(),
            name: "Omurice".into(),
            category: Category::Rice,
            price: 800,
            image: None,
            updated_at: "2026-03-01T10:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn test_empty_cart_creates_nothing() {
        let (orders, _) = orders();
        assert!(orders.create_from_cart(&[]).await.unwrap().is_none());
        assert!(orders.list().await.unwrap().is_empty());
        // Counter untouched
        assert_eq!(orders.allocator.peek(orders.room()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_from_cart() {
        let (orders, _) = orders();
        let mut cart = Cart::new();
        cart.add(&omurice(), 2, "well done");

        let before = orders.allocator.peek(orders.room()).await.unwrap();
        let order = orders
            .create_from_cart(cart.lines())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(order.no, format!("A-{:03}", before));
        assert_eq!(order.status, OrderStatus::Received);
        assert_eq!(order.note, "well done");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].name, "Omurice");
        assert_eq!(order.items[0].price, 800);
        assert_eq!(order.items[0].qty, 2);
        assert_eq!(order.total(), 1600);
        assert!(order.updated_at.is_none());

        let stored = orders.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_persisted_body_has_no_id_field() {
        let (orders, store) = orders();
        let mut cart = Cart::new();
        cart.add(&omurice(), 1, "");
        let order = orders.checkout(&mut cart).await.unwrap().unwrap();

        let raw = store.get(&orders.doc(&order.id).unwrap()).await.unwrap().unwrap();
        assert!(raw.data.get("id").is_none());
        assert_eq!(raw.data["status"], "received");
        assert_eq!(raw.data["items"][0]["recipeId"], "r_omurice");
    }

    /// Rejects the next `failures` inserts, everything else goes through
    struct RejectingAdds {
        inner: RedbStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for RejectingAdds {
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
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("connection lost".into()));
            }
            self.inner.add(collection, data).await
        }
        async fn delete(&self, doc: &DocPath) -> StoreResult<()> {
            self.inner.delete(doc).await
        }
        async fn query(&self, collection: &CollectionPath, order: &OrderBy) -> StoreResult<Vec<Document>> {
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
    async fn test_failed_write_keeps_cart_and_consumes_number() {
        let store = Arc::new(RejectingAdds {
            inner: RedbStore::in_memory().unwrap(),
            failures: AtomicUsize::new(1),
        });
        let feed = ChangeFeed::new(store.clone(), FeedConfig::default());
        let allocator = SequenceAllocator::new(store.clone(), RetryPolicy::default());
        let orders = OrderStore::new(store, feed, allocator, RoomId::default());

        let mut cart = Cart::new();
        cart.add(&omurice(), 2, "well done");
        let before = cart.lines().to_vec();

        let err = orders.checkout(&mut cart).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
        assert_eq!(cart.lines(), before.as_slice());
        assert!(orders.list().await.unwrap().is_empty());

        // Retry succeeds with the next number; A-001 is a gap
        let order = orders.checkout(&mut cart).await.unwrap().unwrap();
        assert_eq!(order.no, "A-002");
        assert_eq!(order.items[0].qty, 2);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_clears_cart() {
        let (orders, _) = orders();
        let mut cart = Cart::new();
        cart.add(&omurice(), 1, "");
        let first = orders.checkout(&mut cart).await.unwrap().unwrap();
        assert!(cart.is_empty());
        assert_eq!(first.no, "A-001");

        cart.add(&omurice(), 9, "");
        let second = orders.checkout(&mut cart).await.unwrap().unwrap();
        assert_eq!(second.no, "A-002");
        assert_eq!(second.items[0].qty, 5);
    }

    #[tokio::test]
    async fn test_status_cycle() {
        let (orders, _) = orders();
        let mut cart = Cart::new();
        cart.add(&omurice(), 1, "");
        let order = orders.checkout(&mut cart).await.unwrap().unwrap();

        assert_eq!(orders.advance_status(&order.id).await.unwrap(), OrderStatus::Cooking);
        assert_eq!(orders.advance_status(&order.id).await.unwrap(), OrderStatus::Done);
        assert_eq!(orders.advance_status(&order.id).await.unwrap(), OrderStatus::Received);

        orders
            .update_status(&order.id, OrderStatus::Done)
            .await
            .unwrap();
        let stored = orders.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Done);
        assert!(stored.updated_at.is_some());
        assert_eq!(stored.no, order.no);
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let (orders, _) = orders();
        let err = orders
            .update_status("nope", OrderStatus::Cooking)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert!(orders.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (orders, _) = orders();
        let mut cart = Cart::new();
        cart.add(&omurice(), 1, "");
        let order = orders.checkout(&mut cart).await.unwrap().unwrap();
        orders.delete(&order.id).await.unwrap();
        orders.delete(&order.id).await.unwrap();
        assert!(orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_newest_first() {
        let (orders, _) = orders();
        let mut sub = orders.subscribe(|_| {});
        sub.wait_for(|list| list.is_empty()).await.unwrap();

        let mut cart = Cart::new();
        cart.add(&omurice(), 1, "");
        let first = orders.checkout(&mut cart).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cart.add(&omurice(), 1, "");
        let second = orders.checkout(&mut cart).await.unwrap().unwrap();

        let snap = sub.wait_for(|list| list.len() == 2).await.unwrap();
        assert_eq!(snap[0].id, second.id);
        assert_eq!(snap[1].id, first.id);
    }
}
