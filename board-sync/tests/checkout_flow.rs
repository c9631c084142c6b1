//! 端到端流程：编辑菜谱 → 菜单 → 购物车下单 → 厨房看板

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use board_sync::recipes::{CategorySort, MenuSort, category_covers, menu_items, sort_menu, sorted_categories};
use board_sync::{BoardState, Config, ErrorCode};
use shared::models::{Cart, Category, OrderStatus, RecipeDraft, RoomId};

fn board() -> BoardState {
    BoardState::in_memory(Config::with_work_dir("unused")).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn editor_menu_kitchen_round_trip() {
    let state = board();
    let room = state.resolve_room();
    let recipes = state.recipes(&room);
    let orders = state.orders(&room);

    // Kitchen display subscribes before anything exists
    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = deliveries.clone();
    let mut kitchen = orders.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    kitchen.wait_for(|list| list.is_empty()).await.unwrap();

    // Editor
    let omurice = recipes
        .upsert(
            RecipeDraft::new("Omurice")
                .price(800)
                .image("https://img/omurice.jpg")
                .published(true),
        )
        .await
        .unwrap();
    recipes
        .upsert(RecipeDraft::new("Draft dish").price(100))
        .await
        .unwrap();

    // Menu
    let mut menu = menu_items(&recipes.list().await.unwrap());
    sort_menu(&mut menu, MenuSort::Added);
    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0].id, omurice.id);

    // Cart → order
    let mut cart = Cart::new();
    cart.add(&menu[0], 2, "well done");
    let before = state.allocator().peek(&room).await.unwrap();
    let order = orders.checkout(&mut cart).await.unwrap().unwrap();
    assert!(cart.is_empty());
    assert_eq!(order.no, format!("A-{:03}", before));
    assert_eq!(order.note, "well done");
    assert_eq!(order.items[0].recipe_id, omurice.id);
    assert_eq!(order.items[0].qty, 2);
    assert_eq!(order.items[0].price, 800);

    // Kitchen sees it and works through the wheel
    let snap = kitchen.wait_for(|list| list.len() == 1).await.unwrap();
    assert_eq!(snap[0].id, order.id);
    assert_eq!(snap[0].status, OrderStatus::Received);

    orders.update_status(&order.id, OrderStatus::Cooking).await.unwrap();
    orders.update_status(&order.id, OrderStatus::Done).await.unwrap();
    kitchen
        .wait_for(|list| list.first().is_some_and(|o| o.status == OrderStatus::Done))
        .await
        .unwrap();
    assert_eq!(orders.advance_status(&order.id).await.unwrap(), OrderStatus::Received);

    // Kitchen clears it
    orders.delete(&order.id).await.unwrap();
    kitchen.wait_for(|list| list.is_empty()).await.unwrap();
    assert!(deliveries.load(Ordering::SeqCst) >= 3);

    // Status write on the deleted order does not resurrect it
    let err = orders
        .update_status(&order.id, OrderStatus::Cooking)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
    assert!(orders.get(&order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_cart_does_not_consume_a_number() {
    let state = board();
    let room = RoomId::normalize("quiet room");
    let orders = state.orders(&room);

    let mut cart = Cart::new();
    assert!(orders.checkout(&mut cart).await.unwrap().is_none());
    assert!(orders.list().await.unwrap().is_empty());
    assert_eq!(state.allocator().peek(&room).await.unwrap(), 1);
}

#[tokio::test]
async fn latest_cover_wins_while_toggle_is_in_flight() {
    let state = board();
    let room = state.resolve_room();
    let recipes = state.recipes(&room);

    // Two covers in ご飯 (written directly, as a racing editor would)
    let first = recipes
        .upsert(RecipeDraft::new("Curry").image("curry.jpg").cat_cover(true).published(true))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = recipes
        .upsert(RecipeDraft::new("Donburi").image("don.jpg").cat_cover(true).published(true))
        .await
        .unwrap();

    let covers = category_covers(&recipes.list().await.unwrap());
    assert_eq!(covers[&Category::Rice].as_ref().unwrap().id, second.id);

    // Protocol brings it back to a single cover
    recipes.set_category_cover(&first.id).await.unwrap();
    let all = recipes.list().await.unwrap();
    let holders: Vec<_> = all
        .iter()
        .filter(|r| r.category == Category::Rice && r.cat_cover)
        .collect();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].id, first.id);

    let categories = sorted_categories(&all, CategorySort::Popular);
    assert_eq!(categories[0], Category::Rice);
}

#[tokio::test]
async fn subscriptions_in_different_rooms_are_isolated() {
    let state = board();
    let shop_a = state.recipes(&RoomId::normalize("shop a"));
    let shop_b = state.recipes(&RoomId::normalize("shop b"));

    let mut feed_b = shop_b.subscribe(|_| {});
    feed_b.wait_for(|list| list.is_empty()).await.unwrap();

    shop_a.upsert(RecipeDraft::new("Only A")).await.unwrap();
    shop_b.upsert(RecipeDraft::new("Only B")).await.unwrap();

    let snap = feed_b.wait_for(|list| !list.is_empty()).await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].name, "Only B");
}
