//! Order Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::cart::{CartLine, clamp_qty};
use crate::error::AppError;
use crate::types::{IdAssignment, IsoTimestamp, RoomEntity};

/// Separator between per-line notes in the order note
pub const NOTE_SEPARATOR: &str = " / ";

/// Kitchen status wheel: received → cooking → done → received
///
/// There is no terminal state; `done` wraps back to `received`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Received,
    Cooking,
    Done,
}

impl OrderStatus {
    /// Advance by one step on the wheel
    pub const fn next(self) -> Self {
        match self {
            OrderStatus::Received => OrderStatus::Cooking,
            OrderStatus::Cooking => OrderStatus::Done,
            OrderStatus::Done => OrderStatus::Received,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Done => "done",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "received" => Ok(OrderStatus::Received),
            "cooking" => Ok(OrderStatus::Cooking),
            "done" => Ok(OrderStatus::Done),
            other => Err(AppError::validation(format!("Unknown order status: {other}"))),
        }
    }
}

/// Line snapshot copied from the cart at order time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub recipe_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_qty")]
    pub qty: u8,
    #[serde(default)]
    pub price: u32,
}

fn default_qty() -> u8 {
    1
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            recipe_id: line.recipe_id.clone(),
            name: line.name.clone(),
            qty: clamp_qty(i64::from(line.qty)),
            price: line.price,
        }
    }
}

/// Confirmed checkout as stored under `rooms/{room}/orders/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Store-generated; the document key, stripped from the persisted body
    #[serde(default)]
    pub id: String,
    /// Display number, `A-001`
    pub no: String,
    /// Local `HH:MM` at creation
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub created_at: IsoTimestamp,
    /// Last status write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<IsoTimestamp>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl RoomEntity for Order {
    const COLLECTION: &'static str = "orders";
    const ID_ASSIGNMENT: IdAssignment = IdAssignment::Store;
    const ORDER_FIELD: &'static str = "createdAt";
}

impl Order {
    /// Build a new order body from cart lines
    ///
    /// Returns `None` for an empty cart. `id` stays empty until the store
    /// assigns one.
    pub fn from_cart(
        lines: &[CartLine],
        no: String,
        time: String,
        created_at: IsoTimestamp,
    ) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        Some(Self {
            id: String::new(),
            no,
            time,
            created_at,
            updated_at: None,
            status: OrderStatus::Received,
            note: join_notes(lines),
            items: lines.iter().map(OrderItem::from).collect(),
        })
    }

    /// Sum of price × qty
    pub fn total(&self) -> u64 {
        self.items
            .iter()
            .map(|i| u64::from(i.price) * u64::from(i.qty))
            .sum()
    }

    /// Number of portions
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| u32::from(i.qty)).sum()
    }
}

/// Join non-empty per-line notes
pub fn join_notes(lines: &[CartLine]) -> String {
    lines
        .iter()
        .map(|l| l.note.trim())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(NOTE_SEPARATOR)
}

/// Format an issued counter value as a display number
pub fn format_order_no(n: u64) -> String {
    format!("A-{:03}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn line(name: &str, price: u32, qty: u8, note: &str) -> CartLine {
        CartLine {
            id: format!("c_{name}"),
            recipe_id: format!("r_{name}"),
            name: name.to_string(),
            category: Category::Rice,
            price,
            image: None,
            qty,
            note: note.to_string(),
            added_at: "2026-03-01T10:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_status_wheel() {
        assert_eq!(OrderStatus::Received.next(), OrderStatus::Cooking);
        assert_eq!(OrderStatus::Cooking.next(), OrderStatus::Done);
        assert_eq!(OrderStatus::Done.next(), OrderStatus::Received);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("done".parse::<OrderStatus>().unwrap(), OrderStatus::Done);
        assert!("served".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Cooking).unwrap(), "\"cooking\"");
    }

    #[test]
    fn test_format_order_no() {
        assert_eq!(format_order_no(1), "A-001");
        assert_eq!(format_order_no(42), "A-042");
        assert_eq!(format_order_no(1234), "A-1234");
    }

    #[test]
    fn test_from_cart_empty() {
        assert!(Order::from_cart(&[], "A-001".into(), "12:00".into(), String::new()).is_none());
    }

    #[test]
    fn test_from_cart_snapshots_lines() {
        let lines = vec![
            line("Omurice", 800, 2, "well done"),
            line("Tea", 300, 1, "  "),
            line("Cake", 450, 1, "no cream"),
        ];
        let order = Order::from_cart(&lines, "A-007".into(), "12:30".into(), "t".into()).unwrap();
        assert_eq!(order.status, OrderStatus::Received);
        assert_eq!(order.note, "well done / no cream");
        assert_eq!(order.items.len(), 3);
        assert_eq!(order.items[0].name, "Omurice");
        assert_eq!(order.items[0].qty, 2);
        assert_eq!(order.total(), 800 * 2 + 300 + 450);
        assert_eq!(order.item_count(), 4);
    }

    #[test]
    fn test_new_order_body_shape() {
        let order =
            Order::from_cart(&[line("Tea", 300, 1, "")], "A-001".into(), "09:00".into(), "t".into())
                .unwrap();
        let value = serde_json::to_value(&order).unwrap();
        assert!(value.get("updatedAt").is_none());
        assert_eq!(value["status"], "received");
        assert_eq!(value["items"][0]["recipeId"], "r_Tea");
    }
}
