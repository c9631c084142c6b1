//! Data models shared by the board and its clients
//!
//! Every persisted shape uses camelCase field names.

pub mod cart;
pub mod category;
pub mod counter;
pub mod order;
pub mod recipe;
pub mod room;

pub use cart::{Cart, CartLine, MAX_QTY, MIN_QTY, clamp_qty};
pub use category::Category;
pub use counter::{COUNTER_DOC, SequenceCounter};
pub use order::{NOTE_SEPARATOR, Order, OrderItem, OrderStatus, format_order_no, join_notes};
pub use recipe::{MenuItem, Recipe, RecipeDraft, coerce_price};
pub use room::{DEFAULT_ROOM, RoomId};
