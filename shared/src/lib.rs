//! Shared types for the ordering board
//!
//! Plain data records exchanged between the synchronization core and its
//! clients (menu, kitchen display, recipe editor), plus the unified error
//! type and small time/id utilities. No I/O lives here.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
pub use models::{Cart, CartLine, Category, MenuItem, Order, OrderStatus, Recipe, RecipeDraft, RoomId};
pub use serde::{Deserialize, Serialize};
pub use types::{IdAssignment, RoomEntity};
