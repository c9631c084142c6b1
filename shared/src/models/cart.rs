//! Cart Model - 本机购物车
//!
//! Lives only on the device. Persistence belongs to the client; this is the
//! pure value the checkout consumes.

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::recipe::MenuItem;
use crate::types::IsoTimestamp;
use crate::util::{client_id, now_iso};

pub const MIN_QTY: u8 = 1;
pub const MAX_QTY: u8 = 5;

/// Clamp a requested quantity into `[MIN_QTY, MAX_QTY]`
pub fn clamp_qty(qty: i64) -> u8 {
    qty.clamp(i64::from(MIN_QTY), i64::from(MAX_QTY)) as u8
}

/// Pre-checkout candidate order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub recipe_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub image: Option<String>,
    pub qty: u8,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub added_at: IsoTimestamp,
}

impl CartLine {
    pub fn subtotal(&self) -> u64 {
        u64::from(self.price) * u64::from(self.qty)
    }
}

/// Ordered list of cart lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted lines, re-clamping quantities
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let lines = lines
            .into_iter()
            .map(|mut l| {
                l.qty = clamp_qty(i64::from(l.qty));
                l
            })
            .collect();
        Self { lines }
    }

    /// Append a line for a menu item; returns the new line id
    pub fn add(&mut self, item: &MenuItem, qty: i64, note: &str) -> String {
        let id = client_id("c");
        self.lines.push(CartLine {
            id: id.clone(),
            recipe_id: item.id.clone(),
            name: item.name.clone(),
            category: item.category,
            price: item.price,
            image: item.image.clone(),
            qty: clamp_qty(qty),
            note: note.trim().to_string(),
            added_at: now_iso(),
        });
        id
    }

    /// Remove a line; returns whether it existed
    pub fn remove(&mut self, line_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        self.lines.len() != before
    }

    pub fn set_qty(&mut self, line_id: &str, qty: i64) -> bool {
        self.with_line(line_id, |l| l.qty = clamp_qty(qty))
    }

    pub fn increment(&mut self, line_id: &str) -> bool {
        self.with_line(line_id, |l| l.qty = clamp_qty(i64::from(l.qty) + 1))
    }

    pub fn decrement(&mut self, line_id: &str) -> bool {
        self.with_line(line_id, |l| l.qty = clamp_qty(i64::from(l.qty) - 1))
    }

    /// Replace a line note; blank clears it
    pub fn set_note(&mut self, line_id: &str, note: &str) -> bool {
        self.with_line(line_id, |l| l.note = note.trim().to_string())
    }

    fn with_line(&mut self, line_id: &str, f: impl FnOnce(&mut CartLine)) -> bool {
        match self.lines.iter_mut().find(|l| l.id == line_id) {
            Some(line) => {
                f(line);
                true
            }
            None => false,
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total portions
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|l| u32::from(l.qty)).sum()
    }

    pub fn total(&self) -> u64 {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
