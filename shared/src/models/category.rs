//! Category Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, ErrorCode};

/// Fixed menu category
///
/// Persisted as its Japanese label, which is also what the menu displays.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    #[default]
    #[serde(rename = "ご飯")]
    Rice,
    #[serde(rename = "パスタ")]
    Pasta,
    #[serde(rename = "デザート")]
    Dessert,
    #[serde(rename = "飲み物")]
    Drink,
    #[serde(rename = "その他麺類")]
    OtherNoodles,
    #[serde(rename = "サイドメニュー")]
    Side,
}

impl Category {
    /// All categories in menu order
    pub const ALL: [Category; 6] = [
        Category::Rice,
        Category::Pasta,
        Category::Dessert,
        Category::Drink,
        Category::OtherNoodles,
        Category::Side,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            Category::Rice => "ご飯",
            Category::Pasta => "パスタ",
            Category::Dessert => "デザート",
            Category::Drink => "飲み物",
            Category::OtherNoodles => "その他麺類",
            Category::Side => "サイドメニュー",
        }
    }

    /// Parse a label from user input; empty input means the default category
    pub fn parse_input(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        raw.parse()
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| {
                AppError::with_message(ErrorCode::UnknownCategory, format!("Unknown category: {s}"))
                    .with_detail("category", s)
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
