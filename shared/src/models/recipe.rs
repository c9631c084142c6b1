//! Recipe Model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::category::Category;
use crate::error::{AppError, ErrorCode};
use crate::types::{IdAssignment, IsoTimestamp, RoomEntity};

/// Recipe entity (menu entry) as stored under `rooms/{room}/recipes/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Category,
    /// Whole currency units, never negative
    #[serde(default)]
    pub price: u32,
    /// Data URL or remote URL; `None` when the recipe has no picture
    #[serde(default)]
    pub image: Option<String>,
    /// Preparation notes for the kitchen
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub published: bool,
    /// Supplies the representative image of its category
    #[serde(default)]
    pub cat_cover: bool,
    #[serde(default)]
    pub updated_at: IsoTimestamp,
}

impl RoomEntity for Recipe {
    const COLLECTION: &'static str = "recipes";
    const ID_ASSIGNMENT: IdAssignment = IdAssignment::Client;
    const ORDER_FIELD: &'static str = "updatedAt";
}

impl Recipe {
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Upsert payload
///
/// `None` fields are left out of the write so the stored value survives
/// (merge semantics). For a brand-new recipe (no `id`) unset fields take
/// their defaults instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDraft {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Raw category label
    pub category: Option<String>,
    /// Raw price as entered (number or numeric string)
    pub price: Option<Value>,
    /// `Some("")` clears the image
    pub image: Option<String>,
    pub steps: Option<String>,
    pub published: Option<bool>,
    pub cat_cover: Option<bool>,
}

impl RecipeDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category.label().to_string());
        self
    }

    pub fn price(mut self, price: impl Into<Value>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn steps(mut self, steps: impl Into<String>) -> Self {
        self.steps = Some(steps.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn cat_cover(mut self, cat_cover: bool) -> Self {
        self.cat_cover = Some(cat_cover);
        self
    }

    /// Validate and normalize into the document fields to merge
    ///
    /// Returns `(id, fields, is_new)`. `new_id` is only called when the draft
    /// carries no id.
    pub fn into_fields(
        self,
        now: &str,
        new_id: impl FnOnce() -> String,
    ) -> Result<(String, Map<String, Value>, bool), AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::new(ErrorCode::RecipeNameEmpty));
        }
        let category = self
            .category
            .as_deref()
            .map(Category::parse_input)
            .transpose()?;

        let existing_id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let is_new = existing_id.is_none();
        let id = existing_id.unwrap_or_else(new_id);

        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(id.clone()));
        fields.insert("name".into(), Value::from(name));

        if let Some(category) = category {
            fields.insert("category".into(), Value::from(category.label()));
        } else if is_new {
            fields.insert("category".into(), Value::from(Category::default().label()));
        }

        if let Some(raw) = self.price.as_ref() {
            fields.insert("price".into(), Value::from(coerce_price(raw)));
        } else if is_new {
            fields.insert("price".into(), Value::from(0u32));
        }

        match self.image.map(|s| s.trim().to_string()) {
            Some(image) if !image.is_empty() => {
                fields.insert("image".into(), Value::from(image));
            }
            Some(_) => {
                fields.insert("image".into(), Value::Null);
            }
            None if is_new => {
                fields.insert("image".into(), Value::Null);
            }
            None => {}
        }

        if let Some(steps) = self.steps {
            fields.insert("steps".into(), Value::from(steps.trim()));
        } else if is_new {
            fields.insert("steps".into(), Value::from(""));
        }

        if let Some(published) = self.published {
            fields.insert("published".into(), Value::from(published));
        } else if is_new {
            fields.insert("published".into(), Value::from(false));
        }

        if let Some(cat_cover) = self.cat_cover {
            fields.insert("catCover".into(), Value::from(cat_cover));
        } else if is_new {
            fields.insert("catCover".into(), Value::from(false));
        }

        fields.insert("updatedAt".into(), Value::from(now));
        Ok((id, fields, is_new))
    }
}

impl From<&Recipe> for RecipeDraft {
    /// Full draft carrying every field of an existing recipe
    fn from(r: &Recipe) -> Self {
        Self {
            id: Some(r.id.clone()),
            name: r.name.clone(),
            category: Some(r.category.label().to_string()),
            price: Some(Value::from(r.price)),
            image: Some(r.image.clone().unwrap_or_default()),
            steps: Some(r.steps.clone()),
            published: Some(r.published),
            cat_cover: Some(r.cat_cover),
        }
    }
}

/// Coerce a raw price to a non-negative whole number
///
/// Numbers are truncated toward zero, numeric strings are parsed, negatives and
/// anything non-numeric become 0.
pub fn coerce_price(raw: &Value) -> u32 {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(v) if v.is_finite() && v > 0.0 => v.trunc().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Ordering-facing projection of a published recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub price: u32,
    pub image: Option<String>,
    pub updated_at: IsoTimestamp,
}

impl From<&Recipe> for MenuItem {
    fn from(r: &Recipe) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            category: r.category,
            price: r.price,
            image: r.image.clone().filter(|s| !s.is_empty()),
            updated_at: r.updated_at.clone(),
        }
    }
}
