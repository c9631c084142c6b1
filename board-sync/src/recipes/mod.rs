//! RecipeStore - 菜谱 CRUD 与实时订阅
//!
//! Recipes live under `rooms/{room}/recipes/{id}` with client-generated ids,
//! so an editor can name a recipe before it ever reaches the store.
//!
//! # Cover protocol
//!
//! At most one recipe per category should carry `catCover` together with an
//! image. The store does not enforce it; writers clear every other cover in
//! the category first, then set the new one. The writes are independent, so
//! readers pick a winner with [`derive::category_covers`].

pub mod derive;

pub use derive::{
    CategorySort, MenuSort, category_covers, category_popularity, filter_category, menu_items,
    sort_menu, sorted_categories,
};

use std::sync::Arc;

use serde_json::{Map, Value};
use shared::models::{Category, Recipe, RecipeDraft, RoomId};
use shared::types::RoomEntity;
use shared::util::{client_id, now_iso};

use crate::feed::{ChangeFeed, Subscription};
use crate::store::{CollectionPath, DocPath, DocumentStore, OrderBy, StoreError, write_entity};
use crate::utils::{AppError, AppResult, ErrorCode};

/// Recipe collection of one room
#[derive(Clone)]
pub struct RecipeStore {
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
    room: RoomId,
}

impl RecipeStore {
    pub fn new(store: Arc<dyn DocumentStore>, feed: ChangeFeed, room: RoomId) -> Self {
        Self { store, feed, room }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    fn collection(&self) -> CollectionPath {
        CollectionPath::new(&self.room, Recipe::COLLECTION)
    }

    fn doc(&self, id: &str) -> AppResult<DocPath> {
        Ok(self.collection().doc(id)?)
    }

    fn order_by() -> OrderBy {
        OrderBy::desc(Recipe::ORDER_FIELD)
    }

    /// Create or merge a recipe and return it as stored
    ///
    /// Fields left unset in the draft keep their stored value.
    pub async fn upsert(&self, draft: RecipeDraft) -> AppResult<Recipe> {
        let now = now_iso();
        let (id, fields, is_new) = draft.into_fields(&now, || client_id("r"))?;
        write_entity::<Recipe>(self.store.as_ref(), &self.room, Some(&id), fields).await?;
        tracing::debug!(room = %self.room, id = %id, is_new, "Recipe upserted");

        self.get(&id)
            .await?
            .ok_or_else(|| recipe_not_found(&id))
    }

    /// Upsert honoring the cover protocol: when the draft claims the cover,
    /// other covers of its category are cleared first
    pub async fn save(&self, draft: RecipeDraft) -> AppResult<Recipe> {
        if draft.cat_cover != Some(true) {
            return self.upsert(draft).await;
        }
        if draft.name.trim().is_empty() {
            return Err(AppError::new(ErrorCode::RecipeNameEmpty));
        }

        let category = match draft.category.as_deref() {
            Some(raw) => Category::parse_input(raw)?,
            None => match draft.id.as_deref() {
                Some(id) => self.get(id).await?.map(|r| r.category).unwrap_or_default(),
                None => Category::default(),
            },
        };
        self.clear_covers_except(category, draft.id.as_deref()).await?;
        self.upsert(draft).await
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Recipe>> {
        let doc = self.doc(id)?;
        match self.store.get(&doc).await? {
            Some(d) => Ok(Some(d.decode::<Recipe>()?)),
            None => Ok(None),
        }
    }

    /// One-shot read ordered by `updatedAt` desc
    pub async fn list(&self) -> AppResult<Vec<Recipe>> {
        let docs = self.store.query(&self.collection(), &Self::order_by()).await?;
        Ok(docs
            .iter()
            .filter_map(|d| match d.decode::<Recipe>() {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!(room = %self.room, id = %d.id, "Skipping undecodable recipe: {e}");
                    None
                }
            })
            .collect())
    }

    /// Hard delete; deleting a missing recipe succeeds
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let doc = self.doc(id)?;
        self.store.delete(&doc).await?;
        tracing::debug!(room = %self.room, id = %id, "Recipe deleted");
        Ok(())
    }

    /// Realtime snapshot of the room's recipes, newest first
    pub fn subscribe<F>(&self, on_change: F) -> Subscription<Recipe>
    where
        F: Fn(&[Recipe]) + Send + Sync + 'static,
    {
        self.feed
            .subscribe(self.collection(), Self::order_by(), on_change)
    }

    /// Make `id` the cover of its category
    pub async fn set_category_cover(&self, id: &str) -> AppResult<Recipe> {
        let target = self.get(id).await?.ok_or_else(|| recipe_not_found(id))?;
        let cleared = self.clear_covers_except(target.category, Some(id)).await?;
        self.patch(id, "catCover", Value::from(true)).await?;
        tracing::info!(room = %self.room, id = %id, category = %target.category, cleared, "Category cover set");
        self.get(id).await?.ok_or_else(|| recipe_not_found(id))
    }

    pub async fn clear_category_cover(&self, id: &str) -> AppResult<Recipe> {
        self.patch(id, "catCover", Value::from(false)).await?;
        self.get(id).await?.ok_or_else(|| recipe_not_found(id))
    }

    /// Flip `published`
    pub async fn toggle_published(&self, id: &str) -> AppResult<Recipe> {
        let current = self.get(id).await?.ok_or_else(|| recipe_not_found(id))?;
        self.patch(id, "published", Value::from(!current.published))
            .await?;
        self.get(id).await?.ok_or_else(|| recipe_not_found(id))
    }

    /// Clear `catCover` on every recipe of `category` except `keep`
    ///
    /// Returns how many recipes were cleared.
    async fn clear_covers_except(&self, category: Category, keep: Option<&str>) -> AppResult<usize> {
        let mut cleared = 0;
        for r in self.list().await? {
            if r.category != category || !r.cat_cover || Some(r.id.as_str()) == keep {
                continue;
            }
            match self.patch(&r.id, "catCover", Value::from(false)).await {
                Ok(()) => cleared += 1,
                // Deleted meanwhile
                Err(e) if e.code == ErrorCode::RecipeNotFound => {
                    tracing::debug!(room = %self.room, id = %r.id, "Cover holder vanished");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(cleared)
    }

    /// Merge one field plus a fresh `updatedAt` into an existing recipe
    async fn patch(&self, id: &str, field: &str, value: Value) -> AppResult<()> {
        let doc = self.doc(id)?;
        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        fields.insert("updatedAt".into(), Value::from(now_iso()));

        match self.store.update(&doc, fields).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(recipe_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn recipe_not_found(id: &str) -> AppError {
    AppError::with_message(ErrorCode::RecipeNotFound, format!("Recipe {} not found", id))
        .with_detail("id", id)
}
