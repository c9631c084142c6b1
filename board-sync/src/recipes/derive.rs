//! Pure read helpers over a recipe snapshot
//!
//! Menu projection, category covers and the sort modes used by the menu and
//! category screens. No I/O.

use std::collections::BTreeMap;

use shared::models::{Category, MenuItem, Recipe};
use shared::util::parse_iso;

/// Menu item ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuSort {
    /// Newest `updatedAt` first
    #[default]
    Added,
    /// Name ascending
    Name,
}

/// Category list ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategorySort {
    /// Most published recipes first, then label
    #[default]
    Popular,
    /// Fixed menu order
    Added,
    /// Label ascending
    Name,
}

/// Published recipes with a name, projected for ordering
pub fn menu_items(recipes: &[Recipe]) -> Vec<MenuItem> {
    recipes
        .iter()
        .filter(|r| r.published && !r.name.trim().is_empty())
        .map(MenuItem::from)
        .collect()
}

/// Representative recipe of every category
///
/// Candidates have `catCover` set and an image. Several candidates can exist
/// while a cover toggle is in flight; the latest `updatedAt` wins (unparseable
/// timestamps count as oldest), then the greatest id.
pub fn category_covers(recipes: &[Recipe]) -> BTreeMap<Category, Option<Recipe>> {
    let mut best: BTreeMap<Category, Option<&Recipe>> =
        Category::ALL.iter().map(|c| (*c, None)).collect();

    for r in recipes.iter().filter(|r| r.cat_cover && r.has_image()) {
        let slot = best.entry(r.category).or_insert(None);
        let replace = match slot {
            None => true,
            Some(cur) => cover_key(r) > cover_key(cur),
        };
        if replace {
            *slot = Some(r);
        }
    }

    best.into_iter()
        .map(|(c, r)| (c, r.cloned()))
        .collect()
}

fn cover_key(r: &Recipe) -> (Option<chrono::DateTime<chrono::Utc>>, &str) {
    (parse_iso(&r.updated_at), r.id.as_str())
}

pub fn sort_menu(items: &mut [MenuItem], sort: MenuSort) {
    match sort {
        MenuSort::Added => items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        MenuSort::Name => items.sort_by(|a, b| a.name.cmp(&b.name)),
    }
}

/// Keep only `category`; `None` keeps everything
pub fn filter_category(items: Vec<MenuItem>, category: Option<Category>) -> Vec<MenuItem> {
    match category {
        Some(c) => items.into_iter().filter(|i| i.category == c).collect(),
        None => items,
    }
}

/// Published recipe count per category (every category present)
pub fn category_popularity(recipes: &[Recipe]) -> BTreeMap<Category, usize> {
    let mut counts: BTreeMap<Category, usize> = Category::ALL.iter().map(|c| (*c, 0)).collect();
    for r in recipes.iter().filter(|r| r.published) {
        *counts.entry(r.category).or_default() += 1;
    }
    counts
}

pub fn sorted_categories(recipes: &[Recipe], sort: CategorySort) -> Vec<Category> {
    let mut list = Category::ALL.to_vec();
    match sort {
        CategorySort::Added => {}
        CategorySort::Name => list.sort_by_key(|c| c.label()),
        CategorySort::Popular => {
            let pop = category_popularity(recipes);
            let count = |c: &Category| pop.get(c).copied().unwrap_or(0);
            list.sort_by(|a, b| {
                count(b)
                    .cmp(&count(a))
                    .then_with(|| a.label().cmp(b.label()))
            });
        }
    }
    list
}
