use std::collections::BTreeMap;

use crate::domain::menu::{GroupedMenuItem, MenuItem, MenuItemId};

// ============================================================================
// Menu Catalog - read-through cache of the remote menu
// ============================================================================

pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Default)]
pub struct MenuCatalog {
    items: Vec<MenuItem>,
}

impl MenuCatalog {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn replace(&mut self, items: Vec<MenuItem>) {
        tracing::debug!(items = items.len(), "Menu catalog refreshed");
        self.items = items;
    }

    /// Replace the item with the same id, or append it
    pub fn upsert(&mut self, item: MenuItem) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn remove(&mut self, id: MenuItemId) -> Option<MenuItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn get(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// "All" followed by each distinct category in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        for item in &self.items {
            if !item.category.is_empty() && !categories.contains(&item.category) {
                categories.push(item.category.clone());
            }
        }
        categories
    }

    /// Items in `category`; "All" matches everything
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a MenuItem> + 'a {
        self.items
            .iter()
            .filter(move |item| category == ALL_CATEGORIES || item.category == category)
    }

    /// What the order screen may offer
    pub fn orderable(&self) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(|item| item.is_orderable())
    }

    /// One entry per dish name, portions sorted by label, groups by name
    pub fn grouped(&self) -> Vec<GroupedMenuItem> {
        let mut groups: BTreeMap<&str, GroupedMenuItem> = BTreeMap::new();

        for item in &self.items {
            groups
                .entry(item.name.as_str())
                .or_insert_with(|| GroupedMenuItem {
                    name: item.name.clone(),
                    category: item.category.clone(),
                    base_price: item.price,
                    portions: Vec::new(),
                })
                .portions
                .push(item.clone());
        }

        groups
            .into_values()
            .map(|mut group| {
                group
                    .portions
                    .sort_by(|a, b| a.portion.as_deref().unwrap_or("").cmp(b.portion.as_deref().unwrap_or("")));
                group
            })
            .collect()
    }

    /// Orderable portions of the dish called `name`
    pub fn group(&self, name: &str) -> Option<GroupedMenuItem> {
        self.grouped()
            .into_iter()
            .find(|group| group.name == name)
            .map(|mut group| {
                group.portions.retain(MenuItem::is_orderable);
                group
            })
            .filter(|group| !group.portions.is_empty())
    }
}
