use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Menu Value Objects
// ============================================================================

pub type MenuItemId = i64;

/// A sellable menu entry. Each portion of a dish is its own item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_type: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl MenuItem {
    pub fn new(id: MenuItemId, name: impl Into<String>, price: Decimal, category: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            category: category.into(),
            portion: None,
            dietary_type: None,
            is_active: true,
            available: true,
        }
    }

    pub fn with_portion(mut self, portion: impl Into<String>) -> Self {
        self.portion = Some(portion.into());
        self
    }

    /// Only active, available items can be put on an order
    pub fn is_orderable(&self) -> bool {
        self.is_active && self.available
    }

    /// Name including the portion, e.g. "Biryani (Large)"
    pub fn display_name(&self) -> String {
        match &self.portion {
            Some(portion) if !portion.is_empty() => format!("{} ({})", self.name, portion),
            _ => self.name.clone(),
        }
    }
}

/// All portions of one dish, grouped by name
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMenuItem {
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub portions: Vec<MenuItem>,
}

impl GroupedMenuItem {
    pub fn has_portions(&self) -> bool {
        self.portions.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_includes_portion() {
        let item = MenuItem::new(1, "Biryani", Decimal::new(25000, 2), "Mains").with_portion("Large");
        assert_eq!(item.display_name(), "Biryani (Large)");

        let plain = MenuItem::new(2, "Tea", Decimal::new(1500, 2), "Drinks");
        assert_eq!(plain.display_name(), "Tea");
    }

    #[test]
    fn test_missing_flags_default_to_orderable() {
        let json = r#"{"id": 3, "name": "Lassi", "price": 4.5, "category": "Drinks"}"#;
        let item: MenuItem = serde_json::from_str(json).unwrap();

        assert!(item.is_orderable());
        assert_eq!(item.price, Decimal::new(45, 1));
    }

    #[test]
    fn test_unavailable_item_is_not_orderable() {
        let mut item = MenuItem::new(4, "Soup", Decimal::ONE, "Starters");
        item.available = false;
        assert!(!item.is_orderable());
    }
}
