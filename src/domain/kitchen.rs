use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::{OrderItem, OrderType, TableNumber};

// ============================================================================
// Kitchen Orders - what the kitchen display prepares
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitchenStatus {
    Preparing,
    Ready,
}

/// Snapshot of a confirmed order sent to the kitchen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrder {
    pub id: i64,
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub order_type: OrderType,
    #[serde(default)]
    pub table_number: Option<TableNumber>,
    pub status: KitchenStatus,
}

impl KitchenOrder {
    pub fn is_preparing(&self) -> bool {
        self.status == KitchenStatus::Preparing
    }

    /// "Table 4" or "Delivery"
    pub fn destination(&self) -> String {
        match (self.order_type, self.table_number) {
            (OrderType::DineIn, Some(table)) => format!("Table {}", table.0),
            (order_type, _) => order_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_row_decodes() {
        let json = r#"{
            "id": 1,
            "order_id": 77,
            "created_at": "2026-03-01T12:00:00Z",
            "items": [],
            "order_type": "dine-in",
            "table_number": 4,
            "status": "preparing"
        }"#;

        let order: KitchenOrder = serde_json::from_str(json).unwrap();

        assert!(order.is_preparing());
        assert_eq!(order.destination(), "Table 4");
    }
}
