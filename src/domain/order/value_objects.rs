use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::menu::{MenuItem, MenuItemId};

// ============================================================================
// Order Value Objects
// ============================================================================

/// A menu selection on an order: the menu item's fields plus a quantity (≥ 1)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    #[serde(flatten)]
    pub item: MenuItem,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(item: MenuItem, quantity: u32) -> Self {
        Self { item, quantity }
    }

    pub fn menu_item_id(&self) -> MenuItemId {
        self.item.id
    }

    pub fn line_total(&self) -> Decimal {
        self.item.price * Decimal::from(self.quantity)
    }
}

/// Order identity. Pending orders get a throwaway id; confirming assigns a
/// durable ticket number, so the two can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderId {
    Pending(Uuid),
    Ticket(i64),
}

impl OrderId {
    pub fn new_pending() -> Self {
        Self::Pending(Uuid::now_v7())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn ticket(&self) -> Option<i64> {
        match self {
            Self::Ticket(ticket) => Some(*ticket),
            Self::Pending(_) => None,
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(id) => write!(f, "pending-{}", &id.simple().to_string()[..8]),
            Self::Ticket(ticket) => write!(f, "#{ticket}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    #[serde(alias = "received")]
    Confirmed,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "dine-in", alias = "Dine In")]
    DineIn,
    #[serde(rename = "delivery", alias = "Delivery")]
    Delivery,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DineIn => write!(f, "Dine In"),
            Self::Delivery => write!(f, "Delivery"),
        }
    }
}

/// Physical table number (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableNumber(pub u32);

impl fmt::Display for TableNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cash => "Cash",
            Self::Card => "Card",
            Self::Mobile => "Mobile",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
}

/// Customer address for a delivery order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub phone_no: String,
    pub flat_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
