use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{DeliveryDetails, PaymentMethod};
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::event_sourcing::DomainEvent;

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    ItemAdded(ItemAdded),
    QuantityChanged(QuantityChanged),
    ItemRemoved(ItemRemoved),
    ItemsCleared,
    Discarded,
    Confirmed(OrderConfirmed),
    Completed(OrderCompleted),
    DiscountApplied(DiscountApplied),
    DeliveryDetailsSet(DeliveryDetailsSet),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ItemAdded(_) => "OrderItemAdded",
            Self::QuantityChanged(_) => "OrderQuantityChanged",
            Self::ItemRemoved(_) => "OrderItemRemoved",
            Self::ItemsCleared => "OrderItemsCleared",
            Self::Discarded => "OrderDiscarded",
            Self::Confirmed(_) => "OrderConfirmed",
            Self::Completed(_) => "OrderCompleted",
            Self::DiscountApplied(_) => "OrderDiscountApplied",
            Self::DeliveryDetailsSet(_) => "OrderDeliveryDetailsSet",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// New line with quantity 1
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemAdded {
    pub item: MenuItem,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QuantityChanged {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemRemoved {
    pub menu_item_id: MenuItemId,
}

/// Order Confirmed - durable ticket assigned, sent to the kitchen
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderConfirmed {
    pub ticket: i64,
    pub confirmed_at: DateTime<Utc>,
}

/// Order Completed - payment captured, lifecycle ended
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCompleted {
    pub payment_method: PaymentMethod,
    pub completed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiscountApplied {
    pub amount: Decimal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeliveryDetailsSet {
    pub details: DeliveryDetails,
}
