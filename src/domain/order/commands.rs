use rust_decimal::Decimal;

use super::value_objects::{DeliveryDetails, PaymentMethod};
use crate::domain::menu::{MenuItem, MenuItemId};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    /// Add one unit; an existing line for the same menu item is incremented
    AddItem {
        item: MenuItem,
    },
    /// Set a line's quantity exactly; zero or below removes the line
    UpdateQuantity {
        menu_item_id: MenuItemId,
        quantity: i64,
    },
    RemoveItem {
        menu_item_id: MenuItemId,
    },
    /// Confirmed orders are emptied, pending orders are discarded
    Clear,
    Confirm {
        ticket: i64,
    },
    Complete {
        payment_method: PaymentMethod,
    },
    ApplyDiscount {
        amount: Decimal,
    },
    SetDeliveryDetails {
        details: DeliveryDetails,
    },
}
