use super::value_objects::TableNumber;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already completed")]
    AlreadyCompleted,

    #[error("Order is already confirmed")]
    AlreadyConfirmed,

    #[error("Order must be confirmed before payment")]
    NotConfirmed,

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Table {0} already has a confirmed order")]
    TableOccupied(TableNumber),

    #[error("Dine-in order has no table")]
    MissingTable,

    #[error("Discount cannot be negative")]
    NegativeDiscount,

    #[error("Delivery details only apply to delivery orders")]
    NotDelivery,

    #[error("Delivery details need a phone number and flat number")]
    IncompleteDeliveryDetails,

    #[error("Invalid ticket number: {0}")]
    InvalidTicket(i64),

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i64),

    #[error("{0} is not available")]
    ItemUnavailable(String),
}
