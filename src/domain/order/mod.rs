// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderItem, OrderId, OrderStatus, ...)
// - Events (ItemAdded, Confirmed, Completed, ...)
// - Commands (AddItem, Confirm, Complete, ...)
// - Errors (OrderError)
// - Aggregate (Order)
// - Billing (TaxPolicy, Bill, compute)
// - Slots (which order a table or delivery context maps to)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod billing;
pub mod slots;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use billing::{Bill, TaxPolicy};
pub use slots::{Resolution, SwitchTarget};
pub use command_handler::*;
