// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic aggregate and event-envelope abstractions.
// Domain-specific code is in src/domain/
//
// ============================================================================

mod core;

pub use self::core::*;
