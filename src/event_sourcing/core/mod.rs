// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// GENERIC, reusable command/event infrastructure that works with any
// aggregate. No domain-specific code (no Order, MenuItem, etc.) lives here.
//
// ============================================================================

pub mod aggregate;
pub mod event;

// Re-export core types for convenience
pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope};
