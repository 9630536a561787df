// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Orders carry the aggregate machinery (commands, events, billing, slots).
// Menu, kitchen, settings and user types are plain data shared with the
// remote rows and the session.
//
// ============================================================================

use serde::{Deserialize, Deserializer};

pub mod kitchen;
pub mod menu;
pub mod order;
pub mod settings;
pub mod user;

/// Columns that may come back as `null` read as their default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
