// ============================================================================
// Store - local persistence of orders and the signed-in user
// ============================================================================

pub mod order_store;
pub mod storage;

pub use order_store::{scoped_key, OrderStore, ACTIVE_ORDERS_KEY, HISTORY_KEY, USER_KEY};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
