use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::kitchen::{KitchenOrder, KitchenStatus};
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::domain::order::Order;
use crate::domain::settings::RestaurantSettings;
use crate::domain::user::{NewAccount, User};
use crate::error::BackendError;

// ============================================================================
// Remote Sync Adapter
// ============================================================================
//
// RemoteBackend : tenant-scoped CRUD against the hosted database
// ChangeFeed    : lazy, unbounded stream of row changes per watched table
//
// Implementations:
// - PostgrestBackend  (REST, rows translated in `rows`)
// - PgChangeFeed      (Postgres LISTEN/NOTIFY)
// - InMemoryBackend   (both traits, in-process)
//
// ============================================================================

pub mod memory;
pub mod postgrest;
pub mod realtime;
pub mod rows;

pub use memory::InMemoryBackend;
pub use postgrest::PostgrestBackend;
pub use realtime::PgChangeFeed;

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    // Menu
    async fn menu_items(&self, restaurant_id: i64) -> Result<Vec<MenuItem>, BackendError>;
    /// The item's id is ignored; the stored row gets a new one
    async fn add_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError>;
    async fn update_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError>;
    async fn delete_menu_item(&self, restaurant_id: i64, id: MenuItemId) -> Result<(), BackendError>;

    // Orders
    /// Unpaid orders, newest first
    async fn active_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError>;
    /// Paid orders, newest first
    async fn completed_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError>;
    /// Store a pending order as confirmed and return its durable ticket number
    async fn insert_order(&self, restaurant_id: i64, order: &Order) -> Result<i64, BackendError>;
    /// Overwrite a ticketed order (last write wins)
    async fn update_order(&self, restaurant_id: i64, order: &Order) -> Result<(), BackendError>;
    async fn delete_order(&self, restaurant_id: i64, ticket: i64) -> Result<(), BackendError>;

    // Kitchen
    async fn create_kitchen_order(&self, restaurant_id: i64, order: &Order) -> Result<KitchenOrder, BackendError>;
    async fn kitchen_orders(&self, restaurant_id: i64) -> Result<Vec<KitchenOrder>, BackendError>;
    async fn update_kitchen_status(
        &self,
        restaurant_id: i64,
        id: i64,
        status: KitchenStatus,
    ) -> Result<(), BackendError>;

    // Settings
    async fn settings(&self, restaurant_id: i64) -> Result<Option<RestaurantSettings>, BackendError>;
    async fn update_settings(
        &self,
        restaurant_id: i64,
        settings: &RestaurantSettings,
    ) -> Result<RestaurantSettings, BackendError>;

    // Users
    /// Look up by email, username or phone and check the password
    async fn sign_in(&self, identifier: &str, password: &str) -> Result<Option<User>, BackendError>;
    /// Open a restaurant owned by a new admin user. None when the email or
    /// username is already taken.
    async fn sign_up(&self, account: &NewAccount) -> Result<Option<User>, BackendError>;
}

// ============================================================================
// Change Feed
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    MenuItems,
    Orders,
    KitchenOrders,
    Restaurants,
    Users,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MenuItems => "menu_items",
            Self::Orders => "orders",
            Self::KitchenOrders => "kitchen_orders",
            Self::Restaurants => "restaurants",
            Self::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Wildcard, only meaningful in a filter
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "*",
        }
    }
}

/// One row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub restaurant_id: Option<i64>,
    #[serde(default)]
    pub record: serde_json::Value,
}

/// Which changes a subscriber wants
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub table: Table,
    pub restaurant_id: i64,
    pub kind: ChangeKind,
}

impl ChangeFilter {
    /// Every change to `table` for one tenant
    pub fn all(table: Table, restaurant_id: i64) -> Self {
        Self {
            table,
            restaurant_id,
            kind: ChangeKind::All,
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && event.restaurant_id == Some(self.restaurant_id)
            && (self.kind == ChangeKind::All || self.kind == event.kind)
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Lazy, unbounded stream of matching changes. Ends only when the source
    /// shuts down.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<BoxStream<'static, ChangeEvent>, BackendError>;
}
