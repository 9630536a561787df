use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::error::BackendError;
use crate::remote::{ChangeEvent, ChangeFeed, ChangeFilter, Table};

// ============================================================================
// Change Sync
// ============================================================================
//
// Every change notification is only a hint: the affected collection is
// refetched in full and replaces local state. Nothing is patched from the
// notification's record, so missed or reordered notifications converge on
// the next one.
//
// ============================================================================

/// Tables the session keeps in sync
pub const WATCHED_TABLES: [Table; 4] = [
    Table::Orders,
    Table::KitchenOrders,
    Table::MenuItems,
    Table::Restaurants,
];

/// Collection to reload after a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refetch {
    /// Active and completed orders
    Orders,
    KitchenBoard,
    Menu,
    Settings,
}

impl Refetch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::KitchenBoard => "kitchen_orders",
            Self::Menu => "menu_items",
            Self::Settings => "restaurants",
        }
    }
}

/// What to reload for `event`, if anything. Events for another tenant, or
/// without one, are stale and ignored.
pub fn plan_refetch(event: &ChangeEvent, restaurant_id: i64) -> Option<Refetch> {
    if event.restaurant_id != Some(restaurant_id) {
        tracing::debug!(
            table = event.table.as_str(),
            event_restaurant = ?event.restaurant_id,
            restaurant_id,
            "Ignoring change for another tenant"
        );
        return None;
    }

    match event.table {
        Table::Orders => Some(Refetch::Orders),
        Table::KitchenOrders => Some(Refetch::KitchenBoard),
        Table::MenuItems => Some(Refetch::Menu),
        Table::Restaurants => Some(Refetch::Settings),
        Table::Users => None,
    }
}

/// One stream of every watched table's changes for `restaurant_id`
pub async fn subscribe_all(
    feed: &dyn ChangeFeed,
    restaurant_id: i64,
) -> Result<BoxStream<'static, ChangeEvent>, BackendError> {
    let mut streams = Vec::with_capacity(WATCHED_TABLES.len());
    for table in WATCHED_TABLES {
        streams.push(feed.subscribe(ChangeFilter::all(table, restaurant_id)).await?);
    }

    tracing::info!(
        restaurant_id,
        tables = WATCHED_TABLES.len(),
        "Watching remote changes"
    );

    Ok(stream::select_all(streams).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::settings::RestaurantSettings;
    use crate::remote::{ChangeKind, InMemoryBackend, RemoteBackend};
    use rust_decimal::Decimal;

    fn event(table: Table, restaurant_id: Option<i64>) -> ChangeEvent {
        ChangeEvent {
            table,
            kind: ChangeKind::Update,
            restaurant_id,
            record: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_plan_refetch_per_table() {
        assert_eq!(plan_refetch(&event(Table::Orders, Some(1)), 1), Some(Refetch::Orders));
        assert_eq!(
            plan_refetch(&event(Table::KitchenOrders, Some(1)), 1),
            Some(Refetch::KitchenBoard)
        );
        assert_eq!(plan_refetch(&event(Table::MenuItems, Some(1)), 1), Some(Refetch::Menu));
        assert_eq!(
            plan_refetch(&event(Table::Restaurants, Some(1)), 1),
            Some(Refetch::Settings)
        );
        assert_eq!(plan_refetch(&event(Table::Users, Some(1)), 1), None);
    }

    #[test]
    fn test_stale_tenant_is_ignored() {
        assert_eq!(plan_refetch(&event(Table::Orders, Some(2)), 1), None);
        assert_eq!(plan_refetch(&event(Table::Orders, None), 1), None);
    }

    #[tokio::test]
    async fn test_subscribe_all_merges_tables() {
        let backend = InMemoryBackend::new();
        let mut changes = subscribe_all(&backend, 1).await.unwrap();

        backend
            .add_menu_item(1, &MenuItem::new(0, "Tea", Decimal::ONE, "Drinks"))
            .await
            .unwrap();
        backend.put_settings(RestaurantSettings::placeholder(1)).await;

        let first = changes.next().await.unwrap();
        let second = changes.next().await.unwrap();

        let mut tables = vec![first.table, second.table];
        tables.sort_by_key(|t| t.as_str());
        assert_eq!(tables, vec![Table::MenuItems, Table::Restaurants]);
    }
}
