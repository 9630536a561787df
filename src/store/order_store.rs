use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::storage::LocalStorage;
use crate::domain::order::{Order, OrderId};
use crate::domain::user::User;
use crate::error::StorageError;

// ============================================================================
// Order Store - active and historical orders
// ============================================================================
//
// active   (`activeOrders.<restaurant_id>`) : pending + confirmed
// history  (`orders.<restaurant_id>`)       : completed, newest first
//
// Keys are per tenant so staff of another restaurant signing in on the same
// device never see these orders. Every mutation rewrites the whole owning
// collection.
//
// ============================================================================

pub const ACTIVE_ORDERS_KEY: &str = "activeOrders";
pub const HISTORY_KEY: &str = "orders";
pub const USER_KEY: &str = "user";

/// Storage key of a collection owned by one restaurant
pub fn scoped_key(base: &str, restaurant_id: i64) -> String {
    format!("{base}.{restaurant_id}")
}

pub struct OrderStore {
    storage: Arc<dyn LocalStorage>,
    active_key: String,
    history_key: String,
    active: Vec<Order>,
    history: Vec<Order>,
}

impl OrderStore {
    /// Reconstitute both collections. Absent or unreadable keys load as empty.
    pub async fn load(storage: Arc<dyn LocalStorage>, restaurant_id: i64) -> Self {
        let active_key = scoped_key(ACTIVE_ORDERS_KEY, restaurant_id);
        let history_key = scoped_key(HISTORY_KEY, restaurant_id);
        let active = read_json::<Vec<Order>>(storage.as_ref(), &active_key)
            .await
            .unwrap_or_default();
        let history = read_json::<Vec<Order>>(storage.as_ref(), &history_key)
            .await
            .unwrap_or_default();

        tracing::debug!(
            restaurant_id,
            active = active.len(),
            history = history.len(),
            "Loaded order store"
        );

        Self {
            storage,
            active_key,
            history_key,
            active,
            history,
        }
    }

    pub fn active(&self) -> &[Order] {
        &self.active
    }

    pub fn history(&self) -> &[Order] {
        &self.history
    }

    pub fn find_active(&self, id: OrderId) -> Option<&Order> {
        self.active.iter().find(|order| order.id == id)
    }

    /// Insert or replace the active entry stored under `previous_id`.
    /// Confirming passes the pending id so the ticketed order takes its place.
    pub async fn put_active(&mut self, previous_id: OrderId, order: Order) -> Result<(), StorageError> {
        let index = self
            .active
            .iter()
            .position(|o| o.id == previous_id || o.id == order.id);
        self.active.retain(|o| o.id != previous_id && o.id != order.id);

        match index {
            Some(index) => self.active.insert(index.min(self.active.len()), order),
            None => self.active.push(order),
        }
        self.persist_active().await
    }

    pub async fn remove_active(&mut self, id: OrderId) -> Result<Option<Order>, StorageError> {
        let Some(index) = self.active.iter().position(|order| order.id == id) else {
            return Ok(None);
        };

        let removed = self.active.remove(index);
        self.persist_active().await?;
        Ok(Some(removed))
    }

    /// Move a completed order from the active set to the front of history
    pub async fn archive(&mut self, order: Order) -> Result<(), StorageError> {
        self.active.retain(|o| o.id != order.id);
        self.history.retain(|o| o.id != order.id);
        self.history.insert(0, order);

        self.persist_active().await?;
        self.persist_history().await
    }

    /// Remote wins for every ticketed order. Locally held pending orders are
    /// never written remotely, so they survive the refetch.
    pub async fn replace_from_remote(
        &mut self,
        active: Vec<Order>,
        history: Vec<Order>,
    ) -> Result<(), StorageError> {
        let local_pending: Vec<Order> = self
            .active
            .drain(..)
            .filter(|order| order.id.is_pending())
            .collect();

        tracing::debug!(
            remote_active = active.len(),
            remote_history = history.len(),
            kept_pending = local_pending.len(),
            "Replacing orders from remote"
        );

        self.active = active;
        self.active.extend(local_pending);
        self.history = history;

        self.persist_active().await?;
        self.persist_history().await
    }

    async fn persist_active(&self) -> Result<(), StorageError> {
        write_json(self.storage.as_ref(), &self.active_key, &self.active).await
    }

    async fn persist_history(&self) -> Result<(), StorageError> {
        write_json(self.storage.as_ref(), &self.history_key, &self.history).await
    }
}

// ============================================================================
// Persisted user
// ============================================================================

pub async fn load_user(storage: &dyn LocalStorage) -> Option<User> {
    read_json(storage, USER_KEY).await
}

pub async fn save_user(storage: &dyn LocalStorage, user: &User) -> Result<(), StorageError> {
    write_json(storage, USER_KEY, user).await
}

pub async fn clear_user(storage: &dyn LocalStorage) -> Result<(), StorageError> {
    storage.remove(USER_KEY).await
}

async fn read_json<T: DeserializeOwned>(storage: &dyn LocalStorage, key: &str) -> Option<T> {
    let raw = match storage.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read local storage");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring unreadable local storage entry");
            None
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(
    storage: &dyn LocalStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(value)?;
    storage.set(key, json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::order::{OrderCommand, TableNumber};
    use crate::event_sourcing::Aggregate;
    use crate::store::MemoryStorage;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order_with_item() -> Order {
        let mut order = Order::dine_in(TableNumber(2));
        order
            .execute(
                &OrderCommand::AddItem {
                    item: MenuItem::new(1, "Paneer", Decimal::from(6), "Mains"),
                },
                Uuid::new_v4(),
            )
            .unwrap();
        order
    }

    fn confirmed(ticket: i64) -> Order {
        let mut order = order_with_item();
        order
            .execute(&OrderCommand::Confirm { ticket }, Uuid::new_v4())
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_absent_keys_load_empty() {
        let store = OrderStore::load(Arc::new(MemoryStorage::new()), 1).await;

        assert!(store.active().is_empty());
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_json_loads_empty() {
        let storage = MemoryStorage::new();
        storage
            .set(&scoped_key(ACTIVE_ORDERS_KEY, 1), "{not json".to_string())
            .await
            .unwrap();

        let store = OrderStore::load(Arc::new(storage), 1).await;
        assert!(store.active().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_persist_whole_collection() {
        let storage = MemoryStorage::new();
        let mut store = OrderStore::load(Arc::new(storage.clone()), 1).await;

        let order = confirmed(5);
        store.put_active(order.id, order.clone()).await.unwrap();

        let reloaded = OrderStore::load(Arc::new(storage), 1).await;
        assert_eq!(reloaded.active().len(), 1);
        assert_eq!(reloaded.active()[0].id, OrderId::Ticket(5));
    }

    #[tokio::test]
    async fn test_put_active_replaces_pending_entry() {
        let mut store = OrderStore::load(Arc::new(MemoryStorage::new()), 1).await;
        let pending = order_with_item();
        let pending_id = pending.id;
        store.put_active(pending_id, pending.clone()).await.unwrap();

        let mut ticketed = pending;
        ticketed
            .execute(&OrderCommand::Confirm { ticket: 9 }, Uuid::new_v4())
            .unwrap();
        store.put_active(pending_id, ticketed).await.unwrap();

        assert_eq!(store.active().len(), 1);
        assert!(store.find_active(pending_id).is_none());
        assert!(store.find_active(OrderId::Ticket(9)).is_some());
    }

    #[tokio::test]
    async fn test_archive_moves_to_front_of_history() {
        let storage = MemoryStorage::new();
        let mut store = OrderStore::load(Arc::new(storage.clone()), 1).await;
        let first = confirmed(1);
        let second = confirmed(2);
        store.put_active(first.id, first.clone()).await.unwrap();
        store.put_active(second.id, second.clone()).await.unwrap();

        store.archive(first).await.unwrap();
        store.archive(second).await.unwrap();

        assert!(store.active().is_empty());
        let ids: Vec<OrderId> = store.history().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId::Ticket(2), OrderId::Ticket(1)]);

        let reloaded = OrderStore::load(Arc::new(storage), 1).await;
        assert_eq!(reloaded.history().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_from_remote_keeps_local_pending() {
        let mut store = OrderStore::load(Arc::new(MemoryStorage::new()), 1).await;
        let pending = order_with_item();
        let stale = confirmed(3);
        store.put_active(pending.id, pending.clone()).await.unwrap();
        store.put_active(stale.id, stale).await.unwrap();

        store
            .replace_from_remote(vec![confirmed(4)], vec![])
            .await
            .unwrap();

        let ids: Vec<OrderId> = store.active().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId::Ticket(4), pending.id]);
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let storage = MemoryStorage::new();
        let user = User {
            id: 1,
            username: "asha".to_string(),
            role: "admin".to_string(),
            name: "Asha".to_string(),
            phone: None,
            email: "asha@example.com".to_string(),
            restaurant_id: 7,
        };

        assert!(load_user(&storage).await.is_none());
        save_user(&storage, &user).await.unwrap();
        assert_eq!(load_user(&storage).await, Some(user));
        clear_user(&storage).await.unwrap();
        assert!(load_user(&storage).await.is_none());
    }

    #[tokio::test]
    async fn test_restaurants_do_not_share_orders() {
        let storage = MemoryStorage::new();
        let mut first = OrderStore::load(Arc::new(storage.clone()), 1).await;
        let order = confirmed(3);
        first.put_active(order.id, order.clone()).await.unwrap();
        first.archive(confirmed(2)).await.unwrap();

        let second = OrderStore::load(Arc::new(storage.clone()), 2).await;
        assert!(second.active().is_empty());
        assert!(second.history().is_empty());

        let first_again = OrderStore::load(Arc::new(storage.clone()), 1).await;
        assert_eq!(first_again.active().len(), 1);
        assert_eq!(first_again.history().len(), 1);
        assert!(storage.get("activeOrders.1").await.unwrap().is_some());
    }
}
