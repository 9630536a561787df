use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use super::rows::{KitchenOrderRow, MenuItemRow, OrderRow};
use super::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, RemoteBackend, Table};
use crate::domain::kitchen::{KitchenOrder, KitchenStatus};
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::domain::order::{Order, OrderStatus, PaymentStatus};
use crate::domain::settings::RestaurantSettings;
use crate::domain::user::{NewAccount, User};
use crate::error::BackendError;

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// Keeps the same row shapes the hosted database stores and publishes a
// ChangeEvent for every write, so the session sees exactly what it would
// see against the real thing. Used offline and in tests.
//
// ============================================================================

const BROADCAST_CAPACITY: usize = 256;

#[derive(Default)]
struct State {
    menu: Vec<MenuItemRow>,
    orders: Vec<OrderRow>,
    kitchen: Vec<KitchenOrderRow>,
    restaurants: Vec<RestaurantSettings>,
    users: Vec<(User, String)>,
    next_menu_id: i64,
    next_order_id: i64,
    next_kitchen_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

pub struct InMemoryBackend {
    state: Mutex<State>,
    changes: broadcast::Sender<ChangeEvent>,
    failing: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            changes,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every call fail with `BackendError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn add_user(&self, user: User, password: impl Into<String>) {
        self.state.lock().await.users.push((user, password.into()));
    }

    pub async fn put_settings(&self, settings: RestaurantSettings) {
        let mut state = self.state.lock().await;
        state.restaurants.retain(|s| s.id != settings.id);
        state.restaurants.push(settings.clone());
        drop(state);

        self.emit(Table::Restaurants, ChangeKind::Update, settings.id, &settings);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable);
        }
        Ok(())
    }

    fn emit<T: Serialize>(&self, table: Table, kind: ChangeKind, restaurant_id: i64, record: &T) {
        let event = ChangeEvent {
            table,
            kind,
            restaurant_id: Some(restaurant_id),
            record: serde_json::to_value(record).unwrap_or_default(),
        };

        // No subscribers is fine
        let _ = self.changes.send(event);
    }

    async fn orders_where(
        &self,
        restaurant_id: i64,
        paid: bool,
    ) -> Result<Vec<Order>, BackendError> {
        self.check()?;
        let mut rows: Vec<OrderRow> = self
            .state
            .lock()
            .await
            .orders
            .iter()
            .filter(|row| row.restaurant_id == restaurant_id)
            .filter(|row| (row.payment_status == PaymentStatus::Paid) == paid)
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.into_iter().map(OrderRow::into_order).collect()
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn menu_items(&self, restaurant_id: i64) -> Result<Vec<MenuItem>, BackendError> {
        self.check()?;
        let mut rows: Vec<MenuItemRow> = self
            .state
            .lock()
            .await
            .menu
            .iter()
            .filter(|row| row.restaurant_id == Some(restaurant_id))
            .cloned()
            .collect();

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows.into_iter().map(MenuItemRow::into_item).collect()
    }

    async fn add_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let mut row = MenuItemRow::from_item(item, Some(restaurant_id));
        row.id = Some(next(&mut state.next_menu_id));
        state.menu.push(row.clone());
        drop(state);

        self.emit(Table::MenuItems, ChangeKind::Insert, restaurant_id, &row);
        row.into_item()
    }

    async fn update_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let slot = state
            .menu
            .iter_mut()
            .find(|row| row.id == Some(item.id) && row.restaurant_id == Some(restaurant_id))
            .ok_or(BackendError::NotFound { table: "menu_items" })?;
        *slot = MenuItemRow::from_item(item, Some(restaurant_id));
        let row = slot.clone();
        drop(state);

        self.emit(Table::MenuItems, ChangeKind::Update, restaurant_id, &row);
        row.into_item()
    }

    async fn delete_menu_item(&self, restaurant_id: i64, id: MenuItemId) -> Result<(), BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let before = state.menu.len();
        state
            .menu
            .retain(|row| !(row.id == Some(id) && row.restaurant_id == Some(restaurant_id)));
        let removed = state.menu.len() != before;
        drop(state);

        if removed {
            self.emit(Table::MenuItems, ChangeKind::Delete, restaurant_id, &serde_json::json!({ "id": id }));
        }
        Ok(())
    }

    async fn active_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError> {
        self.orders_where(restaurant_id, false).await
    }

    async fn completed_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError> {
        self.orders_where(restaurant_id, true).await
    }

    async fn insert_order(&self, restaurant_id: i64, order: &Order) -> Result<i64, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let mut row = OrderRow::from_order(order, restaurant_id);
        let ticket = next(&mut state.next_order_id);
        row.id = Some(ticket);
        row.status = OrderStatus::Confirmed;
        state.orders.push(row.clone());
        drop(state);

        self.emit(Table::Orders, ChangeKind::Insert, restaurant_id, &row);
        Ok(ticket)
    }

    async fn update_order(&self, restaurant_id: i64, order: &Order) -> Result<(), BackendError> {
        self.check()?;
        let ticket = order.id.ticket().ok_or(BackendError::NotFound { table: "orders" })?;

        let mut state = self.state.lock().await;
        let slot = state
            .orders
            .iter_mut()
            .find(|row| row.id == Some(ticket) && row.restaurant_id == restaurant_id)
            .ok_or(BackendError::NotFound { table: "orders" })?;
        *slot = OrderRow::from_order(order, restaurant_id);
        let row = slot.clone();
        drop(state);

        self.emit(Table::Orders, ChangeKind::Update, restaurant_id, &row);
        Ok(())
    }

    async fn delete_order(&self, restaurant_id: i64, ticket: i64) -> Result<(), BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        state
            .orders
            .retain(|row| !(row.id == Some(ticket) && row.restaurant_id == restaurant_id));
        state
            .kitchen
            .retain(|row| !(row.order_id == ticket && row.restaurant_id == restaurant_id));
        drop(state);

        self.emit(Table::Orders, ChangeKind::Delete, restaurant_id, &serde_json::json!({ "id": ticket }));
        Ok(())
    }

    async fn create_kitchen_order(&self, restaurant_id: i64, order: &Order) -> Result<KitchenOrder, BackendError> {
        self.check()?;
        let mut row = KitchenOrderRow::for_order(order, restaurant_id)?;

        let mut state = self.state.lock().await;
        row.id = Some(next(&mut state.next_kitchen_id));
        row.created_at = Some(Utc::now());
        state.kitchen.push(row.clone());
        drop(state);

        self.emit(Table::KitchenOrders, ChangeKind::Insert, restaurant_id, &row);
        row.into_kitchen_order()
    }

    async fn kitchen_orders(&self, restaurant_id: i64) -> Result<Vec<KitchenOrder>, BackendError> {
        self.check()?;
        let mut rows: Vec<KitchenOrderRow> = self
            .state
            .lock()
            .await
            .kitchen
            .iter()
            .filter(|row| row.restaurant_id == restaurant_id)
            .cloned()
            .collect();

        rows.sort_by_key(|row| row.created_at);
        rows.into_iter().map(KitchenOrderRow::into_kitchen_order).collect()
    }

    async fn update_kitchen_status(
        &self,
        restaurant_id: i64,
        id: i64,
        status: KitchenStatus,
    ) -> Result<(), BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let slot = state
            .kitchen
            .iter_mut()
            .find(|row| row.id == Some(id) && row.restaurant_id == restaurant_id)
            .ok_or(BackendError::NotFound { table: "kitchen_orders" })?;
        slot.status = status;
        let row = slot.clone();
        drop(state);

        self.emit(Table::KitchenOrders, ChangeKind::Update, restaurant_id, &row);
        Ok(())
    }

    async fn settings(&self, restaurant_id: i64) -> Result<Option<RestaurantSettings>, BackendError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .await
            .restaurants
            .iter()
            .find(|s| s.id == restaurant_id)
            .cloned())
    }

    async fn update_settings(
        &self,
        restaurant_id: i64,
        settings: &RestaurantSettings,
    ) -> Result<RestaurantSettings, BackendError> {
        self.check()?;
        let mut stored = settings.clone();
        stored.id = restaurant_id;
        self.put_settings(stored.clone()).await;
        Ok(stored)
    }

    async fn sign_in(&self, identifier: &str, password: &str) -> Result<Option<User>, BackendError> {
        self.check()?;
        let phone = identifier.trim().parse::<i64>().ok();

        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .find(|(user, _)| {
                user.email == identifier
                    || user.username == identifier
                    || (phone.is_some() && user.phone == phone)
            })
            .filter(|(_, stored)| stored == password)
            .map(|(user, _)| user.clone()))
    }

    async fn sign_up(&self, account: &NewAccount) -> Result<Option<User>, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let taken = state
            .users
            .iter()
            .any(|(user, _)| user.email == account.email || user.username == account.username);
        if taken {
            return Ok(None);
        }

        let restaurant_id = state
            .restaurants
            .iter()
            .map(|s| s.id)
            .chain(state.users.iter().map(|(user, _)| user.restaurant_id))
            .max()
            .unwrap_or(0)
            + 1;
        let mut settings = RestaurantSettings::placeholder(restaurant_id);
        settings.restaurant_name = account.restaurant_name();
        state.restaurants.push(settings.clone());

        let user_id = state.users.iter().map(|(user, _)| user.id).max().unwrap_or(0) + 1;
        let user = account.clone().into_user(user_id, restaurant_id);
        state.users.push((user.clone(), account.password.clone()));
        drop(state);

        self.emit(Table::Restaurants, ChangeKind::Insert, restaurant_id, &settings);
        Ok(Some(user))
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<BoxStream<'static, ChangeEvent>, BackendError> {
        let receiver = self.changes.subscribe();

        let events = stream::unfold((receiver, filter), |(mut receiver, filter)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if filter.matches(&event) => return Some((event, (receiver, filter))),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Each event only triggers a refetch, so skipping some is harmless
                        tracing::warn!(lagged = n, table = filter.table.as_str(), "Change subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderCommand, OrderId, PaymentMethod, TableNumber};
    use crate::event_sourcing::Aggregate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn dosa() -> MenuItem {
        MenuItem::new(0, "Dosa", Decimal::from(3), "Mains")
    }

    fn pending_with_item(item: MenuItem) -> Order {
        let mut order = Order::dine_in(TableNumber(1));
        order
            .execute(&OrderCommand::AddItem { item }, Uuid::new_v4())
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_menu_is_tenant_scoped() {
        let backend = InMemoryBackend::new();
        let stored = backend.add_menu_item(1, &dosa()).await.unwrap();
        backend.add_menu_item(2, &dosa()).await.unwrap();

        let menu = backend.menu_items(1).await.unwrap();
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].id, stored.id);
        assert!(stored.id > 0);
    }

    #[tokio::test]
    async fn test_orders_split_by_payment_status() {
        let backend = InMemoryBackend::new();
        let item = backend.add_menu_item(1, &dosa()).await.unwrap();

        let mut order = pending_with_item(item);
        let ticket = backend.insert_order(1, &order).await.unwrap();
        order
            .execute(&OrderCommand::Confirm { ticket }, Uuid::new_v4())
            .unwrap();

        assert_eq!(backend.active_orders(1).await.unwrap().len(), 1);
        assert!(backend.completed_orders(1).await.unwrap().is_empty());

        order
            .execute(
                &OrderCommand::Complete {
                    payment_method: PaymentMethod::Cash,
                },
                Uuid::new_v4(),
            )
            .unwrap();
        backend.update_order(1, &order).await.unwrap();

        assert!(backend.active_orders(1).await.unwrap().is_empty());
        let completed = backend.completed_orders(1).await.unwrap();
        assert_eq!(completed[0].id, OrderId::Ticket(ticket));
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_changes_only() {
        let backend = InMemoryBackend::new();
        let mut orders = backend
            .subscribe(ChangeFilter::all(Table::Orders, 1))
            .await
            .unwrap();

        backend.add_menu_item(1, &dosa()).await.unwrap();
        let item = backend.add_menu_item(1, &dosa()).await.unwrap();
        backend.insert_order(2, &pending_with_item(item.clone())).await.unwrap();
        backend.insert_order(1, &pending_with_item(item)).await.unwrap();

        let event = orders.next().await.unwrap();
        assert_eq!(event.table, Table::Orders);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.restaurant_id, Some(1));
        assert_eq!(event.record["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_failing_backend_reports_unavailable() {
        let backend = InMemoryBackend::new();
        backend.set_failing(true);

        assert!(matches!(
            backend.menu_items(1).await,
            Err(BackendError::Unavailable)
        ));

        backend.set_failing(false);
        assert!(backend.menu_items(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let backend = InMemoryBackend::new();
        let user = User {
            id: 1,
            username: "ravi".to_string(),
            role: "staff".to_string(),
            name: "Ravi".to_string(),
            phone: Some(5550123),
            email: "ravi@example.com".to_string(),
            restaurant_id: 1,
        };
        backend.add_user(user.clone(), "secret").await;

        assert_eq!(backend.sign_in("ravi", "secret").await.unwrap(), Some(user.clone()));
        assert_eq!(backend.sign_in("5550123", "secret").await.unwrap(), Some(user));
        assert_eq!(backend.sign_in("ravi", "wrong").await.unwrap(), None);
        assert_eq!(backend.sign_in("nobody", "secret").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_up_opens_a_restaurant() {
        let backend = InMemoryBackend::new();
        backend.put_settings(RestaurantSettings::placeholder(4)).await;
        let account = NewAccount {
            name: "Asha".to_string(),
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: Some(5550100),
            password: "secret".to_string(),
        };

        let user = backend.sign_up(&account).await.unwrap().unwrap();
        assert_eq!(user.role, "admin");
        assert_eq!(user.restaurant_id, 5);
        let settings = backend.settings(5).await.unwrap().unwrap();
        assert_eq!(settings.restaurant_name, "Asha's Restaurant");
        assert_eq!(backend.sign_in("5550100", "secret").await.unwrap(), Some(user));

        // Same username, different email
        let again = NewAccount {
            email: "other@example.com".to_string(),
            ..account
        };
        assert_eq!(backend.sign_up(&again).await.unwrap(), None);
        assert!(backend.settings(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kitchen_status_update() {
        let backend = InMemoryBackend::new();
        let item = backend.add_menu_item(1, &dosa()).await.unwrap();
        let mut order = pending_with_item(item);
        let ticket = backend.insert_order(1, &order).await.unwrap();
        order
            .execute(&OrderCommand::Confirm { ticket }, Uuid::new_v4())
            .unwrap();

        let kitchen = backend.create_kitchen_order(1, &order).await.unwrap();
        backend
            .update_kitchen_status(1, kitchen.id, KitchenStatus::Ready)
            .await
            .unwrap();

        let board = backend.kitchen_orders(1).await.unwrap();
        assert_eq!(board[0].status, KitchenStatus::Ready);
        assert_eq!(board[0].order_id, ticket);
    }
}
