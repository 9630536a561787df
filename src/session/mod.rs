use std::sync::Arc;

use crate::dialogs::SwitchRequest;
use crate::domain::order::slots::{self, Resolution};
use crate::domain::order::{
    Bill, Order, OrderCommandHandler, OrderEvent, OrderId, OrderType, SwitchTarget, TableNumber,
    TaxPolicy,
};
use crate::domain::settings::RestaurantSettings;
use crate::domain::user::{NewAccount, User};
use crate::error::{BackendError, PosError, PosResult, ValidationError};
use crate::event_sourcing::EventEnvelope;
use crate::kitchen::KitchenBoard;
use crate::menu::MenuCatalog;
use crate::metrics::Metrics;
use crate::remote::{ChangeFeed, RemoteBackend};
use crate::store::order_store::{clear_user, load_user, save_user};
use crate::store::{LocalStorage, OrderStore};

mod manage;
mod orders;
mod sync;

// ============================================================================
// Session - application state of one signed-in terminal
// ============================================================================
//
// Lifecycle:
//   sign_up / sign_in / login / restore  ->  Session  ->  logout
//
// The session owns every collection the screens read (orders, menu, kitchen
// board, settings) and is the only writer. One task drives it; remote change
// notifications are fed back in through `handle_change`.
//
// Current order context:
//   order type + table  --slots::resolve-->  Registered(id) | Draft | None
//
// Pending dine-in orders stay drafts until confirmed. Pending delivery
// orders are registered in the active collection right away.
//
// ============================================================================

/// Collaborators a session is built from
#[derive(Clone)]
pub struct SessionDeps {
    pub storage: Arc<dyn LocalStorage>,
    /// None runs offline: tickets and kitchen ids come from local sequences
    pub backend: Option<Arc<dyn RemoteBackend>>,
    pub feed: Option<Arc<dyn ChangeFeed>>,
    pub metrics: Arc<Metrics>,
    /// Tax applied until restaurant settings say otherwise
    pub default_tax: TaxPolicy,
}

impl SessionDeps {
    pub fn offline(storage: Arc<dyn LocalStorage>, metrics: Arc<Metrics>) -> Self {
        Self {
            storage,
            backend: None,
            feed: None,
            metrics,
            default_tax: TaxPolicy::default(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn RemoteBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_default_tax(mut self, policy: TaxPolicy) -> Self {
        self.default_tax = policy;
        self
    }
}

/// Result of asking to change the order context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched,
    /// Unconfirmed items would be lost; call `confirm_switch` or `cancel_switch`
    NeedsConfirmation(SwitchRequest),
}

#[derive(Debug, Clone)]
enum Current {
    None,
    Registered(OrderId),
    Draft(Box<Order>),
}

pub struct Session {
    deps: SessionDeps,
    user: User,
    settings: RestaurantSettings,
    store: OrderStore,
    catalog: MenuCatalog,
    kitchen: KitchenBoard,
    handler: OrderCommandHandler,

    order_type: OrderType,
    table: Option<TableNumber>,
    current: Current,
    pending_switch: Option<SwitchRequest>,
}

impl Session {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Check credentials against the backend, then log in
    pub async fn sign_in(deps: SessionDeps, identifier: &str, password: &str) -> PosResult<Self> {
        if identifier.trim().is_empty() {
            return Err(ValidationError::MissingField("identifier").into());
        }
        let Some(backend) = deps.backend.clone() else {
            return Err(BackendError::Unavailable.into());
        };

        let user = backend
            .sign_in(identifier.trim(), password)
            .await
            .map_err(|e| {
                deps.metrics.record_backend_error("sign_in");
                PosError::from(e)
            })?
            .ok_or(ValidationError::InvalidCredentials)?;

        Self::login(deps, user).await
    }

    /// Open a new restaurant with its owner account, then log the owner in
    pub async fn sign_up(deps: SessionDeps, account: NewAccount) -> PosResult<Self> {
        let Some(backend) = deps.backend.clone() else {
            return Err(BackendError::Unavailable.into());
        };

        let user = backend
            .sign_up(&account)
            .await
            .map_err(|e| {
                deps.metrics.record_backend_error("sign_up");
                PosError::from(e)
            })?
            .ok_or(ValidationError::AccountExists)?;

        tracing::info!(
            user_id = user.id,
            restaurant_id = user.restaurant_id,
            username = %user.username,
            "Restaurant account created"
        );
        Self::login(deps, user).await
    }

    /// Persist the user, load local orders, then pull everything remote.
    /// Remote failures are logged and leave the last-known local state.
    pub async fn login(deps: SessionDeps, user: User) -> PosResult<Self> {
        save_user(deps.storage.as_ref(), &user).await?;
        let store = OrderStore::load(deps.storage.clone(), user.restaurant_id).await;

        let handler = OrderCommandHandler::new(deps.default_tax.clone()).with_user(user.id);
        let settings = RestaurantSettings::placeholder(user.restaurant_id);

        let mut session = Self {
            deps,
            user,
            settings,
            store,
            catalog: MenuCatalog::default(),
            kitchen: KitchenBoard::default(),
            handler,
            order_type: OrderType::DineIn,
            table: None,
            current: Current::None,
            pending_switch: None,
        };

        session.refresh_all().await;
        session.deps.metrics.set_active_orders(session.store.active().len());

        tracing::info!(
            user_id = session.user.id,
            restaurant_id = session.user.restaurant_id,
            online = session.is_online(),
            active_orders = session.store.active().len(),
            menu_items = session.catalog.items().len(),
            "Session started"
        );

        Ok(session)
    }

    /// Resume the persisted user, if any
    pub async fn restore(deps: SessionDeps) -> PosResult<Option<Self>> {
        match load_user(deps.storage.as_ref()).await {
            Some(user) => Ok(Some(Self::login(deps, user).await?)),
            None => Ok(None),
        }
    }

    /// Forget the user and drop all session state. Locally stored orders
    /// stay on the device.
    pub async fn logout(self) -> PosResult<()> {
        clear_user(self.deps.storage.as_ref()).await?;
        tracing::info!(user_id = self.user.id, "Session ended");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn restaurant_id(&self) -> i64 {
        self.user.restaurant_id
    }

    pub fn is_online(&self) -> bool {
        self.deps.backend.is_some()
    }

    pub fn settings(&self) -> &RestaurantSettings {
        &self.settings
    }

    pub fn tax_policy(&self) -> &TaxPolicy {
        self.handler.policy()
    }

    pub fn menu(&self) -> &MenuCatalog {
        &self.catalog
    }

    pub fn kitchen(&self) -> &KitchenBoard {
        &self.kitchen
    }

    pub fn active_orders(&self) -> &[Order] {
        self.store.active()
    }

    pub fn history(&self) -> &[Order] {
        self.store.history()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.deps.metrics
    }

    /// Recent order events, oldest first
    pub fn recent_events(&self) -> impl Iterator<Item = &EventEnvelope<OrderEvent>> {
        self.handler.recent()
    }

    // ========================================================================
    // Order Context
    // ========================================================================

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn table(&self) -> Option<TableNumber> {
        self.table
    }

    pub fn current_order(&self) -> Option<&Order> {
        match &self.current {
            Current::None => None,
            Current::Registered(id) => self.store.find_active(*id),
            Current::Draft(order) => Some(order),
        }
    }

    /// Totals of the current order; zero when there is none
    pub fn bill(&self) -> Bill {
        self.current_order().map(Order::bill).unwrap_or_default()
    }

    pub fn occupied_tables(&self) -> std::collections::BTreeSet<TableNumber> {
        slots::occupied_tables(self.store.active())
    }

    pub fn pending_switch(&self) -> Option<&SwitchRequest> {
        self.pending_switch.as_ref()
    }

    pub async fn set_order_type(&mut self, order_type: OrderType) -> PosResult<SwitchOutcome> {
        if order_type == self.order_type {
            return Ok(SwitchOutcome::Switched);
        }
        self.request_switch(SwitchTarget::OrderType(order_type)).await
    }

    pub async fn select_table(&mut self, table: TableNumber) -> PosResult<SwitchOutcome> {
        self.validate_table(table)?;
        if self.order_type == OrderType::DineIn && self.table == Some(table) {
            return Ok(SwitchOutcome::Switched);
        }
        self.request_switch(SwitchTarget::Table(table)).await
    }

    /// Make an order from the active collection current
    pub async fn select_order(&mut self, id: OrderId) -> PosResult<SwitchOutcome> {
        if self.store.find_active(id).is_none() {
            return Err(ValidationError::UnknownOrder(id.to_string()).into());
        }
        if self.current_order().map(|order| order.id) == Some(id) {
            return Ok(SwitchOutcome::Switched);
        }
        self.request_switch(SwitchTarget::Order(id)).await
    }

    /// Discard the unconfirmed order and carry out the waiting switch
    pub async fn confirm_switch(&mut self) -> PosResult<()> {
        let request = self
            .pending_switch
            .take()
            .ok_or(ValidationError::NoPendingSwitch)?;

        self.discard_current().await?;
        self.apply_switch(request.target).await
    }

    /// Drop the waiting switch; returns whether there was one
    pub fn cancel_switch(&mut self) -> bool {
        self.pending_switch.take().is_some()
    }

    fn validate_table(&self, table: TableNumber) -> Result<(), ValidationError> {
        if table.0 == 0 {
            return Err(ValidationError::InvalidNumber {
                field: "table",
                reason: "tables are numbered from 1",
            });
        }
        match self.settings.table_count {
            Some(max) if table.0 > max => Err(ValidationError::TableOutOfRange { table: table.0, max }),
            _ => Ok(()),
        }
    }

    async fn request_switch(&mut self, target: SwitchTarget) -> PosResult<SwitchOutcome> {
        let unconfirmed = self
            .current_order()
            .filter(|order| slots::needs_switch_confirmation(Some(order)))
            .map(|order| order.id);

        if let Some(discarding) = unconfirmed {
            let request = SwitchRequest { target, discarding };
            tracing::debug!(order_id = %discarding, ?target, "Switch needs confirmation");
            self.pending_switch = Some(request);
            return Ok(SwitchOutcome::NeedsConfirmation(request));
        }

        self.pending_switch = None;
        self.apply_switch(target).await?;
        Ok(SwitchOutcome::Switched)
    }

    async fn apply_switch(&mut self, target: SwitchTarget) -> PosResult<()> {
        match target {
            SwitchTarget::OrderType(order_type) => {
                self.order_type = order_type;
                if order_type == OrderType::Delivery {
                    self.table = None;
                }
                self.resolve_current().await?;
            }
            SwitchTarget::Table(table) => {
                self.order_type = OrderType::DineIn;
                self.table = Some(table);
                self.resolve_current().await?;
            }
            SwitchTarget::Order(id) => {
                let Some(order) = self.store.find_active(id) else {
                    return Err(ValidationError::UnknownOrder(id.to_string()).into());
                };
                self.order_type = order.order_type;
                self.table = order.table_number;
                self.current = Current::Registered(id);
            }
        }

        tracing::debug!(
            order_type = %self.order_type,
            table = ?self.table,
            order_id = ?self.current_order().map(|order| order.id),
            "Order context switched"
        );
        Ok(())
    }

    /// Point `current` at whatever order the type and table map to
    async fn resolve_current(&mut self) -> PosResult<()> {
        self.current = match slots::resolve(self.store.active(), self.order_type, self.table) {
            Resolution::Existing(id) => Current::Registered(id),
            Resolution::Synthesized { mut order, register } => {
                order.reprice(self.handler.policy());
                if register {
                    let id = order.id;
                    self.store.put_active(id, order).await?;
                    self.deps.metrics.set_active_orders(self.store.active().len());
                    Current::Registered(id)
                } else {
                    Current::Draft(Box::new(order))
                }
            }
            Resolution::NoContext => Current::None,
        };
        Ok(())
    }

    /// Throw away the current order if it is still pending
    async fn discard_current(&mut self) -> PosResult<()> {
        let discarded = match std::mem::replace(&mut self.current, Current::None) {
            Current::Registered(id) if self.store.find_active(id).is_some_and(Order::is_pending) => {
                self.store.remove_active(id).await?
            }
            Current::Draft(order) => Some(*order),
            other => {
                self.current = other;
                None
            }
        };

        if let Some(order) = discarded {
            if !order.is_empty() {
                self.deps.metrics.record_discarded();
            }
            self.deps.metrics.set_active_orders(self.store.active().len());
            tracing::info!(order_id = %order.id, items = order.item_count(), "Pending order discarded");
        }
        Ok(())
    }

    fn context_error(&self) -> ValidationError {
        match (self.order_type, self.table) {
            (OrderType::DineIn, None) => ValidationError::NoTableSelected,
            _ => ValidationError::NoOrderSelected,
        }
    }

    /// Record a failed backend call and turn it into the caller's error
    fn backend_failed(&self, operation: &'static str, error: BackendError) -> PosError {
        tracing::warn!(operation, error = %error, "Backend call failed");
        self.deps.metrics.record_backend_error(operation);
        error.into()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::remote::InMemoryBackend;
    use crate::store::MemoryStorage;
    use rust_decimal::Decimal;

    pub const RESTAURANT: i64 = 1;

    pub fn user() -> User {
        User {
            id: 7,
            username: "asha".to_string(),
            role: "admin".to_string(),
            name: "Asha".to_string(),
            phone: Some(5550100),
            email: "asha@example.com".to_string(),
            restaurant_id: RESTAURANT,
        }
    }

    pub fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new().unwrap())
    }

    pub fn offline_deps() -> SessionDeps {
        SessionDeps::offline(Arc::new(MemoryStorage::new()), metrics())
    }

    /// Backend seeded with a small menu: Burger 9.99, Fries 3.99
    pub async fn seeded_backend() -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new());
        for item in [
            MenuItem::new(0, "Burger", Decimal::new(999, 2), "Mains"),
            MenuItem::new(0, "Fries", Decimal::new(399, 2), "Sides"),
        ] {
            backend.add_menu_item(RESTAURANT, &item).await.unwrap();
        }
        backend
    }

    pub async fn online(backend: &Arc<InMemoryBackend>) -> Session {
        let deps = offline_deps()
            .with_backend(backend.clone())
            .with_feed(backend.clone());
        Session::login(deps, user()).await.unwrap()
    }

    pub fn item_id(session: &Session, name: &str) -> i64 {
        session
            .menu()
            .items()
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.id)
            .unwrap()
    }
}
