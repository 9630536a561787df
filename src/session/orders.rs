use chrono::Utc;
use rust_decimal::Decimal;

use super::{Current, Session};
use crate::dialogs::{CustomItemForm, DeliveryDetailsForm, PortionPicker};
use crate::domain::kitchen::{KitchenOrder, KitchenStatus};
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::domain::order::{
    Order, OrderCommand, OrderError, OrderId, OrderType, PaymentMethod,
};
use crate::error::{PosResult, ValidationError};
use crate::event_sourcing::Aggregate;

// ============================================================================
// Session - order operations
// ============================================================================
//
// Every edit runs through the command handler on a copy of the current
// order and is committed only when the handler accepts it.
//
// Where the result goes:
// - draft            : kept in the session only
// - pending, stored  : active collection (local only)
// - confirmed        : active collection first, then the backend; a backend
//                      failure puts the previous order back
//
// ============================================================================

fn order_type_label(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::DineIn => "dine-in",
        OrderType::Delivery => "delivery",
    }
}

impl Session {
    /// Add one of a catalog item to the current order
    pub async fn add_item(&mut self, menu_item_id: MenuItemId) -> PosResult<()> {
        if self.current_order().is_none() {
            return Err(self.context_error().into());
        }
        let item = self
            .catalog
            .get(menu_item_id)
            .cloned()
            .ok_or(ValidationError::UnknownMenuItem(menu_item_id))?;

        self.run(OrderCommand::AddItem { item }).await
    }

    /// Add the portion chosen in the picker
    pub async fn add_portion(&mut self, picker: PortionPicker) -> PosResult<()> {
        let item = picker.confirm();
        self.run(OrderCommand::AddItem { item }).await
    }

    /// Add an off-menu item. It gets a negative id that never collides with
    /// the catalog or with custom lines already on any known order.
    pub async fn add_custom_item(&mut self, form: &CustomItemForm) -> PosResult<MenuItem> {
        if self.current_order().is_none() {
            return Err(self.context_error().into());
        }

        let item = form.submit(self.next_custom_id())?;
        self.run(OrderCommand::AddItem { item: item.clone() }).await?;
        Ok(item)
    }

    /// Set a line's quantity; zero or less removes the line
    pub async fn update_quantity(&mut self, menu_item_id: MenuItemId, quantity: i64) -> PosResult<()> {
        self.run(OrderCommand::UpdateQuantity {
            menu_item_id,
            quantity,
        })
        .await
    }

    pub async fn remove_item(&mut self, menu_item_id: MenuItemId) -> PosResult<()> {
        self.run(OrderCommand::RemoveItem { menu_item_id }).await
    }

    /// Empty a confirmed order, or discard a pending one. Clearing a
    /// confirmed order that is already empty withdraws it and frees its slot.
    pub async fn clear_order(&mut self) -> PosResult<()> {
        let emptied = self
            .current_order()
            .filter(|order| order.is_confirmed() && order.is_empty())
            .cloned();

        match emptied {
            Some(order) => self.withdraw(order).await,
            None => self.run(OrderCommand::Clear).await,
        }
    }

    pub async fn apply_discount(&mut self, amount: Decimal) -> PosResult<()> {
        self.run(OrderCommand::ApplyDiscount { amount }).await
    }

    pub async fn set_delivery_details(&mut self, form: &DeliveryDetailsForm) -> PosResult<()> {
        let details = form.submit()?;
        self.run(OrderCommand::SetDeliveryDetails { details }).await
    }

    /// Send the current pending order to the kitchen. Returns its ticket id.
    pub async fn confirm_order(&mut self) -> PosResult<OrderId> {
        let Some(mut order) = self.current_order().cloned() else {
            return Err(self.context_error().into());
        };
        let pending_id = order.id;

        // Everything that can reject the confirmation is checked before the
        // order leaves the device
        order.handle_command(&OrderCommand::Confirm { ticket: 1 })?;
        if let (OrderType::DineIn, Some(table)) = (order.order_type, order.table_number) {
            if self.occupied_tables().contains(&table) {
                return Err(OrderError::TableOccupied(table).into());
            }
        }
        order.reprice(self.handler.policy());

        let ticket = match self.deps.backend.clone() {
            Some(backend) => backend
                .insert_order(self.restaurant_id(), &order)
                .await
                .map_err(|e| self.backend_failed("insert_order", e))?,
            None => self.next_local_ticket(),
        };

        self.handler
            .handle(&mut order, OrderCommand::Confirm { ticket })?;
        self.store.put_active(pending_id, order.clone()).await?;
        self.current = Current::Registered(order.id);

        self.send_to_kitchen(&order).await;

        self.deps.metrics.record_confirmed(order_type_label(order.order_type));
        self.deps.metrics.set_active_orders(self.store.active().len());
        tracing::info!(
            order_id = %order.id,
            order_type = %order.order_type,
            table = ?order.table_number,
            items = order.item_count(),
            total = %order.total,
            "Order confirmed"
        );

        Ok(order.id)
    }

    /// Take payment for the current confirmed order and archive it. The
    /// table stays selected and resolves to a fresh pending order.
    pub async fn complete_order(&mut self, payment_method: PaymentMethod) -> PosResult<Order> {
        let Some(mut order) = self.current_order().cloned() else {
            return Err(self.context_error().into());
        };

        self.handler
            .handle(&mut order, OrderCommand::Complete { payment_method })?;

        if let Some(backend) = self.deps.backend.clone() {
            backend
                .update_order(self.restaurant_id(), &order)
                .await
                .map_err(|e| self.backend_failed("complete_order", e))?;
        }

        self.store.archive(order.clone()).await?;

        self.deps
            .metrics
            .record_completed(&payment_method.to_string(), order.total);
        self.deps.metrics.set_active_orders(self.store.active().len());
        tracing::info!(
            order_id = %order.id,
            %payment_method,
            total = %order.total,
            "Order completed"
        );

        self.resolve_current().await?;
        Ok(order)
    }

    /// Apply `command` to the current order and store the result
    async fn run(&mut self, command: OrderCommand) -> PosResult<()> {
        let Some(previous) = self.current_order().cloned() else {
            return Err(self.context_error().into());
        };

        let mut order = previous.clone();
        let envelopes = self.handler.handle(&mut order, command)?;
        if envelopes.is_empty() {
            return Ok(());
        }

        if order.discarded {
            return self.release_discarded(previous).await;
        }

        if let Current::Draft(_) = self.current {
            self.current = Current::Draft(Box::new(order));
            return Ok(());
        }

        self.store.put_active(order.id, order.clone()).await?;
        if order.is_pending() {
            return Ok(());
        }

        let Some(backend) = self.deps.backend.clone() else {
            return Ok(());
        };
        if let Err(e) = backend.update_order(self.restaurant_id(), &order).await {
            let order_id = previous.id;
            if let Err(restore) = self.store.put_active(order_id, previous).await {
                tracing::error!(%order_id, error = %restore, "Failed to restore order after backend error");
            }
            return Err(self.backend_failed("update_order", e));
        }

        Ok(())
    }

    /// One below the lowest off-menu id on the draft, the active orders and
    /// history. These survive restarts and arrive from other terminals, so a
    /// per-session counter would reuse ids.
    fn next_custom_id(&self) -> MenuItemId {
        let draft = match &self.current {
            Current::Draft(order) => Some(order.as_ref()),
            _ => None,
        };

        self.store
            .active()
            .iter()
            .chain(self.store.history())
            .chain(draft)
            .flat_map(|order| &order.items)
            .map(|line| line.menu_item_id())
            .filter(|id| *id < 0)
            .min()
            .map_or(-1, |lowest| lowest - 1)
    }

    /// Remove an emptied confirmed order everywhere it was recorded
    async fn withdraw(&mut self, order: Order) -> PosResult<()> {
        if let (Some(backend), Some(ticket)) = (self.deps.backend.clone(), order.id.ticket()) {
            backend
                .delete_order(self.restaurant_id(), ticket)
                .await
                .map_err(|e| self.backend_failed("delete_order", e))?;
        }

        self.store.remove_active(order.id).await?;
        if let Some(ticket) = order.id.ticket() {
            self.kitchen.remove_for_order(ticket);
        }
        self.deps.metrics.set_active_orders(self.store.active().len());
        tracing::info!(order_id = %order.id, table = ?order.table_number, "Empty order withdrawn");

        if order.order_type == OrderType::DineIn {
            self.table = None;
        }
        self.resolve_current().await
    }

    /// A pending order was cleared: drop it and free its slot
    async fn release_discarded(&mut self, order: Order) -> PosResult<()> {
        if let Current::Registered(id) = self.current {
            self.store.remove_active(id).await?;
        }

        if !order.is_empty() {
            self.deps.metrics.record_discarded();
        }
        self.deps.metrics.set_active_orders(self.store.active().len());
        tracing::info!(
            order_id = %order.id,
            table = ?order.table_number,
            items = order.item_count(),
            "Pending order discarded"
        );

        if order.order_type == OrderType::DineIn {
            self.table = None;
        }
        self.resolve_current().await
    }

    async fn send_to_kitchen(&mut self, order: &Order) {
        let kitchen_order = match self.deps.backend.clone() {
            Some(backend) => match backend.create_kitchen_order(self.restaurant_id(), order).await {
                Ok(kitchen_order) => kitchen_order,
                Err(e) => {
                    // The order itself is stored; the board catches up on the next refetch
                    let _ = self.backend_failed("create_kitchen_order", e);
                    return;
                }
            },
            None => {
                let Some(ticket) = order.id.ticket() else {
                    return;
                };
                KitchenOrder {
                    id: self.kitchen.next_local_id(),
                    order_id: ticket,
                    created_at: Utc::now(),
                    items: order.items.clone(),
                    order_type: order.order_type,
                    table_number: order.table_number,
                    status: KitchenStatus::Preparing,
                }
            }
        };

        tracing::debug!(
            kitchen_order_id = kitchen_order.id,
            order_id = kitchen_order.order_id,
            "Kitchen order created"
        );
        self.kitchen.insert(kitchen_order);
    }

    /// Offline ticket numbers continue from the highest one on the device
    fn next_local_ticket(&self) -> i64 {
        self.store
            .active()
            .iter()
            .chain(self.store.history())
            .filter_map(|order| order.id.ticket())
            .max()
            .unwrap_or(0)
            + 1
    }
}
