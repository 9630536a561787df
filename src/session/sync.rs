use std::time::Instant;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use super::{Current, Session};
use crate::error::{PosError, PosResult};
use crate::remote::ChangeEvent;
use crate::sync::{plan_refetch, subscribe_all, Refetch};

// ============================================================================
// Session - remote change handling
// ============================================================================

/// Settings go first so the menu and orders are priced with the right tax
const FULL_REFRESH: [Refetch; 4] = [
    Refetch::Settings,
    Refetch::Menu,
    Refetch::Orders,
    Refetch::KitchenBoard,
];

impl Session {
    /// Change notifications for this tenant. Offline sessions get a stream
    /// that ends immediately.
    pub async fn subscribe_changes(&self) -> PosResult<BoxStream<'static, ChangeEvent>> {
        let Some(feed) = self.deps.feed.clone() else {
            tracing::debug!("No change feed configured");
            return Ok(stream::empty().boxed());
        };

        subscribe_all(feed.as_ref(), self.restaurant_id())
            .await
            .map_err(|e| self.backend_failed("subscribe", e))
    }

    /// React to one notification by reloading what it touched
    pub async fn handle_change(&mut self, event: &ChangeEvent) -> PosResult<Option<Refetch>> {
        self.deps
            .metrics
            .record_change_event(event.table.as_str(), event.kind.as_str());

        let Some(target) = plan_refetch(event, self.restaurant_id()) else {
            return Ok(None);
        };

        self.refetch(target).await?;
        Ok(Some(target))
    }

    /// Reload one collection from the backend; a no-op offline
    pub async fn refetch(&mut self, target: Refetch) -> PosResult<()> {
        let Some(backend) = self.deps.backend.clone() else {
            return Ok(());
        };
        let restaurant_id = self.restaurant_id();
        let started = Instant::now();

        match target {
            Refetch::Orders => {
                let active = backend
                    .active_orders(restaurant_id)
                    .await
                    .map_err(|e| self.backend_failed("active_orders", e))?;
                let history = backend
                    .completed_orders(restaurant_id)
                    .await
                    .map_err(|e| self.backend_failed("completed_orders", e))?;

                self.store.replace_from_remote(active, history).await?;
                self.deps.metrics.set_active_orders(self.store.active().len());
                self.reresolve_after_refetch().await?;
            }
            Refetch::KitchenBoard => {
                let orders = backend
                    .kitchen_orders(restaurant_id)
                    .await
                    .map_err(|e| self.backend_failed("kitchen_orders", e))?;
                self.kitchen.replace(orders);
            }
            Refetch::Menu => {
                let items = backend
                    .menu_items(restaurant_id)
                    .await
                    .map_err(|e| self.backend_failed("menu_items", e))?;
                self.catalog.replace(items);
            }
            Refetch::Settings => {
                let settings = backend
                    .settings(restaurant_id)
                    .await
                    .map_err(|e| self.backend_failed("settings", e))?;
                match settings {
                    Some(settings) => self.apply_settings(settings).await?,
                    None => tracing::warn!(restaurant_id, "No settings row for restaurant"),
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.deps.metrics.record_refetch(target.as_str(), elapsed);
        tracing::debug!(target = target.as_str(), elapsed_secs = elapsed, "Refetched");
        Ok(())
    }

    /// Reload everything. Failures leave the last-known state in place.
    pub(super) async fn refresh_all(&mut self) {
        for target in FULL_REFRESH {
            if let Err(e) = self.refetch(target).await {
                tracing::warn!(target = target.as_str(), error = %e, "Refresh failed, keeping local state");
            }
        }
    }

    /// The current order may have been completed or replaced elsewhere
    async fn reresolve_after_refetch(&mut self) -> Result<(), PosError> {
        let stale = match &self.current {
            Current::Registered(id) => self.store.find_active(*id).is_none(),
            Current::Draft(order) => order.is_empty(),
            Current::None => false,
        };

        if stale {
            tracing::debug!(
                order_type = %self.order_type,
                table = ?self.table,
                "Current order changed remotely, resolving again"
            );
            self.resolve_current().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::order::{OrderStatus, PaymentMethod, PaymentStatus, TableNumber};
    use crate::domain::settings::RestaurantSettings;
    use crate::remote::{ChangeKind, RemoteBackend, Table};
    use rust_decimal::Decimal;

    use super::*;

    #[tokio::test]
    async fn test_menu_change_is_refetched() {
        let backend = seeded_backend().await;
        let mut session = online(&backend).await;
        let mut changes = session.subscribe_changes().await.unwrap();

        backend
            .add_menu_item(RESTAURANT, &MenuItem::new(0, "Lassi", Decimal::from(2), "Drinks"))
            .await
            .unwrap();

        let event = changes.next().await.unwrap();
        let refetched = session.handle_change(&event).await.unwrap();

        assert_eq!(refetched, Some(Refetch::Menu));
        assert_eq!(session.menu().items().len(), 3);
        assert_eq!(
            session
                .metrics()
                .change_events
                .with_label_values(&["menu_items", "INSERT"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_other_tenant_change_is_ignored() {
        let backend = seeded_backend().await;
        let mut session = online(&backend).await;

        let event = ChangeEvent {
            table: Table::MenuItems,
            kind: ChangeKind::Delete,
            restaurant_id: Some(RESTAURANT + 1),
            record: serde_json::Value::Null,
        };

        assert_eq!(session.handle_change(&event).await.unwrap(), None);
        assert_eq!(session.menu().items().len(), 2);
    }

    #[tokio::test]
    async fn test_settings_change_reprices_current_order() {
        let backend = seeded_backend().await;
        let mut session = online(&backend).await;
        let burger = item_id(&session, "Burger");
        session.select_table(TableNumber(1)).await.unwrap();
        session.add_item(burger).await.unwrap();
        assert_eq!(session.bill().tax, "0.999".parse::<Decimal>().unwrap());

        let mut settings = RestaurantSettings::placeholder(RESTAURANT);
        settings.tax_enabled = true;
        settings.cgst_rate = Decimal::from(9);
        settings.igst_rate = Decimal::from(9);
        backend.put_settings(settings).await;

        session.refetch(Refetch::Settings).await.unwrap();

        assert_eq!(session.tax_policy().label(), "Tax (CGST 9% + IGST 9%)");
        assert_eq!(session.bill().tax, "1.7982".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn test_order_completed_elsewhere_leaves_current() {
        let backend = seeded_backend().await;
        let mut session = online(&backend).await;
        let burger = item_id(&session, "Burger");
        session.select_table(TableNumber(6)).await.unwrap();
        session.add_item(burger).await.unwrap();
        session.confirm_order().await.unwrap();

        // Another terminal takes payment
        let mut paid = session.current_order().cloned().unwrap();
        paid.status = OrderStatus::Completed;
        paid.payment_method = Some(PaymentMethod::Mobile);
        paid.payment_status = PaymentStatus::Paid;
        backend.update_order(RESTAURANT, &paid).await.unwrap();

        session.refetch(Refetch::Orders).await.unwrap();

        assert!(session.active_orders().is_empty());
        assert_eq!(session.history().len(), 1);
        let current = session.current_order().unwrap();
        assert!(current.is_pending());
        assert_eq!(current.table_number, Some(TableNumber(6)));
    }

    #[tokio::test]
    async fn test_offline_session_has_no_changes() {
        let mut session = Session::login(offline_deps(), user()).await.unwrap();

        let mut changes = session.subscribe_changes().await.unwrap();
        assert!(changes.next().await.is_none());
        assert!(session.refetch(Refetch::Orders).await.is_ok());
    }
}
