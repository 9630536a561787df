use chrono::Utc;
use rust_decimal::Decimal;

use super::{Current, Session};
use crate::dashboard::{self, Page, SalesSummary};
use crate::domain::kitchen::KitchenStatus;
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::domain::order::{Order, TaxPolicy};
use crate::domain::settings::RestaurantSettings;
use crate::error::{PosResult, ValidationError};
use crate::receipt;

// ============================================================================
// Session - settings, menu, kitchen and reporting
// ============================================================================

fn validate_menu_item(item: &MenuItem) -> Result<(), ValidationError> {
    if item.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if item.category.trim().is_empty() {
        return Err(ValidationError::MissingField("category"));
    }
    if item.price < Decimal::ZERO {
        return Err(ValidationError::InvalidNumber {
            field: "price",
            reason: "cannot be negative",
        });
    }
    Ok(())
}

impl Session {
    // ========================================================================
    // Settings
    // ========================================================================

    /// Save restaurant settings and re-bill the current order with the new tax
    pub async fn update_settings(&mut self, mut settings: RestaurantSettings) -> PosResult<()> {
        settings.validate()?;
        settings.id = self.restaurant_id();

        let saved = match self.deps.backend.clone() {
            Some(backend) => backend
                .update_settings(self.restaurant_id(), &settings)
                .await
                .map_err(|e| self.backend_failed("update_settings", e))?,
            None => settings,
        };

        self.apply_settings(saved).await
    }

    pub(super) async fn apply_settings(&mut self, settings: RestaurantSettings) -> PosResult<()> {
        let policy = TaxPolicy::from_settings(&settings, &self.deps.default_tax);
        tracing::info!(
            restaurant_id = settings.id,
            tax = %policy.label(),
            table_count = ?settings.table_count,
            "Restaurant settings applied"
        );

        self.settings = settings;
        self.handler.set_policy(policy);

        // Confirmed orders keep the totals they were sent with
        match &mut self.current {
            Current::Draft(order) => order.reprice(self.handler.policy()),
            Current::Registered(id) => {
                let id = *id;
                if let Some(order) = self.store.find_active(id).filter(|order| order.is_pending()) {
                    let mut order = order.clone();
                    order.reprice(self.handler.policy());
                    self.store.put_active(id, order).await?;
                }
            }
            Current::None => {}
        }
        Ok(())
    }

    // ========================================================================
    // Menu Management
    // ========================================================================

    pub async fn create_menu_item(&mut self, item: MenuItem) -> PosResult<MenuItem> {
        validate_menu_item(&item)?;

        let created = match self.deps.backend.clone() {
            Some(backend) => backend
                .add_menu_item(self.restaurant_id(), &item)
                .await
                .map_err(|e| self.backend_failed("add_menu_item", e))?,
            None => {
                let id = self.catalog.items().iter().map(|i| i.id).max().unwrap_or(0).max(0) + 1;
                MenuItem { id, ..item }
            }
        };

        tracing::info!(menu_item_id = created.id, name = %created.name, "Menu item created");
        self.catalog.upsert(created.clone());
        Ok(created)
    }

    pub async fn update_menu_item(&mut self, item: MenuItem) -> PosResult<MenuItem> {
        validate_menu_item(&item)?;
        if self.catalog.get(item.id).is_none() {
            return Err(ValidationError::UnknownMenuItem(item.id).into());
        }

        let updated = match self.deps.backend.clone() {
            Some(backend) => backend
                .update_menu_item(self.restaurant_id(), &item)
                .await
                .map_err(|e| self.backend_failed("update_menu_item", e))?,
            None => item,
        };

        tracing::info!(menu_item_id = updated.id, name = %updated.name, "Menu item updated");
        self.catalog.upsert(updated.clone());
        Ok(updated)
    }

    /// Existing order lines keep their copy of the item
    pub async fn delete_menu_item(&mut self, id: MenuItemId) -> PosResult<()> {
        if self.catalog.get(id).is_none() {
            return Err(ValidationError::UnknownMenuItem(id).into());
        }

        if let Some(backend) = self.deps.backend.clone() {
            backend
                .delete_menu_item(self.restaurant_id(), id)
                .await
                .map_err(|e| self.backend_failed("delete_menu_item", e))?;
        }

        self.catalog.remove(id);
        tracing::info!(menu_item_id = id, "Menu item deleted");
        Ok(())
    }

    // ========================================================================
    // Kitchen
    // ========================================================================

    /// Update the board right away; put the old status back if the backend
    /// rejects it
    pub async fn set_kitchen_status(&mut self, id: i64, status: KitchenStatus) -> PosResult<()> {
        let previous = self
            .kitchen
            .mark(id, status)
            .ok_or(ValidationError::UnknownKitchenOrder(id))?;

        if let Some(backend) = self.deps.backend.clone() {
            if let Err(e) = backend
                .update_kitchen_status(self.restaurant_id(), id, status)
                .await
            {
                self.kitchen.mark(id, previous);
                return Err(self.backend_failed("update_kitchen_status", e));
            }
        }

        tracing::debug!(kitchen_order_id = id, ?previous, ?status, "Kitchen status changed");
        Ok(())
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    pub fn sales_summary(&self) -> SalesSummary {
        dashboard::summarize(self.store.history(), Utc::now().date_naive())
    }

    /// Completed orders, newest first, one page at a time
    pub fn history_page(&self, page: usize, per_page: usize) -> Page<Order> {
        dashboard::paginate(self.store.history(), page, per_page)
    }

    pub fn receipt(&self, order: &Order) -> String {
        receipt::render(order, &self.settings)
    }
}
