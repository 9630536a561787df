use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::rows::{KitchenOrderRow, MenuItemRow, OrderRow, UserRow};
use super::RemoteBackend;
use crate::domain::kitchen::{KitchenOrder, KitchenStatus};
use crate::domain::menu::{MenuItem, MenuItemId};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::settings::RestaurantSettings;
use crate::domain::user::{NewAccount, User, OWNER_ROLE};
use crate::error::{BackendError, RestError};
use crate::rest::RestClient;

// ============================================================================
// PostgREST Backend
// ============================================================================
//
// Every table lives under /rest/v1/<table>. Reads are tenant-filtered with
// `restaurant_id=eq.N`; writes ask for the stored representation back.
//
// ============================================================================

const REST_PREFIX: &str = "rest/v1";

pub struct PostgrestBackend {
    client: RestClient,
}

impl PostgrestBackend {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn path(table: &str) -> String {
        format!("{REST_PREFIX}/{table}")
    }

    fn tenant(restaurant_id: i64) -> (&'static str, String) {
        ("restaurant_id", format!("eq.{restaurant_id}"))
    }

    /// First row of a `return=representation` response
    fn single<T>(rows: Vec<T>, table: &'static str) -> Result<T, BackendError> {
        rows.into_iter()
            .next()
            .ok_or(BackendError::NotFound { table })
    }

    async fn orders_where(
        &self,
        restaurant_id: i64,
        payment_filter: &str,
    ) -> Result<Vec<Order>, BackendError> {
        let rows: Vec<OrderRow> = self
            .client
            .get(
                &Self::path("orders"),
                &[
                    ("select", "*".to_string()),
                    Self::tenant(restaurant_id),
                    ("payment_status", payment_filter.to_string()),
                    ("order", "date.desc".to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn patch_rows<T: DeserializeOwned>(
        &self,
        table: &'static str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<T, BackendError> {
        let rows: Vec<T> = self.client.patch(&Self::path(table), query, body).await?;
        Self::single(rows, table)
    }
}

/// PostgREST `or=(...)` value; quoted so emails and spaces survive
fn sign_in_filter(identifier: &str) -> String {
    let quoted = identifier.replace('\\', "\\\\").replace('"', "\\\"");
    let mut conditions = vec![
        format!("email.eq.\"{quoted}\""),
        format!("username.eq.\"{quoted}\""),
    ];
    if let Ok(phone) = identifier.trim().parse::<i64>() {
        conditions.push(format!("phone.eq.{phone}"));
    }
    format!("({})", conditions.join(","))
}

/// PostgREST `or=(...)` value matching a taken email or username
fn sign_up_filter(account: &NewAccount) -> String {
    let quote = |value: &str| value.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "(email.eq.\"{}\",username.eq.\"{}\")",
        quote(&account.email),
        quote(&account.username)
    )
}

#[derive(serde::Deserialize)]
struct IdRow {
    id: i64,
}

#[async_trait]
impl RemoteBackend for PostgrestBackend {
    async fn menu_items(&self, restaurant_id: i64) -> Result<Vec<MenuItem>, BackendError> {
        let rows: Vec<MenuItemRow> = self
            .client
            .get(
                &Self::path("menu_items"),
                &[
                    ("select", "*".to_string()),
                    Self::tenant(restaurant_id),
                    ("order", "name.asc".to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(MenuItemRow::into_item).collect()
    }

    async fn add_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError> {
        let mut row = MenuItemRow::from_item(item, Some(restaurant_id));
        row.id = None;

        let rows: Vec<MenuItemRow> = self
            .client
            .post(&Self::path("menu_items"), &[], &row)
            .await?;
        Self::single(rows, "menu_items")?.into_item()
    }

    async fn update_menu_item(&self, restaurant_id: i64, item: &MenuItem) -> Result<MenuItem, BackendError> {
        let mut row = MenuItemRow::from_item(item, Some(restaurant_id));
        row.id = None;
        let body = serde_json::to_value(&row).map_err(RestError::from)?;

        let row: MenuItemRow = self
            .patch_rows(
                "menu_items",
                &[("id", format!("eq.{}", item.id)), Self::tenant(restaurant_id)],
                &body,
            )
            .await?;
        row.into_item()
    }

    async fn delete_menu_item(&self, restaurant_id: i64, id: MenuItemId) -> Result<(), BackendError> {
        let _: Value = self
            .client
            .delete(
                &Self::path("menu_items"),
                &[("id", format!("eq.{id}")), Self::tenant(restaurant_id)],
            )
            .await?;
        Ok(())
    }

    async fn active_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError> {
        self.orders_where(restaurant_id, "neq.paid").await
    }

    async fn completed_orders(&self, restaurant_id: i64) -> Result<Vec<Order>, BackendError> {
        self.orders_where(restaurant_id, "eq.paid").await
    }

    async fn insert_order(&self, restaurant_id: i64, order: &Order) -> Result<i64, BackendError> {
        let mut row = OrderRow::from_order(order, restaurant_id);
        row.id = None;
        row.status = OrderStatus::Confirmed;

        let rows: Vec<OrderRow> = self.client.post(&Self::path("orders"), &[], &row).await?;
        Self::single(rows, "orders")?
            .id
            .ok_or(BackendError::NotFound { table: "orders" })
    }

    async fn update_order(&self, restaurant_id: i64, order: &Order) -> Result<(), BackendError> {
        let Some(ticket) = order.id.ticket() else {
            return Err(BackendError::Decode {
                table: "orders",
                reason: format!("order {} has no ticket", order.id),
            });
        };

        let row = OrderRow::from_order(order, restaurant_id);
        let body = serde_json::to_value(&row).map_err(RestError::from)?;

        let _: OrderRow = self
            .patch_rows(
                "orders",
                &[("id", format!("eq.{ticket}")), Self::tenant(restaurant_id)],
                &body,
            )
            .await?;
        Ok(())
    }

    async fn delete_order(&self, restaurant_id: i64, ticket: i64) -> Result<(), BackendError> {
        let _: Value = self
            .client
            .delete(
                &Self::path("orders"),
                &[("id", format!("eq.{ticket}")), Self::tenant(restaurant_id)],
            )
            .await?;
        Ok(())
    }

    async fn create_kitchen_order(&self, restaurant_id: i64, order: &Order) -> Result<KitchenOrder, BackendError> {
        let row = KitchenOrderRow::for_order(order, restaurant_id)?;

        let rows: Vec<KitchenOrderRow> = self
            .client
            .post(&Self::path("kitchen_orders"), &[], &row)
            .await?;
        Self::single(rows, "kitchen_orders")?.into_kitchen_order()
    }

    async fn kitchen_orders(&self, restaurant_id: i64) -> Result<Vec<KitchenOrder>, BackendError> {
        let rows: Vec<KitchenOrderRow> = self
            .client
            .get(
                &Self::path("kitchen_orders"),
                &[
                    ("select", "*".to_string()),
                    Self::tenant(restaurant_id),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(KitchenOrderRow::into_kitchen_order).collect()
    }

    async fn update_kitchen_status(
        &self,
        restaurant_id: i64,
        id: i64,
        status: KitchenStatus,
    ) -> Result<(), BackendError> {
        let _: KitchenOrderRow = self
            .patch_rows(
                "kitchen_orders",
                &[("id", format!("eq.{id}")), Self::tenant(restaurant_id)],
                &json!({ "status": status }),
            )
            .await?;
        Ok(())
    }

    async fn settings(&self, restaurant_id: i64) -> Result<Option<RestaurantSettings>, BackendError> {
        let rows: Vec<RestaurantSettings> = self
            .client
            .get(
                &Self::path("restaurants"),
                &[
                    ("select", "*".to_string()),
                    ("id", format!("eq.{restaurant_id}")),
                ],
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn update_settings(
        &self,
        restaurant_id: i64,
        settings: &RestaurantSettings,
    ) -> Result<RestaurantSettings, BackendError> {
        let mut body = serde_json::to_value(settings).map_err(RestError::from)?;
        // The id never goes into the update payload
        if let Some(fields) = body.as_object_mut() {
            fields.remove("id");
        }

        self.patch_rows(
            "restaurants",
            &[("id", format!("eq.{restaurant_id}"))],
            &body,
        )
        .await
    }

    async fn sign_in(&self, identifier: &str, password: &str) -> Result<Option<User>, BackendError> {
        let rows: Vec<UserRow> = self
            .client
            .get(
                &Self::path("users"),
                &[
                    ("select", "*".to_string()),
                    ("or", sign_in_filter(identifier)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .next()
            .filter(|row| row.password.as_deref() == Some(password))
            .map(|row| row.user))
    }

    async fn sign_up(&self, account: &NewAccount) -> Result<Option<User>, BackendError> {
        let taken: Vec<IdRow> = self
            .client
            .get(
                &Self::path("users"),
                &[
                    ("select", "id".to_string()),
                    ("or", sign_up_filter(account)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        if !taken.is_empty() {
            return Ok(None);
        }

        let restaurants: Vec<IdRow> = self
            .client
            .post(
                &Self::path("restaurants"),
                &[("select", "id".to_string())],
                &json!({ "restaurant_name": account.restaurant_name() }),
            )
            .await?;
        let restaurant_id = Self::single(restaurants, "restaurants")?.id;

        let body = json!({
            "name": account.name,
            "username": account.username,
            "email": account.email,
            "phone": account.phone,
            "password": account.password,
            "role": OWNER_ROLE,
            "restaurant_id": restaurant_id,
        });
        let created: Result<Vec<UserRow>, RestError> =
            self.client.post(&Self::path("users"), &[], &body).await;

        match created.map_err(BackendError::from).and_then(|rows| Self::single(rows, "users")) {
            Ok(row) => Ok(Some(row.user)),
            Err(e) => {
                // Leave no restaurant without an owner
                let cleanup: Result<Value, RestError> = self
                    .client
                    .delete(&Self::path("restaurants"), &[("id", format!("eq.{restaurant_id}"))])
                    .await;
                if let Err(cleanup) = cleanup {
                    tracing::error!(restaurant_id, error = %cleanup, "Failed to remove restaurant after sign-up error");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_and_tenant_filter() {
        assert_eq!(PostgrestBackend::path("orders"), "rest/v1/orders");
        assert_eq!(
            PostgrestBackend::tenant(7),
            ("restaurant_id", "eq.7".to_string())
        );
    }

    #[test]
    fn test_sign_in_filter_quotes_identifier() {
        assert_eq!(
            sign_in_filter("asha@example.com"),
            r#"(email.eq."asha@example.com",username.eq."asha@example.com")"#
        );
        assert_eq!(
            sign_in_filter("5550100"),
            r#"(email.eq."5550100",username.eq."5550100",phone.eq.5550100)"#
        );
    }

    #[test]
    fn test_sign_up_filter_checks_email_and_username() {
        let account = NewAccount {
            name: "Asha".to_string(),
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: None,
            password: "secret".to_string(),
        };
        assert_eq!(
            sign_up_filter(&account),
            r#"(email.eq."asha@example.com",username.eq."asha")"#
        );
    }

    #[test]
    fn test_single_reports_missing_row() {
        let rows: Vec<i64> = vec![];
        assert!(matches!(
            PostgrestBackend::single(rows, "orders"),
            Err(BackendError::NotFound { table: "orders" })
        ));
    }
}
