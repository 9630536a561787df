use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::kitchen::{KitchenOrder, KitchenStatus};
use crate::domain::menu::MenuItem;
use crate::domain::null_as_default;
use crate::domain::order::{
    DeliveryDetails, Order, OrderId, OrderItem, OrderStatus, OrderType, PaymentMethod,
    PaymentStatus, TableNumber,
};
use crate::domain::user::User;
use crate::error::BackendError;

// ============================================================================
// Row Translation
// ============================================================================
//
// Stored column  ↔  domain field
//   rate         ↔  price
//   sub_total    ↔  subtotal
//   gst          ↔  tax
//   date         ↔  created_at
//   phone_no ... ↔  delivery details
//
// Pending orders never become rows.
//
// ============================================================================

fn default_true() -> bool {
    true
}

/// `menu_items` row, also the shape of each entry in an order's `items` JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rate: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_type: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<i64>,
}

impl MenuItemRow {
    pub fn from_item(item: &MenuItem, restaurant_id: Option<i64>) -> Self {
        Self {
            id: Some(item.id),
            name: item.name.clone(),
            rate: item.price,
            category: item.category.clone(),
            portion: item.portion.clone(),
            dietary_type: item.dietary_type.clone(),
            is_active: item.is_active,
            available: item.available,
            restaurant_id,
        }
    }

    pub fn into_item(self) -> Result<MenuItem, BackendError> {
        let id = self.id.ok_or_else(|| BackendError::Decode {
            table: "menu_items",
            reason: format!("row for {:?} has no id", self.name),
        })?;

        Ok(MenuItem {
            id,
            name: self.name,
            price: self.rate,
            category: self.category,
            portion: self.portion,
            dietary_type: self.dietary_type,
            is_active: self.is_active,
            available: self.available,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRow {
    #[serde(flatten)]
    pub item: MenuItemRow,
    pub quantity: u32,
}

impl OrderItemRow {
    pub fn from_line(line: &OrderItem) -> Self {
        Self {
            item: MenuItemRow::from_item(&line.item, None),
            quantity: line.quantity,
        }
    }

    pub fn into_line(self) -> Result<OrderItem, BackendError> {
        Ok(OrderItem::new(self.item.into_item()?, self.quantity))
    }
}

fn lines_from_rows(rows: Vec<OrderItemRow>) -> Result<Vec<OrderItem>, BackendError> {
    rows.into_iter().map(OrderItemRow::into_line).collect()
}

/// `orders` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<OrderItemRow>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_total: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gst: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: Decimal,
    pub order_type: OrderType,
    #[serde(default)]
    pub table_number: Option<u32>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub flat_no: Option<String>,
    #[serde(default)]
    pub building_no: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub restaurant_id: i64,
}

impl OrderRow {
    pub fn from_order(order: &Order, restaurant_id: i64) -> Self {
        let delivery = order.delivery.clone().unwrap_or_default();
        let optional = |value: String| Some(value).filter(|v| !v.is_empty());

        Self {
            id: order.id.ticket(),
            date: order.created_at,
            items: order.items.iter().map(OrderItemRow::from_line).collect(),
            sub_total: order.subtotal,
            gst: order.tax,
            discount: order.discount,
            total: order.total,
            order_type: order.order_type,
            table_number: order.table_number.map(|t| t.0),
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            status: order.status,
            phone_no: optional(delivery.phone_no),
            flat_no: optional(delivery.flat_no),
            building_no: delivery.building_no,
            address: delivery.address,
            updated_at: Some(order.updated_at),
            restaurant_id,
        }
    }

    pub fn into_order(self) -> Result<Order, BackendError> {
        let ticket = self.id.ok_or_else(|| BackendError::Decode {
            table: "orders",
            reason: "row has no id".to_string(),
        })?;

        let delivery = match (&self.phone_no, &self.flat_no) {
            (None, None) if self.building_no.is_none() && self.address.is_none() => None,
            _ => Some(DeliveryDetails {
                phone_no: self.phone_no.unwrap_or_default(),
                flat_no: self.flat_no.unwrap_or_default(),
                building_no: self.building_no,
                address: self.address,
            }),
        };

        let mut order = Order::new(self.order_type, self.table_number.map(TableNumber));
        order.id = OrderId::Ticket(ticket);
        order.items = lines_from_rows(self.items)?;
        order.subtotal = self.sub_total;
        order.tax = self.gst;
        order.discount = self.discount;
        order.total = self.total;
        order.status = self.status;
        order.payment_method = self.payment_method;
        order.payment_status = self.payment_status;
        order.delivery = delivery;
        order.created_at = self.date;
        order.updated_at = self.updated_at.unwrap_or(self.date);
        Ok(order)
    }
}

/// `kitchen_orders` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrderRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub order_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<OrderItemRow>,
    pub order_type: OrderType,
    #[serde(default)]
    pub table_number: Option<u32>,
    pub status: KitchenStatus,
    pub restaurant_id: i64,
}

impl KitchenOrderRow {
    /// New ticket for the kitchen; only ticketed orders qualify
    pub fn for_order(order: &Order, restaurant_id: i64) -> Result<Self, BackendError> {
        let order_id = order.id.ticket().ok_or_else(|| BackendError::Decode {
            table: "kitchen_orders",
            reason: format!("order {} has no ticket", order.id),
        })?;

        Ok(Self {
            id: None,
            order_id,
            created_at: None,
            items: order.items.iter().map(OrderItemRow::from_line).collect(),
            order_type: order.order_type,
            table_number: order.table_number.map(|t| t.0),
            status: KitchenStatus::Preparing,
            restaurant_id,
        })
    }

    pub fn into_kitchen_order(self) -> Result<KitchenOrder, BackendError> {
        let id = self.id.ok_or_else(|| BackendError::Decode {
            table: "kitchen_orders",
            reason: "row has no id".to_string(),
        })?;

        Ok(KitchenOrder {
            id,
            order_id: self.order_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            items: lines_from_rows(self.items)?,
            order_type: self.order_type,
            table_number: self.table_number.map(TableNumber),
            status: self.status,
        })
    }
}

/// `users` row. The password column is only compared, never kept.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub password: Option<String>,
}
