use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::billing::{self, Bill, TaxPolicy};
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{
    DeliveryDetails, OrderId, OrderItem, OrderStatus, OrderType, PaymentMethod, PaymentStatus,
    TableNumber,
};
use crate::domain::menu::MenuItemId;
use crate::event_sourcing::Aggregate;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: OrderId,
    #[serde(default)]
    pub version: i64,

    // Current State
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    pub order_type: OrderType,
    #[serde(default)]
    pub table_number: Option<TableNumber>,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryDetails>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub discarded: bool,
    /// Label of the tax the current totals were computed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_label: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Rate used when totals are recomputed
    #[serde(skip)]
    tax_policy: TaxPolicy,
}

impl Order {
    /// Empty pending order
    pub fn new(order_type: OrderType, table_number: Option<TableNumber>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new_pending(),
            version: 0,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            order_type,
            table_number,
            status: OrderStatus::Pending,
            payment_method: None,
            payment_status: PaymentStatus::Unpaid,
            delivery: None,
            discarded: false,
            tax_label: None,
            created_at: now,
            updated_at: now,
            tax_policy: TaxPolicy::default(),
        }
    }

    /// Pending order bound to a table
    pub fn dine_in(table: TableNumber) -> Self {
        Self::new(OrderType::DineIn, Some(table))
    }

    /// Pending delivery order
    pub fn delivery() -> Self {
        Self::new(OrderType::Delivery, None)
    }

    /// Switch the tax policy and recompute totals with it
    pub fn reprice(&mut self, policy: &TaxPolicy) {
        self.tax_policy = policy.clone();
        self.recompute();
    }

    pub fn bill(&self) -> Bill {
        Bill {
            subtotal: self.subtotal,
            tax: self.tax,
            discount: self.discount,
            total: self.total,
        }
    }

    /// Tax label matching the stored totals. Orders read back from the
    /// backend carry no label, so one is derived from tax over subtotal.
    pub fn tax_label(&self) -> String {
        if let Some(label) = &self.tax_label {
            return label.clone();
        }
        if self.subtotal.is_zero() {
            return "Tax".to_string();
        }
        let percent = (self.tax / self.subtotal * Decimal::ONE_HUNDRED).round_dp(2).normalize();
        format!("Tax ({percent}%)")
    }

    pub fn line(&self, menu_item_id: MenuItemId) -> Option<&OrderItem> {
        self.items.iter().find(|line| line.menu_item_id() == menu_item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == OrderStatus::Confirmed
    }

    /// Confirmed dine-in order holding `table`
    pub fn occupies(&self, table: TableNumber) -> bool {
        self.is_confirmed() && self.order_type == OrderType::DineIn && self.table_number == Some(table)
    }

    fn recompute(&mut self) {
        let bill = billing::compute(&self.items, self.discount, &self.tax_policy);
        self.subtotal = bill.subtotal;
        self.tax = bill.tax;
        self.total = bill.total;
        self.tax_label = Some(self.tax_policy.label());
    }

    fn ensure_not_completed(&self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Completed {
            return Err(OrderError::AlreadyCompleted);
        }
        Ok(())
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_not_completed()?;

        match command {
            OrderCommand::AddItem { item } => {
                if !item.is_orderable() {
                    return Err(OrderError::ItemUnavailable(item.display_name()));
                }

                match self.line(item.id) {
                    Some(line) => Ok(vec![OrderEvent::QuantityChanged(QuantityChanged {
                        menu_item_id: item.id,
                        quantity: line.quantity + 1,
                    })]),
                    None => Ok(vec![OrderEvent::ItemAdded(ItemAdded { item: item.clone() })]),
                }
            }

            OrderCommand::UpdateQuantity {
                menu_item_id,
                quantity,
            } => {
                let Some(line) = self.line(*menu_item_id) else {
                    return Ok(vec![]);
                };

                if *quantity <= 0 {
                    return Ok(vec![OrderEvent::ItemRemoved(ItemRemoved {
                        menu_item_id: *menu_item_id,
                    })]);
                }

                let quantity =
                    u32::try_from(*quantity).map_err(|_| OrderError::InvalidQuantity(*quantity))?;
                if quantity == line.quantity {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::QuantityChanged(QuantityChanged {
                    menu_item_id: *menu_item_id,
                    quantity,
                })])
            }

            OrderCommand::RemoveItem { menu_item_id } => {
                if self.line(*menu_item_id).is_none() {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::ItemRemoved(ItemRemoved {
                    menu_item_id: *menu_item_id,
                })])
            }

            OrderCommand::Clear => match self.status {
                OrderStatus::Pending => Ok(vec![OrderEvent::Discarded]),
                _ => Ok(vec![OrderEvent::ItemsCleared]),
            },

            OrderCommand::Confirm { ticket } => {
                if self.status == OrderStatus::Confirmed {
                    return Err(OrderError::AlreadyConfirmed);
                }
                if self.items.is_empty() {
                    return Err(OrderError::EmptyOrder);
                }
                if self.order_type == OrderType::DineIn && self.table_number.is_none() {
                    return Err(OrderError::MissingTable);
                }
                if *ticket <= 0 {
                    return Err(OrderError::InvalidTicket(*ticket));
                }

                Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
                    ticket: *ticket,
                    confirmed_at: Utc::now(),
                })])
            }

            OrderCommand::Complete { payment_method } => {
                if self.status != OrderStatus::Confirmed {
                    return Err(OrderError::NotConfirmed);
                }
                if self.items.is_empty() {
                    return Err(OrderError::EmptyOrder);
                }

                Ok(vec![OrderEvent::Completed(OrderCompleted {
                    payment_method: *payment_method,
                    completed_at: Utc::now(),
                })])
            }

            OrderCommand::ApplyDiscount { amount } => {
                if amount.is_sign_negative() && !amount.is_zero() {
                    return Err(OrderError::NegativeDiscount);
                }

                Ok(vec![OrderEvent::DiscountApplied(DiscountApplied { amount: *amount })])
            }

            OrderCommand::SetDeliveryDetails { details } => {
                if self.order_type != OrderType::Delivery {
                    return Err(OrderError::NotDelivery);
                }
                if details.phone_no.trim().is_empty() || details.flat_no.trim().is_empty() {
                    return Err(OrderError::IncompleteDeliveryDetails);
                }

                Ok(vec![OrderEvent::DeliveryDetailsSet(DeliveryDetailsSet {
                    details: details.clone(),
                })])
            }
        }
    }

    fn apply_event(&mut self, event: &Self::Event) {
        self.updated_at = Utc::now();

        match event {
            OrderEvent::ItemAdded(e) => {
                self.items.push(OrderItem::new(e.item.clone(), 1));
            }
            OrderEvent::QuantityChanged(e) => {
                if let Some(line) = self
                    .items
                    .iter_mut()
                    .find(|line| line.menu_item_id() == e.menu_item_id)
                {
                    line.quantity = e.quantity;
                }
            }
            OrderEvent::ItemRemoved(e) => {
                self.items.retain(|line| line.menu_item_id() != e.menu_item_id);
            }
            OrderEvent::ItemsCleared => {
                self.items.clear();
                self.discount = Decimal::ZERO;
            }
            OrderEvent::Discarded => {
                self.items.clear();
                self.discount = Decimal::ZERO;
                self.discarded = true;
            }
            OrderEvent::Confirmed(e) => {
                self.id = OrderId::Ticket(e.ticket);
                self.status = OrderStatus::Confirmed;
                self.updated_at = e.confirmed_at;
            }
            OrderEvent::Completed(e) => {
                self.status = OrderStatus::Completed;
                self.payment_method = Some(e.payment_method);
                self.payment_status = PaymentStatus::Paid;
                self.updated_at = e.completed_at;
            }
            OrderEvent::DiscountApplied(e) => {
                self.discount = e.amount;
            }
            OrderEvent::DeliveryDetailsSet(e) => {
                self.delivery = Some(e.details.clone());
            }
        }

        self.version += 1;
        self.recompute();
    }

    fn aggregate_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}
