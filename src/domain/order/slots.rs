use std::collections::BTreeSet;

use super::aggregate::Order;
use super::value_objects::{OrderId, OrderType, TableNumber};

// ============================================================================
// Table / Delivery Slot Resolver
// ============================================================================
//
// Decides which order the terminal is working on:
//
// - Dine-In + table T : the confirmed order for T, else a new pending order
//                       bound to T (registered only once confirmed)
// - Delivery          : the first pending delivery order, else a new one that
//                       is registered right away
// - Dine-In, no table : nothing to work on
//
// ============================================================================

/// Outcome of resolving the current order context
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Existing(OrderId),
    Synthesized { order: Order, register: bool },
    NoContext,
}

pub fn resolve(active: &[Order], order_type: OrderType, table: Option<TableNumber>) -> Resolution {
    match (order_type, table) {
        (OrderType::DineIn, Some(table)) => active
            .iter()
            .find(|order| order.occupies(table))
            .map(|order| Resolution::Existing(order.id))
            .unwrap_or_else(|| Resolution::Synthesized {
                order: Order::dine_in(table),
                register: false,
            }),
        (OrderType::DineIn, None) => Resolution::NoContext,
        (OrderType::Delivery, _) => active
            .iter()
            .find(|order| order.order_type == OrderType::Delivery && order.is_pending())
            .map(|order| Resolution::Existing(order.id))
            .unwrap_or_else(|| Resolution::Synthesized {
                order: Order::delivery(),
                register: true,
            }),
    }
}

/// Tables that currently hold a confirmed dine-in order
pub fn occupied_tables(active: &[Order]) -> BTreeSet<TableNumber> {
    active
        .iter()
        .filter(|order| order.is_confirmed() && order.order_type == OrderType::DineIn)
        .filter_map(|order| order.table_number)
        .collect()
}

/// Leaving this order would throw away unconfirmed items
pub fn needs_switch_confirmation(current: Option<&Order>) -> bool {
    current.is_some_and(|order| order.is_pending() && !order.is_empty())
}

/// Where the user asked to go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTarget {
    OrderType(OrderType),
    Table(TableNumber),
    Order(OrderId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::order::OrderCommand;
    use crate::event_sourcing::Aggregate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn with_item(mut order: Order) -> Order {
        order
            .execute(
                &OrderCommand::AddItem {
                    item: MenuItem::new(1, "Dal", Decimal::from(4), "Mains"),
                },
                Uuid::new_v4(),
            )
            .unwrap();
        order
    }

    fn confirmed(table: u32, ticket: i64) -> Order {
        let mut order = with_item(Order::dine_in(TableNumber(table)));
        order
            .execute(&OrderCommand::Confirm { ticket }, Uuid::new_v4())
            .unwrap();
        order
    }

    #[test]
    fn test_dine_in_finds_confirmed_order_for_table() {
        let active = vec![confirmed(3, 10), confirmed(5, 11)];

        assert_eq!(
            resolve(&active, OrderType::DineIn, Some(TableNumber(5))),
            Resolution::Existing(OrderId::Ticket(11))
        );
    }

    #[test]
    fn test_dine_in_synthesizes_unregistered_order() {
        let resolution = resolve(&[], OrderType::DineIn, Some(TableNumber(2)));

        match resolution {
            Resolution::Synthesized { order, register } => {
                assert!(!register);
                assert_eq!(order.table_number, Some(TableNumber(2)));
                assert!(order.is_pending());
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn test_dine_in_without_table_has_no_context() {
        assert_eq!(resolve(&[], OrderType::DineIn, None), Resolution::NoContext);
    }

    #[test]
    fn test_delivery_reuses_pending_delivery() {
        let pending = with_item(Order::delivery());
        let id = pending.id;
        let active = vec![confirmed(1, 7), pending];

        assert_eq!(
            resolve(&active, OrderType::Delivery, None),
            Resolution::Existing(id)
        );
    }

    #[test]
    fn test_delivery_synthesizes_registered_order() {
        let active = vec![confirmed(1, 7)];

        assert!(matches!(
            resolve(&active, OrderType::Delivery, None),
            Resolution::Synthesized { register: true, .. }
        ));
    }

    #[test]
    fn test_occupied_tables_only_counts_confirmed_dine_in() {
        let active = vec![
            confirmed(4, 1),
            with_item(Order::dine_in(TableNumber(6))),
            with_item(Order::delivery()),
        ];

        let occupied: Vec<u32> = occupied_tables(&active).into_iter().map(|t| t.0).collect();
        assert_eq!(occupied, vec![4]);
    }

    #[test]
    fn test_switch_confirmation_only_for_unconfirmed_items() {
        assert!(!needs_switch_confirmation(None));
        assert!(!needs_switch_confirmation(Some(&Order::dine_in(TableNumber(1)))));
        assert!(needs_switch_confirmation(Some(&with_item(Order::dine_in(TableNumber(1))))));
        assert!(!needs_switch_confirmation(Some(&confirmed(1, 3))));
    }
}
