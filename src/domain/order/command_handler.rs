use std::collections::VecDeque;
use uuid::Uuid;

use crate::event_sourcing::{Aggregate, EventEnvelope};

use super::aggregate::Order;
use super::billing::TaxPolicy;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Journal
//
// The journal is a bounded in-memory trail of recent envelopes. The session
// reads it to surface notifications; nothing is replayed from it.
//
// ============================================================================

const DEFAULT_JOURNAL_CAPACITY: usize = 256;

pub struct OrderCommandHandler {
    policy: TaxPolicy,
    user_id: Option<i64>,
    journal: VecDeque<EventEnvelope<OrderEvent>>,
    capacity: usize,
}

impl OrderCommandHandler {
    pub fn new(policy: TaxPolicy) -> Self {
        Self {
            policy,
            user_id: None,
            journal: VecDeque::new(),
            capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn policy(&self) -> &TaxPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: TaxPolicy) {
        self.policy = policy;
    }

    /// Run a command against `order`, record the resulting envelopes.
    ///
    /// A rejected command leaves both the order and the journal untouched.
    pub fn handle(
        &mut self,
        order: &mut Order,
        command: OrderCommand,
    ) -> Result<Vec<EventEnvelope<OrderEvent>>, OrderError> {
        let correlation_id = Uuid::new_v4();

        // Validate on a copy so a rejection cannot leave a repriced order behind
        let mut working = order.clone();
        working.reprice(&self.policy);

        let envelopes = match working.execute(&command, correlation_id) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                tracing::debug!(
                    order_id = %order.id,
                    error = %e,
                    "Order command rejected"
                );
                return Err(e);
            }
        };

        *order = working;

        let envelopes: Vec<_> = envelopes
            .into_iter()
            .map(|envelope| match self.user_id {
                Some(user_id) => envelope.with_user(user_id),
                None => envelope,
            })
            .collect();

        for envelope in &envelopes {
            tracing::debug!(
                order_id = %envelope.aggregate_id,
                event_type = %envelope.event_type,
                sequence = envelope.sequence_number,
                correlation_id = %correlation_id,
                "Order event applied"
            );

            if self.journal.len() == self.capacity {
                self.journal.pop_front();
            }
            self.journal.push_back(envelope.clone());
        }

        Ok(envelopes)
    }

    /// Most recent envelopes, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &EventEnvelope<OrderEvent>> {
        self.journal.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::order::TableNumber;
    use rust_decimal::Decimal;

    fn add(id: i64) -> OrderCommand {
        OrderCommand::AddItem {
            item: MenuItem::new(id, "Naan", Decimal::from(2), "Breads"),
        }
    }

    #[test]
    fn test_handle_applies_policy_and_records_events() {
        let mut handler =
            OrderCommandHandler::new(TaxPolicy::flat_percent(Decimal::from(5))).with_user(9);
        let mut order = Order::dine_in(TableNumber(1));

        let envelopes = handler.handle(&mut order, add(1)).unwrap();

        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].user_id, Some(9));
        assert_eq!(envelopes[0].event_type, "OrderItemAdded");
        assert_eq!(order.tax, "0.1".parse::<Decimal>().unwrap());
        assert_eq!(handler.recent().count(), 1);
    }

    #[test]
    fn test_rejected_command_records_nothing() {
        let mut handler = OrderCommandHandler::new(TaxPolicy::default());
        let mut order = Order::dine_in(TableNumber(1));
        let before = order.clone();

        let result = handler.handle(&mut order, OrderCommand::Confirm { ticket: 1 });

        assert_eq!(result.unwrap_err(), OrderError::EmptyOrder);
        assert_eq!(order, before);
        assert_eq!(handler.recent().count(), 0);
    }

    #[test]
    fn test_journal_is_bounded() {
        let mut handler = OrderCommandHandler::new(TaxPolicy::default()).with_capacity(2);
        let mut order = Order::delivery();

        for id in 1..=4 {
            handler.handle(&mut order, add(id)).unwrap();
        }

        let sequences: Vec<i64> = handler.recent().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, vec![3, 4]);
    }
}
