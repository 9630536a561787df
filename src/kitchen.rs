use crate::domain::kitchen::{KitchenOrder, KitchenStatus};

// ============================================================================
// Kitchen Display Board
// ============================================================================
//
// Local view of the kitchen queue. Refetches replace it wholesale; `mark`
// updates one ticket ahead of the backend round trip.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct KitchenBoard {
    orders: Vec<KitchenOrder>,
}

impl KitchenBoard {
    pub fn new(orders: Vec<KitchenOrder>) -> Self {
        let mut board = Self::default();
        board.replace(orders);
        board
    }

    /// Swap in a fresh snapshot, oldest first
    pub fn replace(&mut self, mut orders: Vec<KitchenOrder>) {
        orders.sort_by_key(|order| order.created_at);
        self.orders = orders;
    }

    /// Add one ticket, keeping creation order
    pub fn insert(&mut self, order: KitchenOrder) {
        self.orders.retain(|existing| existing.id != order.id);
        let index = self
            .orders
            .partition_point(|existing| existing.created_at <= order.created_at);
        self.orders.insert(index, order);
    }

    /// Drop the tickets of a withdrawn order
    pub fn remove_for_order(&mut self, order_id: i64) -> usize {
        let before = self.orders.len();
        self.orders.retain(|ticket| ticket.order_id != order_id);
        before - self.orders.len()
    }

    /// Next id for a ticket created without a backend
    pub fn next_local_id(&self) -> i64 {
        self.orders.iter().map(|order| order.id).max().unwrap_or(0) + 1
    }

    pub fn all(&self) -> &[KitchenOrder] {
        &self.orders
    }

    /// Tickets still being prepared, in arrival order
    pub fn preparing(&self) -> impl Iterator<Item = &KitchenOrder> {
        self.orders.iter().filter(|order| order.is_preparing())
    }

    pub fn get(&self, id: i64) -> Option<&KitchenOrder> {
        self.orders.iter().find(|order| order.id == id)
    }

    /// Returns the previous status, or None when the ticket is unknown
    pub fn mark(&mut self, id: i64, status: KitchenStatus) -> Option<KitchenStatus> {
        let order = self.orders.iter_mut().find(|order| order.id == id)?;
        Some(std::mem::replace(&mut order.status, status))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderType, TableNumber};
    use chrono::{Duration, Utc};

    fn ticket(id: i64, minutes_ago: i64) -> KitchenOrder {
        KitchenOrder {
            id,
            order_id: 100 + id,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            items: vec![],
            order_type: OrderType::DineIn,
            table_number: Some(TableNumber(id as u32)),
            status: KitchenStatus::Preparing,
        }
    }

    #[test]
    fn test_board_sorts_oldest_first() {
        let board = KitchenBoard::new(vec![ticket(1, 1), ticket(2, 10), ticket(3, 5)]);
        let ids: Vec<i64> = board.all().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_insert_keeps_creation_order() {
        let mut board = KitchenBoard::new(vec![ticket(1, 10), ticket(2, 1)]);
        board.insert(ticket(3, 5));

        let ids: Vec<i64> = board.all().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(board.next_local_id(), 4);
    }

    #[test]
    fn test_ready_tickets_leave_the_preparing_view() {
        let mut board = KitchenBoard::new(vec![ticket(1, 2), ticket(2, 1)]);

        assert_eq!(board.mark(1, KitchenStatus::Ready), Some(KitchenStatus::Preparing));
        assert_eq!(board.mark(99, KitchenStatus::Ready), None);

        let preparing: Vec<i64> = board.preparing().map(|o| o.id).collect();
        assert_eq!(preparing, vec![2]);
        assert_eq!(board.len(), 2);
    }
}
