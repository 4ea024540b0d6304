use pedlar_core::{Order, OrderId};
use std::collections::HashMap;

/// Open orders keyed by id. Closed orders are removed, never marked.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly opened order; returns false if the id is already present
    pub fn insert(&mut self, order: Order) -> bool {
        if self.orders.contains_key(&order.id) {
            return false;
        }
        self.orders.insert(order.id, order);
        true
    }

    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        self.orders.remove(&id)
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Drain the book, oldest id first
    pub fn into_orders(self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.into_values().collect();
        orders.sort_by_key(|o| o.id);
        orders
    }
}
