//! Open-order bookkeeping and hazard-threshold cancel scheduling
//!
//! Each insert carries a private hazard threshold drawn at decision time;
//! the process-wide cumulative hazard advances at the cancel intensity, and
//! when it crosses an order's threshold that order is cancelled. One shared
//! clock, heterogeneous lifetimes, no per-order timers.

use rustc_hash::{FxHashMap, FxHashSet};
use services_common::{OrderId, RequestId, Volume};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct HazardEntry {
    threshold: f64,
    order_id: OrderId,
}

impl PartialEq for HazardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HazardEntry {}

impl PartialOrd for HazardEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HazardEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap pops the smallest threshold first.
        other
            .threshold
            .total_cmp(&self.threshold)
            .then_with(|| other.order_id.cmp(&self.order_id))
    }
}

/// Tracks in-flight inserts, live orders, and their cancel thresholds.
#[derive(Debug, Default)]
pub struct OrderManager {
    /// Inserts sent but not yet acknowledged: request id → hazard threshold.
    pending_inserts: FxHashMap<RequestId, f64>,
    /// Exchange ids of our resting orders.
    active_orders: FxHashSet<OrderId>,
    /// Min-heap of `(threshold, order id)`; may hold stale entries for
    /// orders already filled, which are skipped on pop.
    expiry_queue: BinaryHeap<HazardEntry>,
}

impl OrderManager {
    /// Empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an insert in flight with its cancel threshold.
    pub fn register_pending_insert(&mut self, request_id: RequestId, hazard_threshold: f64) {
        self.pending_inserts.insert(request_id, hazard_threshold);
    }

    /// Translate a pending insert to an active order on acknowledgement.
    pub fn on_insert_acknowledged(&mut self, request_id: RequestId, order_id: OrderId) {
        let Some(threshold) = self.pending_inserts.remove(&request_id) else {
            return;
        };
        self.active_orders.insert(order_id);
        self.expiry_queue.push(HazardEntry {
            threshold,
            order_id,
        });
    }

    /// Forget a pending insert that was rejected or never rested.
    pub fn on_insert_rejected(&mut self, request_id: RequestId) {
        self.pending_inserts.remove(&request_id);
    }

    /// A fill report for one of our orders; fully filled orders leave the
    /// active set (their heap entries go stale and are skipped later).
    pub fn on_partial_fill(&mut self, order_id: OrderId, leaves_quantity: Volume) {
        if leaves_quantity == 0 {
            self.active_orders.remove(&order_id);
        }
    }

    /// A cancel acknowledgement; usually a no-op because expiry already
    /// removed the id.
    pub fn on_order_cancelled(&mut self, order_id: OrderId) {
        self.active_orders.remove(&order_id);
    }

    /// Pop every order whose threshold the cumulative hazard has reached and
    /// append it to `due`. Stale entries are dropped silently.
    pub fn collect_due(&mut self, cumulative_hazard: f64, due: &mut Vec<OrderId>) {
        while let Some(entry) = self.expiry_queue.peek() {
            if entry.threshold > cumulative_hazard {
                break;
            }
            let Some(entry) = self.expiry_queue.pop() else {
                break;
            };
            if self.active_orders.remove(&entry.order_id) {
                due.push(entry.order_id);
            }
        }
    }

    /// Smallest outstanding threshold, if any live order has one.
    #[must_use]
    pub fn next_threshold(&self) -> Option<f64> {
        self.expiry_queue.peek().map(|entry| entry.threshold)
    }

    /// Number of resting orders we believe we own.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.active_orders.len()
    }

    /// Number of inserts awaiting acknowledgement.
    #[must_use]
    pub fn pending_insert_count(&self) -> usize {
        self.pending_inserts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_translates_to_active_on_ack() {
        let mut manager = OrderManager::new();
        manager.register_pending_insert(1, 3.5);
        assert_eq!(manager.pending_insert_count(), 1);
        assert_eq!(manager.open_order_count(), 0);

        manager.on_insert_acknowledged(1, 100);
        assert_eq!(manager.pending_insert_count(), 0);
        assert_eq!(manager.open_order_count(), 1);
        assert_eq!(manager.next_threshold(), Some(3.5));
    }

    #[test]
    fn test_unknown_ack_ignored() {
        let mut manager = OrderManager::new();
        manager.on_insert_acknowledged(9, 100);
        assert_eq!(manager.open_order_count(), 0);
        assert_eq!(manager.next_threshold(), None);
    }

    #[test]
    fn test_due_orders_pop_in_threshold_order() {
        let mut manager = OrderManager::new();
        for (request, threshold, order) in [(1, 5.0, 10), (2, 2.0, 20), (3, 8.0, 30)] {
            manager.register_pending_insert(request, threshold);
            manager.on_insert_acknowledged(request, order);
        }

        let mut due = Vec::new();
        manager.collect_due(1.9, &mut due);
        assert!(due.is_empty());

        manager.collect_due(5.0, &mut due);
        assert_eq!(due, vec![20, 10]);
        assert_eq!(manager.open_order_count(), 1);

        due.clear();
        manager.collect_due(100.0, &mut due);
        assert_eq!(due, vec![30]);
        assert_eq!(manager.open_order_count(), 0);
    }

    #[test]
    fn test_filled_orders_expire_silently() {
        let mut manager = OrderManager::new();
        manager.register_pending_insert(1, 1.0);
        manager.on_insert_acknowledged(1, 10);
        manager.on_partial_fill(10, 0);
        assert_eq!(manager.open_order_count(), 0);

        let mut due = Vec::new();
        manager.collect_due(10.0, &mut due);
        assert!(due.is_empty(), "stale heap entry must not fire a cancel");
    }

    #[test]
    fn test_partial_fill_keeps_order_active() {
        let mut manager = OrderManager::new();
        manager.register_pending_insert(1, 1.0);
        manager.on_insert_acknowledged(1, 10);
        manager.on_partial_fill(10, 5);
        assert_eq!(manager.open_order_count(), 1);
    }

    #[test]
    fn test_rejected_insert_forgotten() {
        let mut manager = OrderManager::new();
        manager.register_pending_insert(1, 1.0);
        manager.on_insert_rejected(1);
        manager.on_insert_acknowledged(1, 10);
        assert_eq!(manager.open_order_count(), 0);
    }
}
