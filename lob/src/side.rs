//! One side of the book: a dense array of price levels over the tick range
//!
//! `best_price_index` tracks the touch; `NUM_BOOK_LEVELS` is the empty
//! sentinel. Matching walks level FIFOs head-first, so price-time priority is
//! structural rather than enforced by sorting.

use crate::events::{BookSink, OrderInfo, TradeExecution};
use crate::order::{Order, OrderIdx, OrderPool, NIL};
use services_common::{
    ConnectionId, OrderId, Price, Side, Ts, Volume, MIN_BID, NUM_BOOK_LEVELS,
    ORDER_BOOK_MESSAGE_DEPTH,
};

/// One price level: aggregate volume plus the FIFO of resting orders.
#[derive(Debug, Clone)]
pub(crate) struct PriceLevel {
    pub price: Price,
    /// Sum of the remaining quantity of every linked order.
    pub total_quantity: Volume,
    head: OrderIdx,
    tail: OrderIdx,
}

/// A full bid or ask side.
#[derive(Debug)]
pub(crate) struct BookSide {
    side: Side,
    levels: Vec<PriceLevel>,
    pool: OrderPool,
    /// Index of the touch, or `NUM_BOOK_LEVELS` when the side is empty.
    best_price_index: usize,
}

impl BookSide {
    pub(crate) fn new(side: Side, pool_capacity: usize) -> Self {
        let levels = (0..NUM_BOOK_LEVELS)
            .map(|i| PriceLevel {
                #[allow(clippy::cast_possible_wrap)]
                price: MIN_BID + i as Price,
                total_quantity: 0,
                head: NIL,
                tail: NIL,
            })
            .collect();
        Self {
            side,
            levels,
            pool: OrderPool::with_capacity(pool_capacity),
            best_price_index: NUM_BOOK_LEVELS,
        }
    }

    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn price_to_index(price: Price) -> usize {
        debug_assert!((MIN_BID..=MIN_BID + NUM_BOOK_LEVELS as Price - 1).contains(&price));
        (price - MIN_BID) as usize
    }

    /// Price at the touch, if the side is non-empty.
    pub(crate) fn best_price(&self) -> Option<Price> {
        (self.best_price_index < NUM_BOOK_LEVELS).then(|| self.levels[self.best_price_index].price)
    }

    pub(crate) fn order(&self, idx: OrderIdx) -> &Order {
        self.pool.get(idx)
    }

    pub(crate) fn level_volume(&self, price: Price) -> Volume {
        self.levels[Self::price_to_index(price)].total_quantity
    }

    pub(crate) fn pool_in_use(&self) -> usize {
        self.pool.in_use()
    }

    /// Rest an order at the tail of its level's FIFO. `None` when the pool
    /// is exhausted; the book is untouched in that case.
    pub(crate) fn add_order(
        &mut self,
        price: Price,
        total_quantity: Volume,
        remaining_quantity: Volume,
        order_id: OrderId,
        client_id: ConnectionId,
    ) -> Option<OrderIdx> {
        let level_idx = Self::price_to_index(price);
        let idx = self.pool.allocate()?;

        let tail = self.levels[level_idx].tail;
        let side = self.side;
        let order = self.pool.get_mut(idx);
        order.client_id = client_id;
        order.order_id = order_id;
        order.price = price;
        order.total_quantity = total_quantity;
        order.remaining_quantity = remaining_quantity;
        order.cumulative_quantity = total_quantity - remaining_quantity;
        order.last_fill_price = 0;
        order.side = side;
        order.next = NIL;
        order.prev = tail;

        let level = &mut self.levels[level_idx];
        if tail == NIL {
            level.head = idx;
        } else {
            self.pool.get_mut(tail).next = idx;
        }
        let level = &mut self.levels[level_idx];
        level.tail = idx;
        level.total_quantity += remaining_quantity;

        self.raise_best(level_idx);
        Some(idx)
    }

    /// Unlink `idx` from its level's FIFO. Pure list surgery: the caller is
    /// responsible for `total_quantity` accounting and for freeing the slot.
    fn unlink(&mut self, idx: OrderIdx) {
        let (level_idx, prev, next) = {
            let order = self.pool.get(idx);
            (Self::price_to_index(order.price), order.prev, order.next)
        };
        if prev == NIL {
            self.levels[level_idx].head = next;
        } else {
            self.pool.get_mut(prev).next = next;
        }
        if next == NIL {
            self.levels[level_idx].tail = prev;
        } else {
            self.pool.get_mut(next).prev = prev;
        }
    }

    /// Remove a resting order entirely (cancel, or amend-to-zero). Returns
    /// the level's aggregate volume after removal.
    pub(crate) fn remove_order(&mut self, idx: OrderIdx) -> Volume {
        let (level_idx, remaining) = {
            let order = self.pool.get(idx);
            (Self::price_to_index(order.price), order.remaining_quantity)
        };
        self.levels[level_idx].total_quantity -= remaining;
        self.unlink(idx);
        self.pool.free(idx);

        let total = self.levels[level_idx].total_quantity;
        if total == 0 && level_idx == self.best_price_index {
            self.advance_best_after_empty(level_idx);
        }
        total
    }

    /// Shrink a resting order to `new_total`/`new_remaining`. Removes it when
    /// the new remaining quantity is zero. Returns the level's aggregate
    /// volume afterwards and whether the order was removed.
    pub(crate) fn reduce_order(
        &mut self,
        idx: OrderIdx,
        new_total: Volume,
        new_remaining: Volume,
    ) -> (Volume, bool) {
        let (level_idx, delta) = {
            let order = self.pool.get_mut(idx);
            let delta = order.remaining_quantity - new_remaining;
            order.total_quantity = new_total;
            order.remaining_quantity = new_remaining;
            order.cumulative_quantity = new_total - new_remaining;
            (Self::price_to_index(order.price), delta)
        };
        self.levels[level_idx].total_quantity -= delta;

        if new_remaining == 0 {
            self.unlink(idx);
            self.pool.free(idx);
            let total = self.levels[level_idx].total_quantity;
            if total == 0 && level_idx == self.best_price_index {
                self.advance_best_after_empty(level_idx);
            }
            (total, true)
        } else {
            (self.levels[level_idx].total_quantity, false)
        }
    }

    fn raise_best(&mut self, level_idx: usize) {
        let improved = match self.side {
            Side::Buy => self.best_price_index == NUM_BOOK_LEVELS || level_idx > self.best_price_index,
            Side::Sell => self.best_price_index == NUM_BOOK_LEVELS || level_idx < self.best_price_index,
        };
        if improved {
            self.best_price_index = level_idx;
        }
    }

    /// Linear scan for the next non-empty level after `old_idx` went empty.
    fn advance_best_after_empty(&mut self, old_idx: usize) {
        match self.side {
            Side::Buy => {
                for i in (0..old_idx).rev() {
                    if self.levels[i].total_quantity > 0 {
                        self.best_price_index = i;
                        return;
                    }
                }
            }
            Side::Sell => {
                for i in old_idx + 1..NUM_BOOK_LEVELS {
                    if self.levels[i].total_quantity > 0 {
                        self.best_price_index = i;
                        return;
                    }
                }
            }
        }
        self.best_price_index = NUM_BOOK_LEVELS;
    }

    /// Match an incoming order against this side (the maker side).
    ///
    /// Walks best-first through crossing levels, head-first within each
    /// level's FIFO. Emits one `on_trade` and one `on_level_update` per fill.
    /// Fully filled makers are unlinked and freed; their ids are appended to
    /// `filled` so the caller can clean the order index. Returns the taker's
    /// unfilled quantity.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn match_incoming(
        &mut self,
        limit_price: Price,
        incoming_quantity: Volume,
        taker_order_id: OrderId,
        taker_client_id: ConnectionId,
        now: Ts,
        sink: &mut dyn BookSink,
        filled: &mut Vec<OrderId>,
    ) -> Volume {
        let total_incoming = incoming_quantity;
        let mut remaining = incoming_quantity;

        while remaining > 0 {
            let best = self.best_price_index;
            if best == NUM_BOOK_LEVELS {
                break;
            }
            let level_price = self.levels[best].price;
            let crosses = match self.side {
                // Asks cross a buy at or above them; bids cross a sell at or
                // below them.
                Side::Sell => level_price <= limit_price,
                Side::Buy => level_price >= limit_price,
            };
            if !crosses {
                break;
            }

            while remaining > 0 {
                let head = self.levels[best].head;
                if head == NIL {
                    break;
                }

                let (traded, maker_info, maker_done) = {
                    let maker = self.pool.get_mut(head);
                    let traded = maker.remaining_quantity.min(remaining);
                    maker.remaining_quantity -= traded;
                    maker.cumulative_quantity += traded;
                    maker.last_fill_price = level_price;
                    (traded, OrderInfo::from(&*maker), maker.remaining_quantity == 0)
                };
                remaining -= traded;
                self.levels[best].total_quantity -= traded;
                let level_total = self.levels[best].total_quantity;

                let trade = TradeExecution {
                    maker_order_id: maker_info.order_id,
                    maker_client_id: maker_info.client_id,
                    maker_remaining: maker_info.remaining_quantity,
                    maker_cumulative: maker_info.cumulative_quantity,
                    maker_side: self.side,
                    taker_order_id,
                    taker_client_id,
                    taker_leaves: remaining,
                    taker_cumulative: total_incoming - remaining,
                    price: level_price,
                    quantity: traded,
                };
                sink.on_trade(&trade, now);
                sink.on_level_update(self.side, level_price, level_total, now);

                if maker_done {
                    filled.push(maker_info.order_id);
                    self.unlink(head);
                    self.pool.free(head);
                }
            }

            if self.levels[best].total_quantity == 0 {
                self.advance_best_after_empty(best);
            }
        }

        remaining
    }

    /// Fill snapshot arrays walking outward from the touch. Unused slots are
    /// left zeroed.
    pub(crate) fn snapshot_into(
        &self,
        prices: &mut [Price; ORDER_BOOK_MESSAGE_DEPTH],
        volumes: &mut [Volume; ORDER_BOOK_MESSAGE_DEPTH],
    ) {
        if self.best_price_index == NUM_BOOK_LEVELS {
            return;
        }
        let mut slot = 0;
        match self.side {
            Side::Buy => {
                for i in (0..=self.best_price_index).rev() {
                    if slot == ORDER_BOOK_MESSAGE_DEPTH {
                        break;
                    }
                    let level = &self.levels[i];
                    if level.total_quantity > 0 {
                        prices[slot] = level.price;
                        volumes[slot] = level.total_quantity;
                        slot += 1;
                    }
                }
            }
            Side::Sell => {
                for i in self.best_price_index..NUM_BOOK_LEVELS {
                    if slot == ORDER_BOOK_MESSAGE_DEPTH {
                        break;
                    }
                    let level = &self.levels[i];
                    if level.total_quantity > 0 {
                        prices[slot] = level.price;
                        volumes[slot] = level.total_quantity;
                        slot += 1;
                    }
                }
            }
        }
    }

    /// Order ids at `price`, head (oldest) first.
    #[cfg(test)]
    pub(crate) fn level_order_ids(&self, price: Price) -> Vec<OrderId> {
        let mut ids = Vec::new();
        let mut cur = self.levels[Self::price_to_index(price)].head;
        while cur != NIL {
            let order = self.pool.get(cur);
            ids.push(order.order_id);
            cur = order.next;
        }
        ids
    }

    /// Verify per-level and touch invariants; test builds only.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for (i, level) in self.levels.iter().enumerate() {
            let mut sum: Volume = 0;
            let mut cur = level.head;
            let mut prev = NIL;
            while cur != NIL {
                let order = self.pool.get(cur);
                assert_eq!(order.price, level.price, "order price matches level");
                assert_eq!(order.prev, prev, "intact back-links");
                assert_eq!(order.side, self.side);
                assert!(order.remaining_quantity > 0, "no zombie orders");
                assert!(order.remaining_quantity <= order.total_quantity);
                assert_eq!(
                    order.remaining_quantity + order.cumulative_quantity,
                    order.total_quantity
                );
                sum += order.remaining_quantity;
                prev = cur;
                cur = order.next;
            }
            assert_eq!(level.tail, prev, "tail points at last order");
            assert_eq!(level.total_quantity, sum, "level volume is sum of remaining");
            if i == self.best_price_index {
                assert!(sum > 0, "best index points at a non-empty level");
            }
        }
        if self.best_price_index < NUM_BOOK_LEVELS {
            // No better non-empty level than the recorded touch.
            let better = match self.side {
                Side::Buy => self.best_price_index + 1..NUM_BOOK_LEVELS,
                Side::Sell => 0..self.best_price_index,
            };
            for i in better {
                assert_eq!(self.levels[i].total_quantity, 0);
            }
        } else {
            for level in &self.levels {
                assert_eq!(level.total_quantity, 0);
            }
        }
    }
}
