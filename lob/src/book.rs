//! Core order book: submit, match, cancel, amend, status, snapshot
//!
//! Single-writer by construction; the engine thread is the only caller. All
//! externally visible effects flow through the caller-supplied [`BookSink`].

use crate::events::{BookError, BookSink, OrderInfo};
use crate::order::OrderIdx;
use crate::side::BookSide;
use rustc_hash::FxHashMap;
use services_common::{
    ConnectionId, Lifespan, OrderId, Price, RequestId, Side, Ts, Volume, MAX_ASK, MAX_ORDERS,
    MIN_BID, ORDER_BOOK_MESSAGE_DEPTH,
};

/// Depth-10 view of both sides, zero-padded, ready for the snapshot frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Ask prices ascending from the touch.
    pub ask_prices: [Price; ORDER_BOOK_MESSAGE_DEPTH],
    /// Aggregate volume per ask price.
    pub ask_volumes: [Volume; ORDER_BOOK_MESSAGE_DEPTH],
    /// Bid prices descending from the touch.
    pub bid_prices: [Price; ORDER_BOOK_MESSAGE_DEPTH],
    /// Aggregate volume per bid price.
    pub bid_volumes: [Volume; ORDER_BOOK_MESSAGE_DEPTH],
}

/// Resting-order state returned by [`OrderBook::order_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusInfo {
    /// The queried order.
    pub info: OrderInfo,
    /// Price of the most recent fill, zero while unfilled.
    pub last_fill_price: Price,
}

/// The central limit order book for the single traded instrument.
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    next_order_id: OrderId,
    /// Resting orders only: id → (side, arena handle).
    order_index: FxHashMap<OrderId, (Side, OrderIdx)>,
    /// Reused across matches: makers fully filled in the current match.
    filled_scratch: Vec<OrderId>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Book with the production pool capacity per side.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool_capacity(MAX_ORDERS)
    }

    /// Book with a custom per-side pool capacity (tests use small pools).
    #[must_use]
    pub fn with_pool_capacity(pool_capacity: usize) -> Self {
        Self {
            bids: BookSide::new(Side::Buy, pool_capacity),
            asks: BookSide::new(Side::Sell, pool_capacity),
            next_order_id: 0,
            order_index: FxHashMap::default(),
            filled_scratch: Vec::with_capacity(128),
        }
    }

    /// Best bid price, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Best ask price, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Number of resting orders.
    #[must_use]
    pub fn open_orders(&self) -> usize {
        self.order_index.len()
    }

    /// Aggregate resting volume at `price` on `side`.
    #[must_use]
    pub fn level_volume(&self, side: Side, price: Price) -> Volume {
        match side {
            Side::Buy => self.bids.level_volume(price),
            Side::Sell => self.asks.level_volume(price),
        }
    }

    /// Submit a limit order: validate, match, then rest or drop the residual.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        side: Side,
        price: Price,
        quantity: Volume,
        lifespan: Lifespan,
        now: Ts,
        sink: &mut dyn BookSink,
    ) {
        if let Err(error) = self.try_submit(
            client_id,
            client_request_id,
            side,
            price,
            quantity,
            lifespan,
            now,
            sink,
        ) {
            sink.on_error(client_id, client_request_id, error, now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_submit(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        side: Side,
        price: Price,
        quantity: Volume,
        lifespan: Lifespan,
        now: Ts,
        sink: &mut dyn BookSink,
    ) -> Result<(), BookError> {
        if quantity == 0 {
            return Err(BookError::InvalidVolume);
        }
        if !(MIN_BID..=MAX_ASK).contains(&price) {
            return Err(BookError::InvalidPrice);
        }

        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let (own, opposite) = match side {
            Side::Buy => (&mut self.bids, &mut self.asks),
            Side::Sell => (&mut self.asks, &mut self.bids),
        };

        self.filled_scratch.clear();
        let remaining = opposite.match_incoming(
            price,
            quantity,
            order_id,
            client_id,
            now,
            sink,
            &mut self.filled_scratch,
        );
        for filled_id in self.filled_scratch.drain(..) {
            self.order_index.remove(&filled_id);
        }

        if remaining == 0 {
            // Fully filled on entry; the fills are the response.
            return Ok(());
        }

        match lifespan {
            Lifespan::GoodForDay => {
                let Some(idx) = own.add_order(price, quantity, remaining, order_id, client_id)
                else {
                    return Err(BookError::BookFull);
                };
                self.order_index.insert(order_id, (side, idx));
                let info = OrderInfo::from(own.order(idx));
                sink.on_order_inserted(client_request_id, &info, now);
                sink.on_level_update(side, price, own.level_volume(price), now);
            }
            Lifespan::FillAndKill => {
                // Residual is dropped, never rested; acknowledge with zero
                // leaves so the request still resolves observably.
                let info = OrderInfo {
                    order_id,
                    client_id,
                    side,
                    price,
                    total_quantity: quantity,
                    remaining_quantity: 0,
                    cumulative_quantity: quantity - remaining,
                };
                sink.on_order_inserted(client_request_id, &info, now);
            }
        }
        Ok(())
    }

    /// Cancel a resting order.
    pub fn cancel_order(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        order_id: OrderId,
        now: Ts,
        sink: &mut dyn BookSink,
    ) {
        if let Err(error) = self.try_cancel(client_id, client_request_id, order_id, now, sink) {
            sink.on_error(client_id, client_request_id, error, now);
        }
    }

    fn try_cancel(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        order_id: OrderId,
        now: Ts,
        sink: &mut dyn BookSink,
    ) -> Result<(), BookError> {
        let (side, idx) = self.lookup(client_id, order_id)?;
        let side_book = self.side_mut(side);
        let info = OrderInfo::from(side_book.order(idx));
        let level_total = side_book.remove_order(idx);
        self.order_index.remove(&order_id);

        sink.on_order_cancelled(client_request_id, &info, now);
        sink.on_level_update(side, info.price, level_total, now);
        Ok(())
    }

    /// Amend a resting order's total quantity downwards (in remaining terms).
    #[allow(clippy::too_many_arguments)]
    pub fn amend_order(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        order_id: OrderId,
        new_total_quantity: Volume,
        now: Ts,
        sink: &mut dyn BookSink,
    ) {
        if let Err(error) = self.try_amend(
            client_id,
            client_request_id,
            order_id,
            new_total_quantity,
            now,
            sink,
        ) {
            sink.on_error(client_id, client_request_id, error, now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_amend(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        order_id: OrderId,
        new_total_quantity: Volume,
        now: Ts,
        sink: &mut dyn BookSink,
    ) -> Result<(), BookError> {
        let (side, idx) = self.lookup(client_id, order_id)?;
        let side_book = self.side_mut(side);

        let (old_total, cumulative, old_remaining, price) = {
            let order = side_book.order(idx);
            (
                order.total_quantity,
                order.cumulative_quantity,
                order.remaining_quantity,
                order.price,
            )
        };

        if new_total_quantity < cumulative {
            return Err(BookError::InvalidVolume);
        }
        let new_remaining = new_total_quantity - cumulative;
        if new_remaining > old_remaining {
            // Amend-up would regain queue priority; refused.
            return Err(BookError::InvalidVolume);
        }

        let (level_total, removed) = side_book.reduce_order(idx, new_total_quantity, new_remaining);
        if removed {
            self.order_index.remove(&order_id);
        }

        let info = OrderInfo {
            order_id,
            client_id,
            side,
            price,
            total_quantity: new_total_quantity,
            remaining_quantity: new_remaining,
            cumulative_quantity: cumulative,
        };
        sink.on_order_amended(client_request_id, old_total, &info, now);
        sink.on_level_update(side, price, level_total, now);
        Ok(())
    }

    /// Look up a resting order's state for the status round trip.
    pub fn order_status(
        &self,
        client_id: ConnectionId,
        order_id: OrderId,
    ) -> Result<OrderStatusInfo, BookError> {
        let &(side, idx) = self
            .order_index
            .get(&order_id)
            .ok_or(BookError::OrderNotFound)?;
        let order = self.side_ref(side).order(idx);
        if order.client_id != client_id {
            return Err(BookError::Unauthorised);
        }
        Ok(OrderStatusInfo {
            info: OrderInfo::from(order),
            last_fill_price: order.last_fill_price,
        })
    }

    /// Build the depth-10 snapshot, zero-padded past the available depth.
    #[must_use]
    pub fn build_snapshot(&self) -> BookSnapshot {
        let mut snapshot = BookSnapshot::default();
        self.asks
            .snapshot_into(&mut snapshot.ask_prices, &mut snapshot.ask_volumes);
        self.bids
            .snapshot_into(&mut snapshot.bid_prices, &mut snapshot.bid_volumes);
        snapshot
    }

    fn lookup(
        &self,
        client_id: ConnectionId,
        order_id: OrderId,
    ) -> Result<(Side, OrderIdx), BookError> {
        let &(side, idx) = self
            .order_index
            .get(&order_id)
            .ok_or(BookError::OrderNotFound)?;
        if self.side_ref(side).order(idx).client_id != client_id {
            return Err(BookError::Unauthorised);
        }
        Ok((side, idx))
    }

    fn side_ref(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.bids.assert_invariants();
        self.asks.assert_invariants();
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            assert!(bid < ask, "book must not be crossed: bid {bid} ask {ask}");
        }
        assert_eq!(
            self.order_index.len(),
            self.bids.pool_in_use() + self.asks.pool_in_use(),
            "index tracks exactly the resting orders"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TradeExecution;

    /// Sink that records every callback for assertion.
    #[derive(Default)]
    struct Recorder {
        trades: Vec<TradeExecution>,
        level_updates: Vec<(Side, Price, Volume)>,
        inserted: Vec<(RequestId, OrderInfo)>,
        cancelled: Vec<(RequestId, OrderInfo)>,
        amended: Vec<(RequestId, Volume, OrderInfo)>,
        errors: Vec<(ConnectionId, RequestId, BookError)>,
    }

    impl BookSink for Recorder {
        fn on_trade(&mut self, trade: &TradeExecution, _now: Ts) {
            self.trades.push(*trade);
        }

        fn on_level_update(&mut self, side: Side, price: Price, total: Volume, _now: Ts) {
            self.level_updates.push((side, price, total));
        }

        fn on_order_inserted(&mut self, request_id: RequestId, order: &OrderInfo, _now: Ts) {
            self.inserted.push((request_id, *order));
        }

        fn on_order_cancelled(&mut self, request_id: RequestId, order: &OrderInfo, _now: Ts) {
            self.cancelled.push((request_id, *order));
        }

        fn on_order_amended(
            &mut self,
            request_id: RequestId,
            old_total: Volume,
            order: &OrderInfo,
            _now: Ts,
        ) {
            self.amended.push((request_id, old_total, *order));
        }

        fn on_error(&mut self, client: ConnectionId, request_id: RequestId, error: BookError, _now: Ts) {
            self.errors.push((client, request_id, error));
        }
    }

    const NOW: Ts = Ts(1_000);

    fn insert(
        book: &mut OrderBook,
        rec: &mut Recorder,
        client: ConnectionId,
        side: Side,
        price: Price,
        qty: Volume,
    ) {
        book.submit_order(client, 0, side, price, qty, Lifespan::GoodForDay, NOW, rec);
    }

    #[test]
    fn test_resting_buy_no_match() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();

        book.submit_order(1, 11, Side::Buy, 995, 10, Lifespan::GoodForDay, NOW, &mut rec);

        assert!(rec.trades.is_empty());
        let (req, info) = &rec.inserted[0];
        assert_eq!(*req, 11);
        assert_eq!(info.remaining_quantity, 10);
        assert_eq!(info.price, 995);
        assert_eq!(rec.level_updates, vec![(Side::Buy, 995, 10)]);
        assert_eq!(book.best_bid(), Some(995));
        assert_eq!(book.best_ask(), None);
        book.assert_invariants();
    }

    #[test]
    fn test_full_cross() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);

        // Sell 4 @ 990 crosses the resting bid and trades at the maker price.
        book.submit_order(2, 21, Side::Sell, 990, 4, Lifespan::GoodForDay, NOW, &mut rec);

        assert_eq!(rec.trades.len(), 1);
        let trade = &rec.trades[0];
        assert_eq!(trade.price, 995);
        assert_eq!(trade.quantity, 4);
        assert_eq!(trade.maker_side, Side::Buy);
        assert_eq!(trade.maker_remaining, 6);
        assert_eq!(trade.taker_leaves, 0);
        assert_eq!(trade.taker_cumulative, 4);
        assert!(rec.level_updates.contains(&(Side::Buy, 995, 6)));
        // The sell never rests.
        assert_eq!(rec.inserted.len(), 1);
        assert_eq!(book.best_bid(), Some(995));
        assert_eq!(book.level_volume(Side::Buy, 995), 6);
        assert_eq!(book.best_ask(), None);
        book.assert_invariants();
    }

    #[test]
    fn test_partial_rest_after_partial_fill() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);
        insert(&mut book, &mut rec, 2, Side::Sell, 990, 4);
        rec.trades.clear();
        rec.inserted.clear();

        // Sell 10 @ 990: fills the remaining 6 at 995, rests 4 at 990.
        book.submit_order(2, 22, Side::Sell, 990, 10, Lifespan::GoodForDay, NOW, &mut rec);

        let filled: Volume = rec.trades.iter().map(|t| t.quantity).sum();
        assert_eq!(filled, 6);
        assert!(rec.trades.iter().all(|t| t.price == 995));
        let (_, info) = &rec.inserted[0];
        assert_eq!(info.remaining_quantity, 4);
        assert_eq!(info.price, 990);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), Some(990));
        assert_eq!(book.level_volume(Side::Sell, 990), 4);
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_restores_empty_touch() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);
        insert(&mut book, &mut rec, 2, Side::Sell, 990, 4);
        insert(&mut book, &mut rec, 2, Side::Sell, 990, 10);
        let sell_id = rec.inserted.last().unwrap().1.order_id;
        rec.level_updates.clear();

        book.cancel_order(2, 31, sell_id, NOW, &mut rec);

        let (req, info) = &rec.cancelled[0];
        assert_eq!(*req, 31);
        assert_eq!(info.order_id, sell_id);
        assert_eq!(info.remaining_quantity, 4);
        assert_eq!(rec.level_updates, vec![(Side::Sell, 990, 0)]);
        assert_eq!(book.best_ask(), None);
        assert!(rec.errors.is_empty());
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_unknown_and_foreign() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 980, 20);
        let id = rec.inserted[0].1.order_id;

        book.cancel_order(1, 41, 9_999, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 41, BookError::OrderNotFound)));

        book.cancel_order(2, 42, id, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(2, 42, BookError::Unauthorised)));

        // Untouched by the failed attempts.
        assert_eq!(book.level_volume(Side::Buy, 980), 20);
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_twice_reports_not_found() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 980, 20);
        let id = rec.inserted[0].1.order_id;

        book.cancel_order(1, 51, id, NOW, &mut rec);
        assert_eq!(rec.cancelled.len(), 1);
        book.cancel_order(1, 52, id, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 52, BookError::OrderNotFound)));
        book.assert_invariants();
    }

    #[test]
    fn test_amend_down_and_reject_up() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 980, 20);
        let id = rec.inserted[0].1.order_id;
        rec.level_updates.clear();

        book.amend_order(1, 61, id, 12, NOW, &mut rec);
        let (req, old_total, info) = &rec.amended[0];
        assert_eq!((*req, *old_total), (61, 20));
        assert_eq!(info.total_quantity, 12);
        assert_eq!(info.remaining_quantity, 12);
        assert_eq!(rec.level_updates, vec![(Side::Buy, 980, 12)]);

        book.amend_order(1, 62, id, 25, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 62, BookError::InvalidVolume)));
        assert_eq!(book.level_volume(Side::Buy, 980), 12);
        book.assert_invariants();
    }

    #[test]
    fn test_amend_same_total_is_idempotent() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 980, 20);
        let id = rec.inserted[0].1.order_id;

        book.amend_order(1, 63, id, 20, NOW, &mut rec);
        assert_eq!(rec.amended.len(), 1);
        assert!(rec.errors.is_empty());
        assert_eq!(book.level_volume(Side::Buy, 980), 20);
        book.assert_invariants();
    }

    #[test]
    fn test_amend_below_filled_rejected() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);
        let id = rec.inserted[0].1.order_id;
        // Fill 6 of it.
        insert(&mut book, &mut rec, 2, Side::Sell, 995, 6);

        book.amend_order(1, 64, id, 5, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 64, BookError::InvalidVolume)));
        book.assert_invariants();
    }

    #[test]
    fn test_amend_to_cumulative_removes_order() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);
        let id = rec.inserted[0].1.order_id;
        insert(&mut book, &mut rec, 2, Side::Sell, 995, 6);
        rec.level_updates.clear();

        // new_total == cumulative → remaining 0 → order removed.
        book.amend_order(1, 65, id, 6, NOW, &mut rec);
        let (_, _, info) = &rec.amended[0];
        assert_eq!(info.remaining_quantity, 0);
        assert_eq!(rec.level_updates, vec![(Side::Buy, 995, 0)]);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.open_orders(), 0);
        book.assert_invariants();
    }

    #[test]
    fn test_price_time_priority_within_level() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 5);
        insert(&mut book, &mut rec, 2, Side::Buy, 995, 5);
        insert(&mut book, &mut rec, 3, Side::Buy, 995, 5);
        let first = rec.inserted[0].1.order_id;
        let second = rec.inserted[1].1.order_id;
        let third = rec.inserted[2].1.order_id;

        // 7 lots: first maker fully, second partially.
        book.submit_order(4, 71, Side::Sell, 995, 7, Lifespan::GoodForDay, NOW, &mut rec);

        assert_eq!(rec.trades.len(), 2);
        assert_eq!(rec.trades[0].maker_order_id, first);
        assert_eq!(rec.trades[0].quantity, 5);
        assert_eq!(rec.trades[1].maker_order_id, second);
        assert_eq!(rec.trades[1].quantity, 2);
        // FIFO shape afterwards: partially filled second still heads the queue.
        assert_eq!(book.bids.level_order_ids(995), vec![second, third]);
        book.assert_invariants();
    }

    #[test]
    fn test_better_prices_match_first() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Sell, 1_001, 5);
        insert(&mut book, &mut rec, 1, Side::Sell, 1_000, 5);
        insert(&mut book, &mut rec, 1, Side::Sell, 1_002, 5);

        book.submit_order(2, 72, Side::Buy, 1_002, 12, Lifespan::GoodForDay, NOW, &mut rec);

        let prices: Vec<Price> = rec.trades.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![1_000, 1_001, 1_002]);
        assert_eq!(rec.trades[2].quantity, 2);
        assert_eq!(book.best_ask(), Some(1_002));
        assert_eq!(book.level_volume(Side::Sell, 1_002), 3);
        book.assert_invariants();
    }

    #[test]
    fn test_fill_and_kill_residual_dropped() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 4);
        rec.inserted.clear();

        book.submit_order(2, 81, Side::Sell, 990, 10, Lifespan::FillAndKill, NOW, &mut rec);

        assert_eq!(rec.trades.len(), 1);
        assert_eq!(rec.trades[0].quantity, 4);
        // Residual 6 dropped; acknowledged with zero leaves.
        let (req, info) = &rec.inserted[0];
        assert_eq!(*req, 81);
        assert_eq!(info.remaining_quantity, 0);
        assert_eq!(info.cumulative_quantity, 4);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.open_orders(), 0);
        book.assert_invariants();
    }

    #[test]
    fn test_fill_and_kill_no_cross_rests_nothing() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();

        book.submit_order(1, 82, Side::Buy, 995, 10, Lifespan::FillAndKill, NOW, &mut rec);

        assert!(rec.trades.is_empty());
        let (_, info) = &rec.inserted[0];
        assert_eq!(info.remaining_quantity, 0);
        assert_eq!(info.cumulative_quantity, 0);
        assert_eq!(book.best_bid(), None);
        book.assert_invariants();
    }

    #[rstest::rstest]
    #[case::at_min_bid(Side::Buy, MIN_BID, None)]
    #[case::at_max_ask(Side::Sell, MAX_ASK, None)]
    #[case::below_min_bid(Side::Buy, MIN_BID - 1, Some(BookError::InvalidPrice))]
    #[case::above_max_ask(Side::Sell, MAX_ASK + 1, Some(BookError::InvalidPrice))]
    fn test_price_boundary(
        #[case] side: Side,
        #[case] price: Price,
        #[case] expected: Option<BookError>,
    ) {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();

        book.submit_order(1, 91, side, price, 1, Lifespan::GoodForDay, NOW, &mut rec);
        match expected {
            None => {
                assert_eq!(rec.inserted.len(), 1);
                assert!(rec.errors.is_empty());
            }
            Some(error) => {
                assert!(rec.inserted.is_empty());
                assert_eq!(rec.errors.last(), Some(&(1, 91, error)));
            }
        }
        book.assert_invariants();
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        book.submit_order(1, 95, Side::Buy, 995, 0, Lifespan::GoodForDay, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 95, BookError::InvalidVolume)));
        assert_eq!(book.open_orders(), 0);
    }

    #[test]
    fn test_pool_exhaustion_reports_book_full() {
        let mut book = OrderBook::with_pool_capacity(2);
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 100, 1);
        insert(&mut book, &mut rec, 1, Side::Buy, 101, 1);

        book.submit_order(1, 96, Side::Buy, 102, 1, Lifespan::GoodForDay, NOW, &mut rec);
        assert_eq!(rec.errors.last(), Some(&(1, 96, BookError::BookFull)));
        assert_eq!(book.open_orders(), 2);
        assert_eq!(book.best_bid(), Some(101));
        book.assert_invariants();
    }

    #[test]
    fn test_order_status() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Buy, 995, 10);
        let id = rec.inserted[0].1.order_id;

        let status = book.order_status(1, id).unwrap();
        assert_eq!(status.info.remaining_quantity, 10);
        assert_eq!(status.last_fill_price, 0);

        insert(&mut book, &mut rec, 2, Side::Sell, 990, 4);
        let status = book.order_status(1, id).unwrap();
        assert_eq!(status.info.remaining_quantity, 6);
        assert_eq!(status.info.cumulative_quantity, 4);
        assert_eq!(status.last_fill_price, 995);

        assert_eq!(book.order_status(2, id), Err(BookError::Unauthorised));
        assert_eq!(book.order_status(1, 9_999), Err(BookError::OrderNotFound));
    }

    #[test]
    fn test_snapshot_depth_and_padding() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        for depth in 0..12 {
            insert(&mut book, &mut rec, 1, Side::Buy, 900 - depth, 10 + depth as Volume);
            insert(&mut book, &mut rec, 1, Side::Sell, 1_100 + depth, 20 + depth as Volume);
        }

        let snapshot = book.build_snapshot();
        // Bids descend from the touch, asks ascend; only 10 of 12 visible.
        assert_eq!(snapshot.bid_prices[0], 900);
        assert_eq!(snapshot.bid_prices[9], 891);
        assert_eq!(snapshot.bid_volumes[0], 10);
        assert_eq!(snapshot.ask_prices[0], 1_100);
        assert_eq!(snapshot.ask_prices[9], 1_109);
        assert_eq!(snapshot.ask_volumes[9], 29);
        book.assert_invariants();
    }

    #[test]
    fn test_snapshot_empty_book_is_zeroed() {
        let book = OrderBook::new();
        let snapshot = book.build_snapshot();
        assert_eq!(snapshot, BookSnapshot::default());
    }

    #[test]
    fn test_sweep_through_multiple_levels_and_rest() {
        let mut book = OrderBook::new();
        let mut rec = Recorder::default();
        insert(&mut book, &mut rec, 1, Side::Sell, 1_000, 3);
        insert(&mut book, &mut rec, 2, Side::Sell, 1_001, 3);
        rec.inserted.clear();

        // Buy 10 @ 1_005 sweeps both asks and rests 4.
        book.submit_order(3, 97, Side::Buy, 1_005, 10, Lifespan::GoodForDay, NOW, &mut rec);

        let filled: Volume = rec.trades.iter().map(|t| t.quantity).sum();
        assert_eq!(filled, 6);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.best_bid(), Some(1_005));
        let (_, info) = &rec.inserted[0];
        assert_eq!(info.remaining_quantity, 4);
        // Taker bookkeeping is cumulative across the sweep.
        assert_eq!(rec.trades.last().unwrap().taker_cumulative, 6);
        assert_eq!(rec.trades.last().unwrap().taker_leaves, 4);
        book.assert_invariants();
    }
}
