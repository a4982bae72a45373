//! Read-only replica of the exchange book
//!
//! Rebuilt from the subscribe-time snapshot and kept current from the
//! incremental price-level feed.

use services_common::protocol::{OrderBookSnapshot, PriceLevelUpdate};
use services_common::{Price, Side, Volume};
use std::collections::BTreeMap;

/// Aggregate `price → volume` view of both sides.
#[derive(Debug, Default)]
pub struct ShadowOrderBook {
    bids: BTreeMap<Price, Volume>,
    asks: BTreeMap<Price, Volume>,
}

impl ShadowOrderBook {
    /// Fresh, empty shadow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all contents from a snapshot. Zero-padded slots are padding,
    /// not levels, and are skipped.
    pub fn on_snapshot(&mut self, snapshot: &OrderBookSnapshot) {
        self.bids.clear();
        self.asks.clear();
        for (&price, &volume) in snapshot.ask_prices.iter().zip(&snapshot.ask_volumes) {
            if price > 0 && volume > 0 {
                self.asks.insert(price, volume);
            }
        }
        for (&price, &volume) in snapshot.bid_prices.iter().zip(&snapshot.bid_volumes) {
            if price > 0 && volume > 0 {
                self.bids.insert(price, volume);
            }
        }
    }

    /// Apply one incremental level update; zero volume removes the level.
    pub fn on_level_update(&mut self, update: &PriceLevelUpdate) {
        let levels = match update.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if update.total_volume == 0 {
            levels.remove(&update.price);
        } else {
            levels.insert(update.price, update.total_volume);
        }
    }

    /// Highest bid price, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest ask price, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// Midpoint of the touch, when both sides exist.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2),
            _ => None,
        }
    }

    /// Ask minus bid, when both sides exist.
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Volume at a specific level, zero when absent.
    #[must_use]
    pub fn volume_at(&self, side: Side, price: Price) -> Volume {
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels.get(&price).copied().unwrap_or(0)
    }

    /// All bid levels, ascending by price.
    #[must_use]
    pub fn bids(&self) -> &BTreeMap<Price, Volume> {
        &self.bids
    }

    /// All ask levels, ascending by price.
    #[must_use]
    pub fn asks(&self) -> &BTreeMap<Price, Volume> {
        &self.asks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_common::{Ts, ORDER_BOOK_MESSAGE_DEPTH};

    fn update(side: Side, price: Price, volume: Volume) -> PriceLevelUpdate {
        PriceLevelUpdate {
            sequence_number: 0,
            side,
            price,
            total_volume: volume,
            timestamp: Ts::from_nanos(0),
        }
    }

    #[test]
    fn test_snapshot_skips_padding() {
        let mut shadow = ShadowOrderBook::new();
        let mut snapshot = OrderBookSnapshot {
            ask_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            ask_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            sequence_number: 1,
        };
        snapshot.ask_prices[0] = 1_002;
        snapshot.ask_volumes[0] = 30;
        snapshot.bid_prices[0] = 998;
        snapshot.bid_volumes[0] = 25;
        shadow.on_snapshot(&snapshot);

        assert_eq!(shadow.best_bid(), Some(998));
        assert_eq!(shadow.best_ask(), Some(1_002));
        assert_eq!(shadow.bids().len(), 1);
        assert_eq!(shadow.asks().len(), 1);
        assert_eq!(shadow.mid_price(), Some(1_000));
        assert_eq!(shadow.spread(), Some(4));
    }

    #[test]
    fn test_snapshot_replaces_previous_contents() {
        let mut shadow = ShadowOrderBook::new();
        shadow.on_level_update(&update(Side::Buy, 990, 10));
        let snapshot = OrderBookSnapshot {
            ask_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            ask_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            sequence_number: 2,
        };
        shadow.on_snapshot(&snapshot);
        assert_eq!(shadow.best_bid(), None);
        assert_eq!(shadow.volume_at(Side::Buy, 990), 0);
    }

    #[test]
    fn test_level_updates_set_and_remove() {
        let mut shadow = ShadowOrderBook::new();
        shadow.on_level_update(&update(Side::Buy, 998, 25));
        shadow.on_level_update(&update(Side::Buy, 997, 10));
        shadow.on_level_update(&update(Side::Sell, 1_002, 30));

        assert_eq!(shadow.best_bid(), Some(998));
        assert_eq!(shadow.volume_at(Side::Buy, 997), 10);

        shadow.on_level_update(&update(Side::Buy, 998, 0));
        assert_eq!(shadow.best_bid(), Some(997));

        shadow.on_level_update(&update(Side::Sell, 1_002, 12));
        assert_eq!(shadow.volume_at(Side::Sell, 1_002), 12);
    }

    #[test]
    fn test_one_sided_book_has_no_mid() {
        let mut shadow = ShadowOrderBook::new();
        shadow.on_level_update(&update(Side::Buy, 998, 25));
        assert_eq!(shadow.mid_price(), None);
        assert_eq!(shadow.spread(), None);
    }
}
