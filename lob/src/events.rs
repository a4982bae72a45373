//! Book → owner notification surface
//!
//! The book never talks to sockets; every externally visible effect of a
//! request goes through [`BookSink`]. The exchange engine's implementation
//! turns these callbacks into wire frames.

use crate::order::Order;
use services_common::{ConnectionId, ErrorCode, OrderId, Price, RequestId, Side, Ts, Volume};
use thiserror::Error;

/// Request failures reported back to the originating client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    /// The order pool has no free slot to rest the order.
    #[error("order book full")]
    BookFull,
    /// Zero quantity, or an amend below filled / above remaining quantity.
    #[error("invalid volume")]
    InvalidVolume,
    /// No resting order with the given id.
    #[error("order not found")]
    OrderNotFound,
    /// The order belongs to another client.
    #[error("unauthorised")]
    Unauthorised,
    /// Price outside `[MIN_BID, MAX_ASK]`.
    #[error("invalid price")]
    InvalidPrice,
}

impl BookError {
    /// The wire error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BookFull => ErrorCode::OrderBookFull,
            Self::InvalidVolume => ErrorCode::InvalidVolume,
            Self::OrderNotFound => ErrorCode::OrderNotFound,
            Self::Unauthorised => ErrorCode::Unauthorised,
            Self::InvalidPrice => ErrorCode::InvalidPrice,
        }
    }
}

/// Point-in-time copy of an order, safe to hand to sinks while the book is
/// mid-mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderInfo {
    /// Exchange-assigned order id.
    pub order_id: OrderId,
    /// Owning client (connection) id.
    pub client_id: ConnectionId,
    /// Order side.
    pub side: Side,
    /// Limit price in ticks.
    pub price: Price,
    /// Total quantity.
    pub total_quantity: Volume,
    /// Unfilled quantity.
    pub remaining_quantity: Volume,
    /// Filled quantity.
    pub cumulative_quantity: Volume,
}

impl From<&Order> for OrderInfo {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            client_id: order.client_id,
            side: order.side,
            price: order.price,
            total_quantity: order.total_quantity,
            remaining_quantity: order.remaining_quantity,
            cumulative_quantity: order.cumulative_quantity,
        }
    }
}

/// One fill between a resting maker and the incoming taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeExecution {
    /// The resting order.
    pub maker_order_id: OrderId,
    /// Owner of the resting order.
    pub maker_client_id: ConnectionId,
    /// Maker's unfilled quantity after this fill.
    pub maker_remaining: Volume,
    /// Maker's filled quantity after this fill.
    pub maker_cumulative: Volume,
    /// Side of the resting order.
    pub maker_side: Side,
    /// The aggressing order.
    pub taker_order_id: OrderId,
    /// Owner of the aggressing order.
    pub taker_client_id: ConnectionId,
    /// Taker's unfilled quantity after this fill.
    pub taker_leaves: Volume,
    /// Taker's filled quantity after this fill.
    pub taker_cumulative: Volume,
    /// Execution price: the maker's level price.
    pub price: Price,
    /// Quantity of this fill.
    pub quantity: Volume,
}

/// Receiver for everything the book wants the outside world to know.
pub trait BookSink {
    /// A fill occurred. Fired once per maker touched.
    fn on_trade(&mut self, trade: &TradeExecution, now: Ts);

    /// A level's aggregate volume changed (fill, rest, cancel, or amend).
    fn on_level_update(&mut self, side: Side, price: Price, total_quantity: Volume, now: Ts);

    /// An insert resolved: rested (`remaining_quantity > 0`) or a
    /// fill-and-kill residual dropped (`remaining_quantity == 0`).
    fn on_order_inserted(&mut self, client_request_id: RequestId, order: &OrderInfo, now: Ts);

    /// A resting order was cancelled.
    fn on_order_cancelled(&mut self, client_request_id: RequestId, order: &OrderInfo, now: Ts);

    /// A resting order's quantity was amended.
    fn on_order_amended(
        &mut self,
        client_request_id: RequestId,
        old_total_quantity: Volume,
        order: &OrderInfo,
        now: Ts,
    );

    /// A request failed validation or capacity checks.
    fn on_error(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        error: BookError,
        now: Ts,
    );
}
