//! Payload layouts for every message type
//!
//! Field order is wire order. Scalars are little-endian. Each payload
//! occupies exactly `SIZE` bytes; there is no padding on the wire.

use super::{CodecError, MessageType};
use crate::constants::{ERROR_TEXT_LEN, ORDER_BOOK_MESSAGE_DEPTH};
use crate::types::{
    ConnectionId, ErrorCode, Lifespan, OrderId, Price, RequestId, SeqNum, Side, Ts, Volume,
};
use bytes::{Buf, BufMut};

/// A fixed-size wire payload tied to one message type.
pub trait Payload: Sized {
    /// The message type this payload travels under.
    const TYPE: MessageType;
    /// Exact encoded size in bytes.
    const SIZE: usize;

    /// Write exactly `SIZE` bytes.
    fn encode(&self, buf: &mut impl BufMut);

    /// Parse from exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Result<Self, CodecError>;
}

fn check_size<P: Payload>(buf: &[u8]) -> Result<(), CodecError> {
    if buf.len() == P::SIZE {
        Ok(())
    } else {
        Err(CodecError::SizeMismatch {
            message_type: P::TYPE,
            expected: P::SIZE,
            actual: buf.len(),
        })
    }
}

fn get_side(buf: &mut &[u8]) -> Result<Side, CodecError> {
    let byte = buf.get_u8();
    Side::from_u8(byte).ok_or(CodecError::InvalidSide(byte))
}

fn get_lifespan(buf: &mut &[u8]) -> Result<Lifespan, CodecError> {
    let byte = buf.get_u8();
    Lifespan::from_u8(byte).ok_or(CodecError::InvalidLifespan(byte))
}

/// Client hello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect {
    /// Echoed on the `ConfirmConnected` reply.
    pub client_request_id: RequestId,
}

impl Payload for Connect {
    const TYPE: MessageType = MessageType::Connect;
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
        })
    }
}

/// Client-requested disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnect {
    /// Request identifier (unused on synthesized disconnects).
    pub client_request_id: RequestId,
}

impl Payload for Disconnect {
    const TYPE: MessageType = MessageType::Disconnect;
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
        })
    }
}

/// Limit order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOrder {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
    /// Buy or sell.
    pub side: Side,
    /// Limit price in ticks.
    pub price: Price,
    /// Total quantity.
    pub quantity: Volume,
    /// Fill-and-kill or good-for-day.
    pub lifespan: Lifespan,
}

impl Payload for InsertOrder {
    const TYPE: MessageType = MessageType::InsertOrder;
    const SIZE: usize = 4 + 1 + 8 + 4 + 1;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u8(self.side.as_u8());
        buf.put_i64_le(self.price);
        buf.put_u32_le(self.quantity);
        buf.put_u8(self.lifespan.as_u8());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let client_request_id = buf.get_u32_le();
        let side = get_side(&mut buf)?;
        let price = buf.get_i64_le();
        let quantity = buf.get_u32_le();
        let lifespan = get_lifespan(&mut buf)?;
        Ok(Self {
            client_request_id,
            side,
            price,
            quantity,
            lifespan,
        })
    }
}

/// Cancel a resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOrder {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
    /// The order to cancel.
    pub exchange_order_id: OrderId,
}

impl Payload for CancelOrder {
    const TYPE: MessageType = MessageType::CancelOrder;
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
            exchange_order_id: buf.get_u32_le(),
        })
    }
}

/// Reduce a resting order's total quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmendOrder {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
    /// The order to amend.
    pub exchange_order_id: OrderId,
    /// New total quantity (must not raise the remaining quantity).
    pub new_total_quantity: Volume,
}

impl Payload for AmendOrder {
    const TYPE: MessageType = MessageType::AmendOrder;
    const SIZE: usize = 12;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u32_le(self.new_total_quantity);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
            exchange_order_id: buf.get_u32_le(),
            new_total_quantity: buf.get_u32_le(),
        })
    }
}

/// Join the market-data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscribe {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
}

impl Payload for Subscribe {
    const TYPE: MessageType = MessageType::Subscribe;
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
        })
    }
}

/// Leave the market-data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsubscribe {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
}

impl Payload for Unsubscribe {
    const TYPE: MessageType = MessageType::Unsubscribe;
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
        })
    }
}

/// Query a resting order's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusRequest {
    /// Client-chosen request identifier.
    pub client_request_id: RequestId,
    /// The order to look up.
    pub exchange_order_id: OrderId,
}

impl Payload for OrderStatusRequest {
    const TYPE: MessageType = MessageType::OrderStatusRequest;
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
            exchange_order_id: buf.get_u32_le(),
        })
    }
}

/// Hello acknowledgement carrying the session's connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmConnected {
    /// Exchange-assigned connection id for this session.
    pub connection_id: ConnectionId,
    /// Wall-clock send time.
    pub timestamp: Ts,
}

impl Payload for ConfirmConnected {
    const TYPE: MessageType = MessageType::ConfirmConnected;
    const SIZE: usize = 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.connection_id);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            connection_id: buf.get_u32_le(),
            timestamp: Ts::from_nanos(buf.get_u64_le()),
        })
    }
}

/// Owner acknowledgement of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOrderInserted {
    /// Echo of the request identifier.
    pub client_request_id: RequestId,
    /// Exchange-assigned order id.
    pub exchange_order_id: OrderId,
    /// Order side.
    pub side: Side,
    /// Limit price in ticks.
    pub price: Price,
    /// Total quantity.
    pub total_quantity: Volume,
    /// Unfilled quantity resting in the book (zero for a dropped FAK residual).
    pub leaves_quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for ConfirmOrderInserted {
    const TYPE: MessageType = MessageType::ConfirmOrderInserted;
    const SIZE: usize = 4 + 4 + 1 + 8 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u8(self.side.as_u8());
        buf.put_i64_le(self.price);
        buf.put_u32_le(self.total_quantity);
        buf.put_u32_le(self.leaves_quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let client_request_id = buf.get_u32_le();
        let exchange_order_id = buf.get_u32_le();
        let side = get_side(&mut buf)?;
        let price = buf.get_i64_le();
        let total_quantity = buf.get_u32_le();
        let leaves_quantity = buf.get_u32_le();
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            client_request_id,
            exchange_order_id,
            side,
            price,
            total_quantity,
            leaves_quantity,
            timestamp,
        })
    }
}

/// Owner acknowledgement of a cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOrderCancelled {
    /// Echo of the request identifier.
    pub client_request_id: RequestId,
    /// The cancelled order.
    pub exchange_order_id: OrderId,
    /// Quantity that was still unfilled when cancelled.
    pub leaves_quantity: Volume,
    /// Limit price in ticks.
    pub price: Price,
    /// Order side.
    pub side: Side,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for ConfirmOrderCancelled {
    const TYPE: MessageType = MessageType::ConfirmOrderCancelled;
    const SIZE: usize = 4 + 4 + 4 + 8 + 1 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u32_le(self.leaves_quantity);
        buf.put_i64_le(self.price);
        buf.put_u8(self.side.as_u8());
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let client_request_id = buf.get_u32_le();
        let exchange_order_id = buf.get_u32_le();
        let leaves_quantity = buf.get_u32_le();
        let price = buf.get_i64_le();
        let side = get_side(&mut buf)?;
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            client_request_id,
            exchange_order_id,
            leaves_quantity,
            price,
            side,
            timestamp,
        })
    }
}

/// Owner acknowledgement of an amend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOrderAmended {
    /// Echo of the request identifier.
    pub client_request_id: RequestId,
    /// The amended order.
    pub exchange_order_id: OrderId,
    /// Total quantity before the amend.
    pub old_total_quantity: Volume,
    /// Total quantity after the amend.
    pub new_total_quantity: Volume,
    /// Remaining quantity after the amend.
    pub leaves_quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for ConfirmOrderAmended {
    const TYPE: MessageType = MessageType::ConfirmOrderAmended;
    const SIZE: usize = 4 + 4 + 4 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u32_le(self.old_total_quantity);
        buf.put_u32_le(self.new_total_quantity);
        buf.put_u32_le(self.leaves_quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            client_request_id: buf.get_u32_le(),
            exchange_order_id: buf.get_u32_le(),
            old_total_quantity: buf.get_u32_le(),
            new_total_quantity: buf.get_u32_le(),
            leaves_quantity: buf.get_u32_le(),
            timestamp: Ts::from_nanos(buf.get_u64_le()),
        })
    }
}

/// Execution report for one fill, sent to maker and taker separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialFill {
    /// The recipient's order id.
    pub exchange_order_id: OrderId,
    /// Exchange-assigned trade id shared by both sides of the fill.
    pub trade_id: OrderId,
    /// Execution price (the maker's level price).
    pub last_price: Price,
    /// Quantity of this fill.
    pub last_quantity: Volume,
    /// Recipient's unfilled quantity after this fill.
    pub leaves_quantity: Volume,
    /// Recipient's filled quantity so far.
    pub cumulative_quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for PartialFill {
    const TYPE: MessageType = MessageType::PartialFillOrder;
    const SIZE: usize = 4 + 4 + 8 + 4 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u32_le(self.trade_id);
        buf.put_i64_le(self.last_price);
        buf.put_u32_le(self.last_quantity);
        buf.put_u32_le(self.leaves_quantity);
        buf.put_u32_le(self.cumulative_quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            exchange_order_id: buf.get_u32_le(),
            trade_id: buf.get_u32_le(),
            last_price: buf.get_i64_le(),
            last_quantity: buf.get_u32_le(),
            leaves_quantity: buf.get_u32_le(),
            cumulative_quantity: buf.get_u32_le(),
            timestamp: Ts::from_nanos(buf.get_u64_le()),
        })
    }
}

/// Reply to an order status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatus {
    /// Echo of the request identifier.
    pub client_request_id: RequestId,
    /// The queried order.
    pub exchange_order_id: OrderId,
    /// Order side.
    pub side: Side,
    /// Limit price in ticks.
    pub limit_price: Price,
    /// Price of the most recent fill, zero if unfilled.
    pub last_price: Price,
    /// Total quantity.
    pub total_quantity: Volume,
    /// Filled quantity so far.
    pub filled_quantity: Volume,
    /// Unfilled quantity resting in the book.
    pub leaves_quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for OrderStatus {
    const TYPE: MessageType = MessageType::OrderStatus;
    const SIZE: usize = 4 + 4 + 1 + 8 + 8 + 4 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u32_le(self.exchange_order_id);
        buf.put_u8(self.side.as_u8());
        buf.put_i64_le(self.limit_price);
        buf.put_i64_le(self.last_price);
        buf.put_u32_le(self.total_quantity);
        buf.put_u32_le(self.filled_quantity);
        buf.put_u32_le(self.leaves_quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let client_request_id = buf.get_u32_le();
        let exchange_order_id = buf.get_u32_le();
        let side = get_side(&mut buf)?;
        let limit_price = buf.get_i64_le();
        let last_price = buf.get_i64_le();
        let total_quantity = buf.get_u32_le();
        let filled_quantity = buf.get_u32_le();
        let leaves_quantity = buf.get_u32_le();
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            client_request_id,
            exchange_order_id,
            side,
            limit_price,
            last_price,
            total_quantity,
            filled_quantity,
            leaves_quantity,
            timestamp,
        })
    }
}

/// Typed request error with a short human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMsg {
    /// Echo of the offending request identifier.
    pub client_request_id: RequestId,
    /// Error code (`ErrorCode` on the wire as u16).
    pub code: u16,
    /// NUL-padded error text.
    pub message: [u8; ERROR_TEXT_LEN],
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl ErrorMsg {
    /// Build an error frame, truncating `text` to fit the fixed field.
    #[must_use]
    pub fn new(client_request_id: RequestId, code: ErrorCode, text: &str, timestamp: Ts) -> Self {
        let mut message = [0u8; ERROR_TEXT_LEN];
        let n = text.len().min(ERROR_TEXT_LEN - 1);
        message[..n].copy_from_slice(&text.as_bytes()[..n]);
        Self {
            client_request_id,
            code: code.as_u16(),
            message,
            timestamp,
        }
    }

    /// The error text up to the first NUL byte.
    #[must_use]
    pub fn text(&self) -> &str {
        let end = self
            .message
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ERROR_TEXT_LEN);
        std::str::from_utf8(&self.message[..end]).unwrap_or("")
    }

    /// Typed error code, when the wire value is known.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_u16(self.code)
    }
}

impl Payload for ErrorMsg {
    const TYPE: MessageType = MessageType::ErrorMsg;
    const SIZE: usize = 4 + 2 + ERROR_TEXT_LEN + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_request_id);
        buf.put_u16_le(self.code);
        buf.put_slice(&self.message);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let client_request_id = buf.get_u32_le();
        let code = buf.get_u16_le();
        let mut message = [0u8; ERROR_TEXT_LEN];
        buf.copy_to_slice(&mut message);
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            client_request_id,
            code,
            message,
            timestamp,
        })
    }
}

/// Depth-10 book snapshot. Unused slots are zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBookSnapshot {
    /// Ask prices, ascending from the touch.
    pub ask_prices: [Price; ORDER_BOOK_MESSAGE_DEPTH],
    /// Aggregate volume at each ask price.
    pub ask_volumes: [Volume; ORDER_BOOK_MESSAGE_DEPTH],
    /// Bid prices, descending from the touch.
    pub bid_prices: [Price; ORDER_BOOK_MESSAGE_DEPTH],
    /// Aggregate volume at each bid price.
    pub bid_volumes: [Volume; ORDER_BOOK_MESSAGE_DEPTH],
    /// Sequence number current when the snapshot was built.
    pub sequence_number: SeqNum,
}

impl Payload for OrderBookSnapshot {
    const TYPE: MessageType = MessageType::OrderBookSnapshot;
    const SIZE: usize = ORDER_BOOK_MESSAGE_DEPTH * (8 + 4) * 2 + 4;

    fn encode(&self, buf: &mut impl BufMut) {
        for price in self.ask_prices {
            buf.put_i64_le(price);
        }
        for volume in self.ask_volumes {
            buf.put_u32_le(volume);
        }
        for price in self.bid_prices {
            buf.put_i64_le(price);
        }
        for volume in self.bid_volumes {
            buf.put_u32_le(volume);
        }
        buf.put_u32_le(self.sequence_number);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let mut snapshot = Self {
            ask_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            ask_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_prices: [0; ORDER_BOOK_MESSAGE_DEPTH],
            bid_volumes: [0; ORDER_BOOK_MESSAGE_DEPTH],
            sequence_number: 0,
        };
        for price in &mut snapshot.ask_prices {
            *price = buf.get_i64_le();
        }
        for volume in &mut snapshot.ask_volumes {
            *volume = buf.get_u32_le();
        }
        for price in &mut snapshot.bid_prices {
            *price = buf.get_i64_le();
        }
        for volume in &mut snapshot.bid_volumes {
            *volume = buf.get_u32_le();
        }
        snapshot.sequence_number = buf.get_u32_le();
        Ok(snapshot)
    }
}

/// Public trade print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEvent {
    /// Market-data sequence number.
    pub sequence_number: SeqNum,
    /// Exchange-assigned trade id.
    pub trade_id: OrderId,
    /// Execution price.
    pub price: Price,
    /// Executed quantity.
    pub quantity: Volume,
    /// Side of the aggressor.
    pub taker_side: Side,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for TradeEvent {
    const TYPE: MessageType = MessageType::TradeEvent;
    const SIZE: usize = 4 + 4 + 8 + 4 + 1 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence_number);
        buf.put_u32_le(self.trade_id);
        buf.put_i64_le(self.price);
        buf.put_u32_le(self.quantity);
        buf.put_u8(self.taker_side.as_u8());
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let sequence_number = buf.get_u32_le();
        let trade_id = buf.get_u32_le();
        let price = buf.get_i64_le();
        let quantity = buf.get_u32_le();
        let taker_side = get_side(&mut buf)?;
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            sequence_number,
            trade_id,
            price,
            quantity,
            taker_side,
            timestamp,
        })
    }
}

/// Public new-order event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderInsertedEvent {
    /// Market-data sequence number.
    pub sequence_number: SeqNum,
    /// Exchange-assigned order id.
    pub order_id: OrderId,
    /// Order side.
    pub side: Side,
    /// Limit price in ticks.
    pub price: Price,
    /// Quantity rested in the book.
    pub quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for OrderInsertedEvent {
    const TYPE: MessageType = MessageType::OrderInsertedEvent;
    const SIZE: usize = 4 + 4 + 1 + 8 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence_number);
        buf.put_u32_le(self.order_id);
        buf.put_u8(self.side.as_u8());
        buf.put_i64_le(self.price);
        buf.put_u32_le(self.quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let sequence_number = buf.get_u32_le();
        let order_id = buf.get_u32_le();
        let side = get_side(&mut buf)?;
        let price = buf.get_i64_le();
        let quantity = buf.get_u32_le();
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            sequence_number,
            order_id,
            side,
            price,
            quantity,
            timestamp,
        })
    }
}

/// Public cancel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCancelledEvent {
    /// Market-data sequence number.
    pub sequence_number: SeqNum,
    /// The cancelled order.
    pub order_id: OrderId,
    /// Quantity removed from the book.
    pub remaining_quantity: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for OrderCancelledEvent {
    const TYPE: MessageType = MessageType::OrderCancelledEvent;
    const SIZE: usize = 4 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence_number);
        buf.put_u32_le(self.order_id);
        buf.put_u32_le(self.remaining_quantity);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            sequence_number: buf.get_u32_le(),
            order_id: buf.get_u32_le(),
            remaining_quantity: buf.get_u32_le(),
            timestamp: Ts::from_nanos(buf.get_u64_le()),
        })
    }
}

/// Public amend event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAmendedEvent {
    /// Market-data sequence number.
    pub sequence_number: SeqNum,
    /// The amended order.
    pub order_id: OrderId,
    /// Total quantity after the amend.
    pub quantity_new: Volume,
    /// Total quantity before the amend.
    pub quantity_old: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for OrderAmendedEvent {
    const TYPE: MessageType = MessageType::OrderAmendedEvent;
    const SIZE: usize = 4 + 4 + 4 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence_number);
        buf.put_u32_le(self.order_id);
        buf.put_u32_le(self.quantity_new);
        buf.put_u32_le(self.quantity_old);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        Ok(Self {
            sequence_number: buf.get_u32_le(),
            order_id: buf.get_u32_le(),
            quantity_new: buf.get_u32_le(),
            quantity_old: buf.get_u32_le(),
            timestamp: Ts::from_nanos(buf.get_u64_le()),
        })
    }
}

/// Aggregate volume change at one price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevelUpdate {
    /// Market-data sequence number.
    pub sequence_number: SeqNum,
    /// Side of the level.
    pub side: Side,
    /// Level price in ticks.
    pub price: Price,
    /// New aggregate volume at the level; zero removes it.
    pub total_volume: Volume,
    /// Wall-clock event time.
    pub timestamp: Ts,
}

impl Payload for PriceLevelUpdate {
    const TYPE: MessageType = MessageType::PriceLevelUpdate;
    const SIZE: usize = 4 + 1 + 8 + 4 + 8;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence_number);
        buf.put_u8(self.side.as_u8());
        buf.put_i64_le(self.price);
        buf.put_u32_le(self.total_volume);
        buf.put_u64_le(self.timestamp.as_nanos());
    }

    fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        check_size::<Self>(buf)?;
        let sequence_number = buf.get_u32_le();
        let side = get_side(&mut buf)?;
        let price = buf.get_i64_le();
        let total_volume = buf.get_u32_le();
        let timestamp = Ts::from_nanos(buf.get_u64_le());
        Ok(Self {
            sequence_number,
            side,
            price,
            total_volume,
            timestamp,
        })
    }
}

/// A decoded message of any known type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Message {
    Connect(Connect),
    Disconnect(Disconnect),
    InsertOrder(InsertOrder),
    CancelOrder(CancelOrder),
    AmendOrder(AmendOrder),
    Subscribe(Subscribe),
    Unsubscribe(Unsubscribe),
    OrderStatusRequest(OrderStatusRequest),
    ConfirmConnected(ConfirmConnected),
    ConfirmOrderInserted(ConfirmOrderInserted),
    ConfirmOrderCancelled(ConfirmOrderCancelled),
    ConfirmOrderAmended(ConfirmOrderAmended),
    PartialFill(PartialFill),
    OrderStatus(OrderStatus),
    ErrorMsg(ErrorMsg),
    OrderBookSnapshot(OrderBookSnapshot),
    TradeEvent(TradeEvent),
    OrderInsertedEvent(OrderInsertedEvent),
    OrderCancelledEvent(OrderCancelledEvent),
    OrderAmendedEvent(OrderAmendedEvent),
    PriceLevelUpdate(PriceLevelUpdate),
}

impl Message {
    /// Decode a payload under the given type byte.
    pub fn decode(type_byte: u8, payload: &[u8]) -> Result<Self, CodecError> {
        let message_type =
            MessageType::from_u8(type_byte).ok_or(CodecError::UnknownType(type_byte))?;
        Ok(match message_type {
            MessageType::Connect => Self::Connect(Connect::decode(payload)?),
            MessageType::Disconnect => Self::Disconnect(Disconnect::decode(payload)?),
            MessageType::InsertOrder => Self::InsertOrder(InsertOrder::decode(payload)?),
            MessageType::CancelOrder => Self::CancelOrder(CancelOrder::decode(payload)?),
            MessageType::AmendOrder => Self::AmendOrder(AmendOrder::decode(payload)?),
            MessageType::Subscribe => Self::Subscribe(Subscribe::decode(payload)?),
            MessageType::Unsubscribe => Self::Unsubscribe(Unsubscribe::decode(payload)?),
            MessageType::OrderStatusRequest => {
                Self::OrderStatusRequest(OrderStatusRequest::decode(payload)?)
            }
            MessageType::ConfirmConnected => {
                Self::ConfirmConnected(ConfirmConnected::decode(payload)?)
            }
            MessageType::ConfirmOrderInserted => {
                Self::ConfirmOrderInserted(ConfirmOrderInserted::decode(payload)?)
            }
            MessageType::ConfirmOrderCancelled => {
                Self::ConfirmOrderCancelled(ConfirmOrderCancelled::decode(payload)?)
            }
            MessageType::ConfirmOrderAmended => {
                Self::ConfirmOrderAmended(ConfirmOrderAmended::decode(payload)?)
            }
            MessageType::PartialFillOrder => Self::PartialFill(PartialFill::decode(payload)?),
            MessageType::OrderStatus => Self::OrderStatus(OrderStatus::decode(payload)?),
            MessageType::ErrorMsg => Self::ErrorMsg(ErrorMsg::decode(payload)?),
            MessageType::OrderBookSnapshot => {
                Self::OrderBookSnapshot(OrderBookSnapshot::decode(payload)?)
            }
            MessageType::TradeEvent => Self::TradeEvent(TradeEvent::decode(payload)?),
            MessageType::OrderInsertedEvent => {
                Self::OrderInsertedEvent(OrderInsertedEvent::decode(payload)?)
            }
            MessageType::OrderCancelledEvent => {
                Self::OrderCancelledEvent(OrderCancelledEvent::decode(payload)?)
            }
            MessageType::OrderAmendedEvent => {
                Self::OrderAmendedEvent(OrderAmendedEvent::decode(payload)?)
            }
            MessageType::PriceLevelUpdate => {
                Self::PriceLevelUpdate(PriceLevelUpdate::decode(payload)?)
            }
        })
    }

    /// The message type of this payload.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Connect(_) => MessageType::Connect,
            Self::Disconnect(_) => MessageType::Disconnect,
            Self::InsertOrder(_) => MessageType::InsertOrder,
            Self::CancelOrder(_) => MessageType::CancelOrder,
            Self::AmendOrder(_) => MessageType::AmendOrder,
            Self::Subscribe(_) => MessageType::Subscribe,
            Self::Unsubscribe(_) => MessageType::Unsubscribe,
            Self::OrderStatusRequest(_) => MessageType::OrderStatusRequest,
            Self::ConfirmConnected(_) => MessageType::ConfirmConnected,
            Self::ConfirmOrderInserted(_) => MessageType::ConfirmOrderInserted,
            Self::ConfirmOrderCancelled(_) => MessageType::ConfirmOrderCancelled,
            Self::ConfirmOrderAmended(_) => MessageType::ConfirmOrderAmended,
            Self::PartialFill(_) => MessageType::PartialFillOrder,
            Self::OrderStatus(_) => MessageType::OrderStatus,
            Self::ErrorMsg(_) => MessageType::ErrorMsg,
            Self::OrderBookSnapshot(_) => MessageType::OrderBookSnapshot,
            Self::TradeEvent(_) => MessageType::TradeEvent,
            Self::OrderInsertedEvent(_) => MessageType::OrderInsertedEvent,
            Self::OrderCancelledEvent(_) => MessageType::OrderCancelledEvent,
            Self::OrderAmendedEvent(_) => MessageType::OrderAmendedEvent,
            Self::PriceLevelUpdate(_) => MessageType::PriceLevelUpdate,
        }
    }

    /// Encode the payload (header excluded) into `buf`.
    pub fn encode_payload(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Connect(p) => p.encode(buf),
            Self::Disconnect(p) => p.encode(buf),
            Self::InsertOrder(p) => p.encode(buf),
            Self::CancelOrder(p) => p.encode(buf),
            Self::AmendOrder(p) => p.encode(buf),
            Self::Subscribe(p) => p.encode(buf),
            Self::Unsubscribe(p) => p.encode(buf),
            Self::OrderStatusRequest(p) => p.encode(buf),
            Self::ConfirmConnected(p) => p.encode(buf),
            Self::ConfirmOrderInserted(p) => p.encode(buf),
            Self::ConfirmOrderCancelled(p) => p.encode(buf),
            Self::ConfirmOrderAmended(p) => p.encode(buf),
            Self::PartialFill(p) => p.encode(buf),
            Self::OrderStatus(p) => p.encode(buf),
            Self::ErrorMsg(p) => p.encode(buf),
            Self::OrderBookSnapshot(p) => p.encode(buf),
            Self::TradeEvent(p) => p.encode(buf),
            Self::OrderInsertedEvent(p) => p.encode(buf),
            Self::OrderCancelledEvent(p) => p.encode(buf),
            Self::OrderAmendedEvent(p) => p.encode(buf),
            Self::PriceLevelUpdate(p) => p.encode(buf),
        }
    }
}
