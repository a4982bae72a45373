//! Binary wire protocol
//!
//! Frames are a 3-byte header `{type: u8, size: u16 big-endian}` followed by
//! exactly `size` payload bytes. All multibyte scalars inside payloads are
//! little-endian; only the header size field is big-endian. Payload layouts
//! are fixed per message type; a size that disagrees with the type is a
//! protocol violation.

mod payloads;

pub use payloads::*;

use bytes::BufMut;
use thiserror::Error;

/// Size of the frame header: type byte plus big-endian u16 payload size.
pub const WIRE_HEADER_SIZE: usize = 3;

/// Largest payload of any known message type (the order-book snapshot).
pub const MAX_PAYLOAD_SIZE: usize = <OrderBookSnapshot as Payload>::SIZE;

/// Largest payload that travels inline through the SPSC queues.
///
/// The order-book snapshot is excluded: it takes the unbuffered path and
/// never enters a queue envelope.
pub const MAX_PAYLOAD_SIZE_BUFFER: usize = <ErrorMsg as Payload>::SIZE;

/// Message type codes, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Client hello; answered with `ConfirmConnected`.
    Connect = 1,
    /// Client-requested disconnect (also synthesized on socket drop).
    Disconnect = 2,
    /// Submit a limit order.
    InsertOrder = 3,
    /// Cancel a resting order by exchange id.
    CancelOrder = 4,
    /// Reduce a resting order's total quantity.
    AmendOrder = 5,
    /// Subscribe to the market-data feed.
    Subscribe = 6,
    /// Leave the market-data feed.
    Unsubscribe = 7,
    /// Query a resting order's state.
    OrderStatusRequest = 8,
    /// Session-level hello acknowledgement.
    ConfirmConnected = 11,
    /// Owner acknowledgement of an insert.
    ConfirmOrderInserted = 12,
    /// Owner acknowledgement of a cancel.
    ConfirmOrderCancelled = 13,
    /// Owner acknowledgement of an amend.
    ConfirmOrderAmended = 14,
    /// Execution report sent to maker and taker.
    PartialFillOrder = 15,
    /// Reply to `OrderStatusRequest`.
    OrderStatus = 16,
    /// Typed request error.
    ErrorMsg = 17,
    /// Depth-10 book snapshot (large frame, unbuffered path).
    OrderBookSnapshot = 21,
    /// Public trade print.
    TradeEvent = 23,
    /// Public new-order event.
    OrderInsertedEvent = 24,
    /// Public cancel event.
    OrderCancelledEvent = 25,
    /// Public amend event.
    OrderAmendedEvent = 26,
    /// Aggregate volume change at one price level.
    PriceLevelUpdate = 27,
}

impl MessageType {
    /// Wire representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire representation.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Connect),
            2 => Some(Self::Disconnect),
            3 => Some(Self::InsertOrder),
            4 => Some(Self::CancelOrder),
            5 => Some(Self::AmendOrder),
            6 => Some(Self::Subscribe),
            7 => Some(Self::Unsubscribe),
            8 => Some(Self::OrderStatusRequest),
            11 => Some(Self::ConfirmConnected),
            12 => Some(Self::ConfirmOrderInserted),
            13 => Some(Self::ConfirmOrderCancelled),
            14 => Some(Self::ConfirmOrderAmended),
            15 => Some(Self::PartialFillOrder),
            16 => Some(Self::OrderStatus),
            17 => Some(Self::ErrorMsg),
            21 => Some(Self::OrderBookSnapshot),
            23 => Some(Self::TradeEvent),
            24 => Some(Self::OrderInsertedEvent),
            25 => Some(Self::OrderCancelledEvent),
            26 => Some(Self::OrderAmendedEvent),
            27 => Some(Self::PriceLevelUpdate),
            _ => None,
        }
    }
}

/// Expected payload size for a known message type.
#[must_use]
pub const fn payload_size_for_type(message_type: MessageType) -> usize {
    match message_type {
        MessageType::Connect => <Connect as Payload>::SIZE,
        MessageType::Disconnect => <Disconnect as Payload>::SIZE,
        MessageType::InsertOrder => <InsertOrder as Payload>::SIZE,
        MessageType::CancelOrder => <CancelOrder as Payload>::SIZE,
        MessageType::AmendOrder => <AmendOrder as Payload>::SIZE,
        MessageType::Subscribe => <Subscribe as Payload>::SIZE,
        MessageType::Unsubscribe => <Unsubscribe as Payload>::SIZE,
        MessageType::OrderStatusRequest => <OrderStatusRequest as Payload>::SIZE,
        MessageType::ConfirmConnected => <ConfirmConnected as Payload>::SIZE,
        MessageType::ConfirmOrderInserted => <ConfirmOrderInserted as Payload>::SIZE,
        MessageType::ConfirmOrderCancelled => <ConfirmOrderCancelled as Payload>::SIZE,
        MessageType::ConfirmOrderAmended => <ConfirmOrderAmended as Payload>::SIZE,
        MessageType::PartialFillOrder => <PartialFill as Payload>::SIZE,
        MessageType::OrderStatus => <OrderStatus as Payload>::SIZE,
        MessageType::ErrorMsg => <ErrorMsg as Payload>::SIZE,
        MessageType::OrderBookSnapshot => <OrderBookSnapshot as Payload>::SIZE,
        MessageType::TradeEvent => <TradeEvent as Payload>::SIZE,
        MessageType::OrderInsertedEvent => <OrderInsertedEvent as Payload>::SIZE,
        MessageType::OrderCancelledEvent => <OrderCancelledEvent as Payload>::SIZE,
        MessageType::OrderAmendedEvent => <OrderAmendedEvent as Payload>::SIZE,
        MessageType::PriceLevelUpdate => <PriceLevelUpdate as Payload>::SIZE,
    }
}

/// Codec failures; all of them are protocol violations on the inbound path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Payload length disagrees with the type-expected size.
    #[error("payload size {actual} does not match expected {expected} for {message_type:?}")]
    SizeMismatch {
        /// The message type being decoded.
        message_type: MessageType,
        /// Size the type requires.
        expected: usize,
        /// Size observed on the wire.
        actual: usize,
    },
    /// The type byte does not name a known message.
    #[error("unknown message type {0}")]
    UnknownType(u8),
    /// A side byte other than 0 (sell) or 1 (buy).
    #[error("invalid side byte {0}")]
    InvalidSide(u8),
    /// A lifespan byte other than 0 (FAK) or 1 (GFD).
    #[error("invalid lifespan byte {0}")]
    InvalidLifespan(u8),
}

/// Append a complete frame (header + payload bytes) to `buf`.
pub fn put_frame(buf: &mut Vec<u8>, message_type: u8, payload: &[u8]) {
    debug_assert!(payload.len() <= u16::MAX as usize);
    buf.put_u8(message_type);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16(payload.len() as u16);
    buf.extend_from_slice(payload);
}

/// Append a typed payload as a complete frame to `buf`.
pub fn put_payload_frame<P: Payload>(buf: &mut Vec<u8>, payload: &P) {
    buf.put_u8(P::TYPE.as_u8());
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16(P::SIZE as u16);
    payload.encode(buf);
}

/// Read a frame header: `(type_byte, payload_size)`.
#[must_use]
pub fn read_header(header: &[u8; WIRE_HEADER_SIZE]) -> (u8, u16) {
    (header[0], u16::from_be_bytes([header[1], header[2]]))
}
