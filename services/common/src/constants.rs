//! Book and wire constants shared across services

use crate::types::Price;

/// Lowest representable bid price, in ticks.
pub const MIN_BID: Price = 1;

/// Highest representable ask price, in ticks.
pub const MAX_ASK: Price = 10_000;

/// Number of addressable price levels per side.
#[allow(clippy::cast_sign_loss)]
pub const NUM_BOOK_LEVELS: usize = (MAX_ASK - MIN_BID + 1) as usize;

/// Depth of the order-book snapshot message, per side.
pub const ORDER_BOOK_MESSAGE_DEPTH: usize = 10;

/// Capacity of each side's order pool.
pub const MAX_ORDERS: usize = 100_000;

/// Fixed width of the error text field in `ERROR_MSG` frames.
pub const ERROR_TEXT_LEN: usize = 32;

/// Capacity of a session's inbound SPSC queue.
pub const INBOUND_QUEUE_CAP: usize = 4096;

/// Capacity of a session's outbound SPSC queue.
pub const OUTBOUND_QUEUE_CAP: usize = 4096;

/// Size of the temporary socket read buffer.
pub const READ_BUFFER_SIZE: usize = 65_535;

/// Upper bound on one batched socket write.
pub const WRITE_BATCH_SIZE: usize = 64 * 1024;

/// Maximum inbound frames a consumer drains per scheduling slice.
pub const MESSAGES_PER_DRAIN: usize = 256;
