//! Core scalar types for the tickex exchange
//!
//! Prices are whole ticks (no fractional tick sizes), quantities are integer
//! units, and all identifiers are small integers assigned by the exchange.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Price in ticks. Valid book prices lie in `[MIN_BID, MAX_ASK]`.
pub type Price = i64;

/// Order quantity in units.
pub type Volume = u32;

/// Exchange-assigned order identifier.
pub type OrderId = u32;

/// Client-chosen request identifier, echoed on every response.
pub type RequestId = u32;

/// Per-session connection identifier assigned by the accept loop.
pub type ConnectionId = u32;

/// Monotonic sequence number stamped on market-data frames.
pub type SeqNum = u32;

/// Side of an order or a book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Sell side (asks/offers)
    Sell = 0,
    /// Buy side (bids)
    Buy = 1,
}

impl Side {
    /// The opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Sell => Self::Buy,
            Self::Buy => Self::Sell,
        }
    }

    /// Wire representation (single byte).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire representation.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Sell),
            1 => Some(Self::Buy),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        })
    }
}

/// How long an order may live in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Lifespan {
    /// Match what crosses immediately, drop any residual.
    FillAndKill = 0,
    /// Rest in the book until filled or cancelled.
    GoodForDay = 1,
}

impl Lifespan {
    /// Wire representation (single byte).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire representation.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::FillAndKill),
            1 => Some(Self::GoodForDay),
            _ => None,
        }
    }
}

impl fmt::Display for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FillAndKill => "FAK",
            Self::GoodForDay => "GFD",
        })
    }
}

/// Typed error codes carried in `ERROR_MSG` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// The order pool is exhausted.
    OrderBookFull = 1,
    /// Quantity is zero or an amend violates quantity rules.
    InvalidVolume = 2,
    /// No resting order with the given id.
    OrderNotFound = 3,
    /// The order belongs to another client.
    Unauthorised = 4,
    /// Price is outside `[MIN_BID, MAX_ASK]`.
    InvalidPrice = 5,
}

impl ErrorCode {
    /// Wire representation.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Parse the wire representation.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::OrderBookFull),
            2 => Some(Self::InvalidVolume),
            3 => Some(Self::OrderNotFound),
            4 => Some(Self::Unauthorised),
            5 => Some(Self::InvalidPrice),
            _ => None,
        }
    }
}

/// Timestamp in nanoseconds since the UNIX epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ts(pub u64);

impl Ts {
    /// Create a timestamp from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Timestamp as milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
