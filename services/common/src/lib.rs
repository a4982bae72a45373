//! Shared foundation for the tickex exchange and simulator
//!
//! Scalar types, book/wire constants, clock sources, the binary wire
//! protocol codec, and the per-session framing layer.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod protocol;
pub mod session;
pub mod types;

pub use constants::*;
pub use types::{ConnectionId, ErrorCode, Lifespan, OrderId, Price, RequestId, SeqNum, Side, Ts, Volume};
