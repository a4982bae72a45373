//! Price-indexed central limit order book
//!
//! A dense array of price levels per side over the whole tick range, an
//! arena-allocated order pool with intrusive FIFOs, and strict price-time
//! priority matching. Single-writer: exactly one thread drives the book, and
//! every externally visible effect goes through the [`BookSink`] trait.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod book;
mod events;
mod order;
mod side;

pub use book::{BookSnapshot, OrderBook, OrderStatusInfo};
pub use events::{BookError, BookSink, OrderInfo, TradeExecution};
