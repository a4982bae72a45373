//! tickex exchange service
//!
//! A TCP limit-order exchange for a single instrument: tokio tasks own the
//! sockets, one dedicated engine thread owns the book, and lock-free SPSC
//! queues carry frames between them. Market data fans out to subscribers
//! with a strictly monotonic sequence number.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod server;
pub mod sink;

pub use config::ExchangeConfig;
pub use engine::{Engine, EngineControl};
pub use server::ExchangeServer;
pub use sink::EventLog;
