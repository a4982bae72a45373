//! Per-session framing layer
//!
//! Bridges a byte stream to the SPSC queue pair a consumer drains and fills.

mod connection;
mod messages;

pub use connection::{Connection, SessionSink};
pub use messages::{InboundMessage, OutboundMessage};
