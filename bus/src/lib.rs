//! Lock-free queues for ultra-low-latency message passing
//!
//! The exchange moves fixed-size frame envelopes between I/O tasks and the
//! engine thread through single-producer single-consumer rings; nothing here
//! takes a lock on the fast path.

#![warn(missing_docs)]
#![allow(unsafe_code)] // ring storage is raw slots behind acquire/release cursors

mod spsc;

pub use spsc::SpscQueue;
