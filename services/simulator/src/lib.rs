//! tickex market simulator
//!
//! Connects to the exchange over TCP, mirrors the book from the market-data
//! feed, and generates a statistically realistic stream of order inserts
//! with hazard-driven self-cancellation: a point-process flow model whose
//! intensities respond to the observed volatility, flow, and liquidity.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dynamics;
pub mod order_manager;
pub mod rng;
pub mod shadow_book;
pub mod simulator;
pub mod state;

pub use config::SimulatorConfig;
pub use dynamics::{InsertDecision, LatentState, MarketDynamics};
pub use order_manager::OrderManager;
pub use rng::SimRng;
pub use shadow_book::ShadowOrderBook;
pub use simulator::MarketSimulator;
pub use state::{FlowState, LiquidityState, MarketState, PriceState, TimeState, VolatilityState};
