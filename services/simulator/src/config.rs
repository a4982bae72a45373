//! Simulator configuration

use serde::{Deserialize, Serialize};
use services_common::{Price, Volume};

/// Runtime settings for the market simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Exchange host to connect to.
    pub host: String,
    /// Exchange TCP port.
    pub port: u16,
    /// RNG seed.
    pub seed: u64,
    /// RNG stream selector; distinct streams decorrelate parallel runs.
    pub stream: u64,
    /// Tick interval in microseconds.
    pub tick_interval_us: u64,
    /// Mid price the initial book is seeded around.
    pub initial_mid: Price,
    /// Spread of the seeded book, in ticks.
    pub initial_spread: Price,
    /// Seeded levels per side.
    pub initial_depth: usize,
    /// Base quantity of the seeded levels; deeper levels shrink from it.
    pub seed_base_quantity: Volume,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 16_000,
            seed: 0,
            stream: 1,
            tick_interval_us: 1_000,
            initial_mid: 1_000,
            initial_spread: 4,
            initial_depth: 5,
            seed_base_quantity: 20,
        }
    }
}
