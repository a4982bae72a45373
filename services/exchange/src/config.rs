//! Exchange service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime settings for the exchange service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
    /// When set, market-data payloads are appended to per-type binary files
    /// under this directory.
    pub event_log_dir: Option<PathBuf>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 16_000,
            event_log_dir: None,
        }
    }
}
