//! Exchange configuration.

use crate::error::ExchangeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_technical_ready_delay_ms() -> u64 {
    4_000
}

fn default_idle_grace_ms() -> u64 {
    5_000
}

fn default_queue_capacity() -> usize {
    4_096
}

fn default_rolling_window() -> usize {
    20
}

fn default_legacy_prefixes() -> Vec<String> {
    ["zic", "zip", "shvr", "deeplstm", "deepxgb"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Startup configuration for one exchange instance.
///
/// Durations are milliseconds in the JSON representation so simulations can
/// use sub-second windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Unique exchange name, used in tape file names.
    pub name: String,
    /// Tickers listed on this exchange; one order book each.
    pub tickers: Vec<String>,
    /// Length of the initial connect window.
    pub connect_time_ms: u64,
    /// Length of the trading window.
    pub trading_time_ms: u64,
    /// Delay after session open before technical agents are signalled.
    #[serde(default = "default_technical_ready_delay_ms")]
    pub technical_ready_delay_ms: u64,
    /// Quiet period with no new subscribers that ends the connect phase.
    #[serde(default = "default_idle_grace_ms")]
    pub idle_grace_ms: u64,
    /// Capacity of the bounded inbound message queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of trades in the rolling high/low window.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    /// Display-name prefixes whose profits reset when technical agents
    /// start.
    #[serde(default = "default_legacy_prefixes")]
    pub legacy_agent_prefixes: Vec<String>,
    /// Directory the tape subdirectories are created under.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl ExchangeConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ExchangeError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ExchangeConfig = serde_json::from_str(&contents)
            .map_err(|e| ExchangeError::Config(format!("{}: {e}", path.display())))?;
        config.validated()
    }

    /// Reject configurations the exchange cannot run with.
    pub fn validated(self) -> Result<Self, ExchangeError> {
        if self.name.is_empty() {
            return Err(ExchangeError::Config("exchange name is empty".to_string()));
        }
        if self.tickers.is_empty() {
            return Err(ExchangeError::Config("no tickers listed".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ExchangeError::Config("queue capacity must be > 0".to_string()));
        }
        Ok(self)
    }

    /// Connect window duration.
    pub fn connect_window(&self) -> Duration {
        Duration::from_millis(self.connect_time_ms)
    }

    /// Trading window duration.
    pub fn trading_window(&self) -> Duration {
        Duration::from_millis(self.trading_time_ms)
    }

    /// Technical-ready delay after session open.
    pub fn technical_ready_delay(&self) -> Duration {
        Duration::from_millis(self.technical_ready_delay_ms)
    }

    /// Idle grace period of the connect phase.
    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }
}
