/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed and validated strategy configuration
[POS]:    Configuration layer - session setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Result, anyhow};
use bybit_scalp_adapter::Category;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account credentials configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub api_key: String,
    pub api_secret: String,
}

/// Full configuration for one scalping session. Immutable while the engine
/// is not stopped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScalpConfig {
    pub credentials: CredentialsConfig,
    /// Trading symbol (e.g. "BTCUSDT")
    pub symbol: String,
    /// Product category ("linear", "inverse", "spot")
    pub category: Category,
    /// Minimum price increment of the instrument
    #[serde(with = "rust_decimal::serde::str")]
    pub tick_size: Decimal,
    /// Quantity of every BUY order
    #[serde(with = "rust_decimal::serde::str")]
    pub order_qty: Decimal,
    /// Ladder size: number of simultaneous BUY orders
    pub max_buy_orders: u32,
    /// Ticks between the best bid and layer 0
    pub offset_ticks: u32,
    /// Ticks between adjacent layers
    pub layer_step_ticks: u32,
    /// Age after which an unfilled BUY is canceled
    pub buy_ttl_secs: u64,
    /// Tick drift from the best bid that forces a reprice
    pub reprice_ticks: u32,
    /// Profit target in ticks for each take-profit
    pub tp_ticks: u32,
    /// Cap on simultaneously open take-profit orders
    pub max_tp_orders: u32,
    /// Tick loop period
    pub loop_interval_ms: u64,
    /// Cooldown after a buy fill before the ladder is topped up again
    #[serde(default)]
    pub wait_after_buy_fill_ms: u64,
    /// Flatten open take-profits with market sells on stop
    #[serde(default)]
    pub sell_all_on_stop: bool,
    /// Override the API host (testnet, mocks)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ScalpConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reject configurations the engine must refuse to run with.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.api_key.trim().is_empty() {
            return Err(anyhow!("credentials.api_key cannot be empty"));
        }
        if self.credentials.api_secret.trim().is_empty() {
            return Err(anyhow!("credentials.api_secret cannot be empty"));
        }
        if self.symbol.trim().is_empty() {
            return Err(anyhow!("symbol cannot be empty"));
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(anyhow!("tick_size must be positive"));
        }
        if self.order_qty <= Decimal::ZERO {
            return Err(anyhow!("order_qty must be positive"));
        }
        if self.max_buy_orders < 1 {
            return Err(anyhow!("max_buy_orders must be at least 1"));
        }
        if self.layer_step_ticks < 1 {
            return Err(anyhow!("layer_step_ticks must be at least 1"));
        }
        if self.buy_ttl_secs == 0 {
            return Err(anyhow!("buy_ttl_secs must be positive"));
        }
        if self.reprice_ticks < 1 {
            return Err(anyhow!("reprice_ticks must be at least 1"));
        }
        if self.tp_ticks < 1 {
            return Err(anyhow!("tp_ticks must be at least 1"));
        }
        if self.max_tp_orders < 1 {
            return Err(anyhow!("max_tp_orders must be at least 1"));
        }
        if self.loop_interval_ms == 0 {
            return Err(anyhow!("loop_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn buy_ttl(&self) -> Duration {
        Duration::from_secs(self.buy_ttl_secs)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn wait_after_buy_fill(&self) -> Duration {
        Duration::from_millis(self.wait_after_buy_fill_ms)
    }
}
