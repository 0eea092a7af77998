use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::PriceUpdate;

/// One symbol of the simulated feed with its starting price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSeed {
    pub symbol: String,
    pub name: String,
    pub price: f64,
}

impl SymbolSeed {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            name: name.into(),
            price,
        }
    }
}

/// Dashboard configuration. Every field has a default, so a partial JSON
/// document is enough to override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Fixed symbol set driven by the price feed
    pub symbols: Vec<SymbolSeed>,

    /// Period between simulated price updates
    pub feed_interval_ms: u64,

    /// Upper bound of the per-tick random move, in percent
    pub max_price_change_percent: f64,

    /// Fixed height of one row in the holdings list, in pixels
    pub row_height: f64,

    /// Height of the holdings list viewport, in pixels
    pub container_height: f64,

    /// Bounded wait for background computations
    pub worker_timeout_ms: u64,

    /// Levels per side in the order book mock-up
    pub order_book_depth: usize,

    /// Pre-filled risk percent in the position-size calculator
    pub default_risk_percent: f64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            symbols: vec![
                SymbolSeed::new("BTC", "Bitcoin", 43_250.0),
                SymbolSeed::new("ETH", "Ethereum", 2_280.0),
                SymbolSeed::new("SOL", "Solana", 98.5),
                SymbolSeed::new("ADA", "Cardano", 0.52),
                SymbolSeed::new("DOT", "Polkadot", 7.35),
                SymbolSeed::new("LINK", "Chainlink", 14.8),
            ],
            feed_interval_ms: 3_000,
            max_price_change_percent: 2.0,
            row_height: 56.0,
            container_height: 600.0,
            worker_timeout_ms: 5_000,
            order_book_depth: 10,
            default_risk_percent: 2.0,
        }
    }
}

impl DashboardSettings {
    /// Parse settings from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize settings: {e}")))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbols.is_empty() {
            return Err(CoreError::InvalidSettings("symbol set must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for seed in &self.symbols {
            let symbol = seed.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                return Err(CoreError::InvalidSettings("symbol must not be blank".into()));
            }
            if !seen.insert(symbol.clone()) {
                return Err(CoreError::InvalidSettings(format!("duplicate symbol '{symbol}'")));
            }
            if !seed.price.is_finite() || seed.price <= 0.0 {
                return Err(CoreError::InvalidSettings(format!(
                    "starting price for {symbol} must be positive, got {}",
                    seed.price
                )));
            }
        }
        if self.feed_interval_ms == 0 {
            return Err(CoreError::InvalidSettings("feed_interval_ms must be > 0".into()));
        }
        if !(self.max_price_change_percent > 0.0 && self.max_price_change_percent < 100.0) {
            return Err(CoreError::InvalidSettings(format!(
                "max_price_change_percent must be in (0, 100), got {}",
                self.max_price_change_percent
            )));
        }
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            return Err(CoreError::InvalidSettings("row_height must be positive".into()));
        }
        if !(self.container_height.is_finite() && self.container_height > 0.0) {
            return Err(CoreError::InvalidSettings("container_height must be positive".into()));
        }
        if self.worker_timeout_ms == 0 {
            return Err(CoreError::InvalidSettings("worker_timeout_ms must be > 0".into()));
        }
        if self.order_book_depth == 0 {
            return Err(CoreError::InvalidSettings("order_book_depth must be > 0".into()));
        }
        if !(self.default_risk_percent > 0.0 && self.default_risk_percent <= 100.0) {
            return Err(CoreError::InvalidSettings(format!(
                "default_risk_percent must be in (0, 100], got {}",
                self.default_risk_percent
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }

    #[must_use]
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    /// Starting prices keyed by uppercased symbol.
    #[must_use]
    pub fn initial_prices(&self) -> PriceUpdate {
        self.symbols
            .iter()
            .map(|s| (s.symbol.trim().to_uppercase(), s.price))
            .collect()
    }

    /// Display name for a symbol of the configured set.
    #[must_use]
    pub fn name_for(&self, symbol: &str) -> Option<&str> {
        let upper = symbol.trim().to_uppercase();
        self.symbols
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(&upper))
            .map(|s| s.name.as_str())
    }
}
