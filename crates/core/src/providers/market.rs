use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::price::PriceUpdate;
use crate::models::settings::SymbolSeed;
use super::seeded::bounded_step;
use super::traits::PriceSource;

/// Share of the gap to the anchor price closed on every tick.
const MEAN_REVERSION: f64 = 0.02;

struct SymbolState {
    anchor: f64,
    price: f64,
    /// Maximum move per tick, in percent
    volatility: f64,
}

/// "Realistic-looking" market simulation for the live dashboard.
///
/// Large caps move less than small caps, and prices drift back toward their
/// starting level so a long-running demo doesn't wander off to zero.
/// Entropy-seeded; use [`SeededPriceSource`](super::seeded::SeededPriceSource)
/// when reproducibility matters.
pub struct SimulatedMarket {
    rng: StdRng,
    symbols: BTreeMap<String, SymbolState>,
}

impl SimulatedMarket {
    pub fn new(seeds: &[SymbolSeed], max_change_percent: f64) -> Result<Self, CoreError> {
        Self::with_rng(StdRng::from_entropy(), seeds, max_change_percent)
    }

    /// Same behaviour as [`SimulatedMarket::new`] with a caller-supplied rng.
    pub fn with_rng(rng: StdRng, seeds: &[SymbolSeed], max_change_percent: f64) -> Result<Self, CoreError> {
        if !(max_change_percent > 0.0 && max_change_percent < 100.0) {
            return Err(CoreError::ValidationError(format!(
                "max_change_percent must be in (0, 100), got {max_change_percent}"
            )));
        }
        if seeds.is_empty() {
            return Err(CoreError::ValidationError("Market needs at least one symbol".into()));
        }
        let mut symbols = BTreeMap::new();
        for seed in seeds {
            if !(seed.price.is_finite() && seed.price > 0.0) {
                return Err(CoreError::ValidationError(format!(
                    "Starting price for {} must be positive",
                    seed.symbol
                )));
            }
            let symbol = seed.symbol.trim().to_uppercase();
            let volatility = max_change_percent * volatility_factor(&symbol);
            symbols.insert(
                symbol,
                SymbolState {
                    anchor: seed.price,
                    price: seed.price,
                    volatility,
                },
            );
        }
        Ok(Self { rng, symbols })
    }
}

#[async_trait]
impl PriceSource for SimulatedMarket {
    fn name(&self) -> &str {
        "SimulatedMarket"
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    async fn next_prices(&mut self) -> Result<PriceUpdate, CoreError> {
        let mut update = PriceUpdate::new();
        for (symbol, state) in self.symbols.iter_mut() {
            let stepped = bounded_step(&mut self.rng, state.price, state.volatility);
            state.price = stepped + (state.anchor - stepped) * MEAN_REVERSION;
            update.insert(symbol.clone(), state.price);
        }
        Ok(update)
    }
}

/// Relative volatility by market cap tier.
fn volatility_factor(symbol: &str) -> f64 {
    match symbol {
        "BTC" => 0.5,
        "ETH" => 0.75,
        "USDT" | "USDC" | "DAI" => 0.01,
        _ => 1.0,
    }
}
