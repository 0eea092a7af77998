use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::price::{PriceUpdate, is_valid_price};
use super::traits::PriceSource;

/// Lowest price any simulated source will emit.
pub const MIN_SIMULATED_PRICE: f64 = 1e-6;

/// Deterministic price source for tests and reproducible demos.
///
/// Every tick moves each price by a uniform random step of at most
/// ±`max_change_percent`. The same seed and starting prices always produce the
/// same sequence.
pub struct SeededPriceSource {
    rng: StdRng,
    prices: BTreeMap<String, f64>,
    max_change_percent: f64,
}

impl SeededPriceSource {
    pub fn new(seed: u64, initial: &PriceUpdate, max_change_percent: f64) -> Result<Self, CoreError> {
        if !(max_change_percent > 0.0 && max_change_percent < 100.0) {
            return Err(CoreError::ValidationError(format!(
                "max_change_percent must be in (0, 100), got {max_change_percent}"
            )));
        }
        let mut prices = BTreeMap::new();
        for (symbol, price) in initial {
            if !is_valid_price(*price) {
                return Err(CoreError::ValidationError(format!(
                    "Starting price for {symbol} must be positive, got {price}"
                )));
            }
            prices.insert(symbol.trim().to_uppercase(), *price);
        }
        if prices.is_empty() {
            return Err(CoreError::ValidationError("Price source needs at least one symbol".into()));
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            prices,
            max_change_percent,
        })
    }

    /// Current price for a symbol.
    #[must_use]
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.to_uppercase()).copied()
    }

    /// Advance one tick synchronously.
    pub fn step(&mut self) -> PriceUpdate {
        // BTreeMap iteration keeps the rng draw order stable across runs.
        for price in self.prices.values_mut() {
            *price = bounded_step(&mut self.rng, *price, self.max_change_percent);
        }
        self.prices.iter().map(|(s, p)| (s.clone(), *p)).collect()
    }
}

#[async_trait]
impl PriceSource for SeededPriceSource {
    fn name(&self) -> &str {
        "SeededPriceSource"
    }

    fn symbols(&self) -> Vec<String> {
        self.prices.keys().cloned().collect()
    }

    async fn next_prices(&mut self) -> Result<PriceUpdate, CoreError> {
        Ok(self.step())
    }
}

/// Move `price` by a uniform step in ±`max_change_percent`, never below
/// [`MIN_SIMULATED_PRICE`].
pub fn bounded_step<R: Rng>(rng: &mut R, price: f64, max_change_percent: f64) -> f64 {
    let pct = rng.gen_range(-max_change_percent..=max_change_percent);
    (price * (1.0 + pct / 100.0)).max(MIN_SIMULATED_PRICE)
}
