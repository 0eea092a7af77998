use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A batch of new prices: symbol → unit price.
pub type PriceUpdate = HashMap<String, f64>;

/// Latest known unit price for every symbol the dashboard has seen.
///
/// Source of truth for recomputing holding values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Uppercased symbol → unit price
    pub prices: HashMap<String, f64>,

    /// When the last accepted update was merged
    pub updated_at: DateTime<Utc>,
}

impl Default for PriceQuote {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceQuote {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Build a quote from an initial price map (invalid entries are dropped).
    pub fn from_prices(prices: &PriceUpdate) -> Self {
        let mut quote = Self::new();
        quote.merge(prices);
        quote
    }

    /// Case-insensitive price lookup.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.trim().to_uppercase()).copied()
    }

    /// Merge an update into the quote.
    ///
    /// Only finite, strictly positive prices are accepted. Returns the cleaned
    /// (uppercased, validated) subset that was applied, which is what callers
    /// should feed to the metrics calculator.
    pub fn merge(&mut self, update: &PriceUpdate) -> PriceUpdate {
        let accepted = normalize_update(update);
        if !accepted.is_empty() {
            for (symbol, price) in &accepted {
                self.prices.insert(symbol.clone(), *price);
            }
            self.updated_at = Utc::now();
        }
        accepted
    }

    /// Number of symbols with a known price.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A usable unit price: finite and strictly positive.
#[must_use]
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Uppercase symbols and drop malformed entries.
///
/// When several spellings collapse to one symbol (`"btc"` and `"BTC"`), the
/// uppercase spelling wins; otherwise the greatest raw key does.
pub fn normalize_update(update: &PriceUpdate) -> PriceUpdate {
    let mut entries: Vec<(&String, f64)> = update.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|(a, _), (b, _)| {
        let canonical = |s: &str| s == s.trim().to_uppercase();
        canonical(a.as_str())
            .cmp(&canonical(b.as_str()))
            .then_with(|| a.cmp(b))
    });

    let mut cleaned = PriceUpdate::with_capacity(entries.len());
    for (raw, price) in entries {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() || !is_valid_price(price) {
            log::debug!("dropping malformed price update {symbol:?} = {price}");
            continue;
        }
        if let Some(previous) = cleaned.insert(symbol.clone(), price) {
            log::debug!("price update {raw:?} = {price} overrides {previous} for {symbol}");
        }
    }
    cleaned
}
