use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One price level of the order book mock-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub amount: f64,
    /// Cumulative amount from the best level down to this one
    pub total: f64,
}

/// Simulated order book around a mid price.
///
/// Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub spread: f64,
    pub spread_percent: f64,
    pub generated_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    #[must_use]
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }
}
