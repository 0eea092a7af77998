use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A position in a single crypto asset.
///
/// `amount`, `current_price` and `average_buy_price` are the inputs; every other
/// numeric field is derived and gets recomputed by the core whenever an input
/// changes. The presentation layer only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Unique identifier
    pub id: Uuid,

    /// Ticker symbol, uppercased (e.g., "BTC", "ETH")
    pub symbol: String,

    /// Human-readable name (e.g., "Bitcoin")
    pub name: String,

    /// Units held
    pub amount: f64,

    /// Latest unit price
    pub current_price: f64,

    /// Weighted average purchase price per unit
    pub average_buy_price: f64,

    /// amount × current_price
    pub total_value: f64,

    /// Per-unit price move from the previous update (not a true 24h figure)
    pub daily_change: f64,

    /// daily_change as a percentage of the previous price
    pub daily_change_percent: f64,

    /// total_value − cost basis
    pub total_gain_loss: f64,

    /// total_gain_loss as a percentage of the cost basis
    pub total_gain_loss_percent: f64,

    /// Share of the whole portfolio's value, in percent
    #[serde(default)]
    pub allocation_percent: f64,
}

impl Holding {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        current_price: f64,
        average_buy_price: f64,
    ) -> Self {
        let mut holding = Self {
            id: Uuid::new_v4(),
            symbol: symbol.into().trim().to_uppercase(),
            name: name.into(),
            amount,
            current_price,
            average_buy_price,
            total_value: 0.0,
            daily_change: 0.0,
            daily_change_percent: 0.0,
            total_gain_loss: 0.0,
            total_gain_loss_percent: 0.0,
            allocation_percent: 0.0,
        };
        holding.recompute();
        holding
    }

    /// What was paid for the units currently held.
    #[must_use]
    pub fn cost_basis(&self) -> f64 {
        self.amount * self.average_buy_price
    }

    /// Recompute value and gain/loss from amount and prices.
    ///
    /// Leaves `daily_change*` and `allocation_percent` untouched: those depend on
    /// the previous price and on the rest of the portfolio respectively.
    pub fn recompute(&mut self) {
        self.total_value = self.amount * self.current_price;
        let cost = self.cost_basis();
        self.total_gain_loss = self.total_value - cost;
        self.total_gain_loss_percent = percent_of(self.total_gain_loss, cost);
    }
}

/// `part / base × 100`, or 0 when the base is zero or the result isn't finite.
#[must_use]
pub fn percent_of(part: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    let pct = part / base * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}
