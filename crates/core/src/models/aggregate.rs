use serde::{Deserialize, Serialize};

/// Performer label used when there are no holdings.
pub const NO_PERFORMER: &str = "N/A";

/// Portfolio-wide summary derived from all holdings.
///
/// Never mutated on its own; always rebuilt from the holdings list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAggregate {
    /// Sum of every holding's total value
    pub total_value: f64,

    /// Sum of every holding's cost basis
    pub total_cost: f64,

    /// total_value − total_cost
    pub total_gain_loss: f64,

    /// total_gain_loss / total_cost × 100
    pub total_gain_loss_percent: f64,

    /// Σ amount × per-unit daily change
    pub daily_change: f64,

    /// daily_change against the portfolio value before the change
    pub daily_change_percent: f64,

    /// Number of holdings
    pub holdings_count: usize,

    /// Symbol with the highest daily change percent, or "N/A"
    pub best_performer: String,

    /// Symbol with the lowest daily change percent, or "N/A"
    pub worst_performer: String,
}

impl Default for PortfolioAggregate {
    fn default() -> Self {
        Self {
            total_value: 0.0,
            total_cost: 0.0,
            total_gain_loss: 0.0,
            total_gain_loss_percent: 0.0,
            daily_change: 0.0,
            daily_change_percent: 0.0,
            holdings_count: 0,
            best_performer: NO_PERFORMER.to_string(),
            worst_performer: NO_PERFORMER.to_string(),
        }
    }
}
