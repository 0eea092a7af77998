use serde::{Deserialize, Serialize};

/// Inputs of the position-size calculator widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingInput {
    /// Total portfolio value the risk budget is taken from
    pub portfolio_value: f64,

    /// Share of the portfolio put at risk on this trade, in percent
    pub risk_percent: f64,

    /// Planned entry price
    pub entry_price: f64,

    /// Stop-loss price
    pub stop_loss: f64,

    /// Optional take-profit price, used for the reward/risk ratio
    #[serde(default)]
    pub take_profit: Option<f64>,
}

/// Output of the position-size calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    /// portfolio_value × risk_percent / 100
    pub risk_amount: f64,

    /// |entry − stop|
    pub risk_per_unit: f64,

    /// risk_amount / risk_per_unit
    pub position_size: f64,

    /// position_size × entry
    pub position_value: f64,

    /// position_value as a share of the portfolio, in percent
    pub position_percent: f64,

    /// |take_profit − entry| / risk_per_unit, when a take-profit was given
    pub reward_risk_ratio: Option<f64>,
}

/// Largest peak-to-trough decline of a value series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Drawdown {
    /// Decline as a fraction of the peak (0.25 = 25 %)
    pub max_drawdown: f64,
    pub peak_index: usize,
    pub trough_index: usize,
}

/// Risk widget numbers for one price (or portfolio value) series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskReport {
    /// Confidence level used for VaR / expected shortfall (e.g. 0.95)
    pub confidence: f64,

    /// Historical one-period Value at Risk, as a positive loss fraction
    pub value_at_risk: f64,

    /// Mean loss beyond the VaR threshold, as a positive fraction
    pub expected_shortfall: f64,

    /// Annualised volatility of simple returns
    pub volatility: f64,

    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub drawdown: Drawdown,
}

/// Bollinger bands aligned to the input series; `None` during warm-up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Indicator bundle shown next to the price chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma: Vec<Option<f64>>,
    pub ema: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub bollinger: BollingerBands,
}
