use crate::errors::CoreError;
use crate::models::analytics::{Drawdown, PositionSizing, PositionSizingInput, RiskReport};

/// Trading periods per year used to annualise volatility (crypto trades daily).
pub const PERIODS_PER_YEAR: f64 = 365.0;

/// Risk widgets: position sizing, VaR, drawdown, volatility and ratios.
///
/// Textbook formulas over plain slices. Empty or too-short inputs yield
/// zeros instead of errors, matching how the widgets render "no data".
pub struct RiskService;

impl RiskService {
    pub fn new() -> Self {
        Self
    }

    /// How many units to buy so that hitting the stop loses exactly the
    /// risk budget.
    ///
    /// E.g. portfolio 100 000, risk 2 %, entry 100, stop 90 → risk 2 000,
    /// 10 per unit, 200 units.
    pub fn position_size(&self, input: &PositionSizingInput) -> Result<PositionSizing, CoreError> {
        if !(input.portfolio_value.is_finite() && input.portfolio_value > 0.0) {
            return Err(CoreError::ValidationError("Portfolio value must be positive".into()));
        }
        if !(input.risk_percent > 0.0 && input.risk_percent <= 100.0) {
            return Err(CoreError::ValidationError(format!(
                "Risk percent must be in (0, 100], got {}",
                input.risk_percent
            )));
        }
        if !(input.entry_price.is_finite() && input.entry_price > 0.0) {
            return Err(CoreError::ValidationError("Entry price must be positive".into()));
        }
        if !(input.stop_loss.is_finite() && input.stop_loss > 0.0) {
            return Err(CoreError::ValidationError("Stop loss must be positive".into()));
        }

        let risk_per_unit = (input.entry_price - input.stop_loss).abs();
        if risk_per_unit == 0.0 {
            return Err(CoreError::ValidationError(
                "Stop loss must differ from the entry price".into(),
            ));
        }

        let risk_amount = input.portfolio_value * input.risk_percent / 100.0;
        let position_size = risk_amount / risk_per_unit;
        let position_value = position_size * input.entry_price;

        let reward_risk_ratio = match input.take_profit {
            Some(tp) if tp.is_finite() && tp > 0.0 => Some((tp - input.entry_price).abs() / risk_per_unit),
            Some(tp) => {
                return Err(CoreError::ValidationError(format!(
                    "Take profit must be positive, got {tp}"
                )))
            }
            None => None,
        };

        Ok(PositionSizing {
            risk_amount,
            risk_per_unit,
            position_size,
            position_value,
            position_percent: position_value / input.portfolio_value * 100.0,
            reward_risk_ratio,
        })
    }

    /// Period-over-period simple returns. Pairs with a non-positive base are skipped.
    #[must_use]
    pub fn simple_returns(&self, prices: &[f64]) -> Vec<f64> {
        prices
            .windows(2)
            .filter(|w| w[0] > 0.0 && w[0].is_finite() && w[1].is_finite())
            .map(|w| w[1] / w[0] - 1.0)
            .collect()
    }

    /// Historical Value at Risk at `confidence` (e.g. 0.95), as a positive
    /// loss fraction. 0 when returns are empty or no loss is expected.
    #[must_use]
    pub fn value_at_risk(&self, returns: &[f64], confidence: f64) -> f64 {
        let Some(threshold) = loss_quantile(returns, confidence) else {
            return 0.0;
        };
        (-threshold).max(0.0)
    }

    /// Mean loss in the tail at or beyond the VaR quantile (CVaR).
    #[must_use]
    pub fn expected_shortfall(&self, returns: &[f64], confidence: f64) -> f64 {
        let Some(threshold) = loss_quantile(returns, confidence) else {
            return 0.0;
        };
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= threshold).collect();
        if tail.is_empty() {
            return 0.0;
        }
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        (-mean).max(0.0)
    }

    /// Largest decline from a running peak.
    #[must_use]
    pub fn max_drawdown(&self, values: &[f64]) -> Drawdown {
        let mut result = Drawdown::default();
        let Some(&first) = values.first() else {
            return result;
        };

        let mut peak = first;
        let mut peak_index = 0;
        for (i, &value) in values.iter().enumerate() {
            if value > peak {
                peak = value;
                peak_index = i;
            }
            if peak > 0.0 {
                let dd = (peak - value) / peak;
                if dd > result.max_drawdown {
                    result = Drawdown {
                        max_drawdown: dd,
                        peak_index,
                        trough_index: i,
                    };
                }
            }
        }
        result
    }

    /// Annualised sample standard deviation of returns.
    #[must_use]
    pub fn volatility(&self, returns: &[f64]) -> f64 {
        std_dev(returns) * PERIODS_PER_YEAR.sqrt()
    }

    /// Annualised Sharpe ratio; `risk_free_rate` is annual.
    #[must_use]
    pub fn sharpe_ratio(&self, returns: &[f64], risk_free_rate: f64) -> f64 {
        let sd = std_dev(returns);
        if sd < 1e-12 {
            return 0.0;
        }
        let excess = mean(returns) - risk_free_rate / PERIODS_PER_YEAR;
        excess / sd * PERIODS_PER_YEAR.sqrt()
    }

    /// Like Sharpe, but only penalises downside deviation.
    #[must_use]
    pub fn sortino_ratio(&self, returns: &[f64], risk_free_rate: f64) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let target = risk_free_rate / PERIODS_PER_YEAR;
        let downside = returns
            .iter()
            .map(|r| (r - target).min(0.0).powi(2))
            .sum::<f64>()
            / returns.len() as f64;
        let dd = downside.sqrt();
        if dd < 1e-12 {
            return 0.0;
        }
        (mean(returns) - target) / dd * PERIODS_PER_YEAR.sqrt()
    }

    /// Every risk widget number for one price series.
    #[must_use]
    pub fn analyze(&self, prices: &[f64], confidence: f64, risk_free_rate: f64) -> RiskReport {
        let returns = self.simple_returns(prices);
        RiskReport {
            confidence,
            value_at_risk: self.value_at_risk(&returns, confidence),
            expected_shortfall: self.expected_shortfall(&returns, confidence),
            volatility: self.volatility(&returns),
            sharpe_ratio: self.sharpe_ratio(&returns, risk_free_rate),
            sortino_ratio: self.sortino_ratio(&returns, risk_free_rate),
            drawdown: self.max_drawdown(prices),
        }
    }
}

impl Default for RiskService {
    fn default() -> Self {
        Self::new()
    }
}

/// Return at the (1 − confidence) quantile of the sorted returns.
fn loss_quantile(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() || !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    // The epsilon absorbs representation error, e.g. (1 − 0.9) × 10 = 0.999…
    let index = ((1.0 - confidence) * sorted.len() as f64 + 1e-9).floor() as usize;
    sorted.get(index.min(sorted.len() - 1)).copied()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
