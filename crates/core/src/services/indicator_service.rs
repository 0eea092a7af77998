use crate::errors::CoreError;
use crate::models::analytics::{BollingerBands, IndicatorSet};

/// Technical indicators for the price chart.
///
/// Every series is aligned with its input: position `i` describes `prices[i]`,
/// and is `None` until enough data has been seen.
pub struct IndicatorService;

impl IndicatorService {
    pub fn new() -> Self {
        Self
    }

    /// Simple moving average.
    pub fn sma(&self, prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, CoreError> {
        check_period(period)?;
        let mut out = vec![None; prices.len()];
        if prices.len() < period {
            return Ok(out);
        }
        let mut sum: f64 = prices[..period].iter().sum();
        out[period - 1] = Some(sum / period as f64);
        for i in period..prices.len() {
            sum += prices[i] - prices[i - period];
            out[i] = Some(sum / period as f64);
        }
        Ok(out)
    }

    /// Exponential moving average, seeded with the SMA of the first `period` prices.
    pub fn ema(&self, prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, CoreError> {
        check_period(period)?;
        let mut out = vec![None; prices.len()];
        if prices.len() < period {
            return Ok(out);
        }
        let alpha = 2.0 / (period as f64 + 1.0);
        let mut value = prices[..period].iter().sum::<f64>() / period as f64;
        out[period - 1] = Some(value);
        for i in period..prices.len() {
            value = alpha * prices[i] + (1.0 - alpha) * value;
            out[i] = Some(value);
        }
        Ok(out)
    }

    /// Wilder's relative strength index (0–100).
    pub fn rsi(&self, prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, CoreError> {
        check_period(period)?;
        let mut out = vec![None; prices.len()];
        if prices.len() <= period {
            return Ok(out);
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let change = prices[i] - prices[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss -= change;
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;
        out[period] = Some(rsi_value(avg_gain, avg_loss));

        for i in (period + 1)..prices.len() {
            let change = prices[i] - prices[i - 1];
            let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
            out[i] = Some(rsi_value(avg_gain, avg_loss));
        }
        Ok(out)
    }

    /// SMA middle band ± `k` population standard deviations.
    pub fn bollinger_bands(&self, prices: &[f64], period: usize, k: f64) -> Result<BollingerBands, CoreError> {
        let middle = self.sma(prices, period)?;
        let mut upper = vec![None; prices.len()];
        let mut lower = vec![None; prices.len()];
        for (i, m) in middle.iter().enumerate() {
            if let Some(m) = m {
                let window = &prices[i + 1 - period..=i];
                let variance = window.iter().map(|p| (p - m).powi(2)).sum::<f64>() / period as f64;
                let sd = variance.sqrt();
                upper[i] = Some(m + k * sd);
                lower[i] = Some(m - k * sd);
            }
        }
        Ok(BollingerBands { upper, middle, lower })
    }

    /// The chart's default indicator bundle (RSI uses Wilder's 14).
    pub fn indicator_set(&self, prices: &[f64], period: usize) -> Result<IndicatorSet, CoreError> {
        Ok(IndicatorSet {
            sma: self.sma(prices, period)?,
            ema: self.ema(prices, period)?,
            rsi: self.rsi(prices, 14)?,
            bollinger: self.bollinger_bands(prices, period, 2.0)?,
        })
    }
}

impl Default for IndicatorService {
    fn default() -> Self {
        Self::new()
    }
}

fn check_period(period: usize) -> Result<(), CoreError> {
    if period == 0 {
        return Err(CoreError::ValidationError("Indicator period must be > 0".into()));
    }
    Ok(())
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
