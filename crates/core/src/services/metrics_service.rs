use crate::models::aggregate::{PortfolioAggregate, NO_PERFORMER};
use crate::models::holding::{percent_of, Holding};
use crate::models::price::{is_valid_price, normalize_update, PriceUpdate};

/// Result of one metrics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOutcome {
    pub holdings: Vec<Holding>,
    pub aggregate: PortfolioAggregate,
}

/// Derived-metrics calculator.
///
/// Pure business logic with no I/O or shared state. Given holdings and an optional
/// price update it returns new values; the caller decides what to keep.
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    /// Apply an optional price update, then recompute every derived field and
    /// the portfolio aggregate.
    #[must_use]
    pub fn calculate(&self, holdings: &[Holding], updates: Option<&PriceUpdate>) -> MetricsOutcome {
        let mut updated = match updates {
            Some(updates) => self.apply_price_updates(holdings, updates),
            None => {
                let mut copy = holdings.to_vec();
                copy.iter_mut().for_each(Holding::recompute);
                copy
            }
        };
        let aggregate = self.aggregate(&updated);
        Self::assign_allocations(&mut updated, aggregate.total_value);
        MetricsOutcome {
            holdings: updated,
            aggregate,
        }
    }

    /// Return copies of `holdings` with the update applied.
    ///
    /// Symbols are matched case-insensitively. Entries that are missing or
    /// malformed leave the corresponding holding untouched.
    #[must_use]
    pub fn apply_price_updates(&self, holdings: &[Holding], updates: &PriceUpdate) -> Vec<Holding> {
        let updates = normalize_update(updates);
        holdings
            .iter()
            .map(|h| {
                let mut h = h.clone();
                if let Some(&price) = updates.get(&h.symbol) {
                    Self::apply_price(&mut h, price);
                }
                h
            })
            .collect()
    }

    /// Move one holding to a new unit price. Returns `false` (and leaves the
    /// holding as it was) when the price is not usable.
    pub fn apply_price(holding: &mut Holding, price: f64) -> bool {
        if !is_valid_price(price) {
            return false;
        }
        let previous = holding.current_price;
        holding.daily_change = price - previous;
        holding.daily_change_percent = percent_of(holding.daily_change, previous);
        holding.current_price = price;
        holding.recompute();
        true
    }

    /// Build the portfolio aggregate from already-computed holdings.
    #[must_use]
    pub fn aggregate(&self, holdings: &[Holding]) -> PortfolioAggregate {
        if holdings.is_empty() {
            return PortfolioAggregate::default();
        }

        let mut total_value = 0.0;
        let mut total_cost = 0.0;
        let mut daily_change = 0.0;
        let mut best: Option<&Holding> = None;
        let mut worst: Option<&Holding> = None;

        for h in holdings {
            total_value += h.total_value;
            total_cost += h.cost_basis();
            daily_change += h.amount * h.daily_change;

            // Strict comparisons keep the first occurrence on ties.
            if best.map_or(true, |b| h.daily_change_percent > b.daily_change_percent) {
                best = Some(h);
            }
            if worst.map_or(true, |w| h.daily_change_percent < w.daily_change_percent) {
                worst = Some(h);
            }
        }

        let total_gain_loss = total_value - total_cost;
        let previous_value = total_value - daily_change;

        PortfolioAggregate {
            total_value,
            total_cost,
            total_gain_loss,
            total_gain_loss_percent: percent_of(total_gain_loss, total_cost),
            daily_change,
            daily_change_percent: percent_of(daily_change, previous_value),
            holdings_count: holdings.len(),
            best_performer: best.map_or_else(|| NO_PERFORMER.to_string(), |h| h.symbol.clone()),
            worst_performer: worst.map_or_else(|| NO_PERFORMER.to_string(), |h| h.symbol.clone()),
        }
    }

    /// Fill in each holding's share of `total_value`.
    pub fn assign_allocations(holdings: &mut [Holding], total_value: f64) {
        for h in holdings {
            h.allocation_percent = percent_of(h.total_value, total_value);
        }
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}
