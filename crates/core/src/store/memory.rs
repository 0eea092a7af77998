use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::aggregate::PortfolioAggregate;
use crate::models::holding::Holding;
use crate::models::price::{PriceQuote, PriceUpdate};
use crate::services::metrics_service::MetricsService;

use super::traits::{PortfolioStore, StoreChange, StoreListener, SubscriptionId};

/// Amounts at or below this are treated as a closed position.
const DUST_AMOUNT: f64 = 1e-12;

/// In-memory [`PortfolioStore`]. Nothing survives the process.
pub struct InMemoryStore {
    holdings: Vec<Holding>,
    aggregate: PortfolioAggregate,
    quote: PriceQuote,
    revision: u64,
    listeners: Vec<(SubscriptionId, StoreListener)>,
    metrics: MetricsService,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("holdings", &self.holdings.len())
            .field("quoted_symbols", &self.quote.len())
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            holdings: Vec::new(),
            aggregate: PortfolioAggregate::default(),
            quote: PriceQuote::new(),
            revision: 0,
            listeners: Vec::new(),
            metrics: MetricsService::new(),
        }
    }

    /// Start from a known price map, e.g. the configured symbol seeds.
    pub fn with_prices(prices: &PriceUpdate) -> Self {
        let mut store = Self::new();
        store.quote = PriceQuote::from_prices(prices);
        store
    }

    /// Bulk-load holdings. Validates every holding first; on error nothing is loaded.
    pub fn with_holdings(mut self, holdings: Vec<Holding>) -> Result<Self, CoreError> {
        let mut seen = std::collections::HashSet::new();
        for h in &holdings {
            validate_holding(h)?;
            if !seen.insert(h.symbol.clone()) {
                return Err(CoreError::DuplicateHolding(h.symbol.clone()));
            }
        }
        self.holdings = holdings;
        self.recompute();
        Ok(self)
    }

    fn position(&self, id: Uuid) -> Result<usize, CoreError> {
        self.holdings
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| CoreError::HoldingNotFound(id.to_string()))
    }

    fn position_by_symbol(&self, symbol: &str) -> Option<usize> {
        self.holdings.iter().position(|h| h.symbol == symbol)
    }

    /// Recompute derived fields and the aggregate from the current inputs.
    fn recompute(&mut self) {
        let outcome = self.metrics.calculate(&self.holdings, None);
        self.holdings = outcome.holdings;
        self.aggregate = outcome.aggregate;
    }

    /// Bump the revision and tell every subscriber.
    fn commit(&mut self, change: StoreChange) {
        self.revision += 1;
        log::debug!("store revision {} after {:?}", self.revision, change);
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, listener) in &self.listeners {
            listener(&change, &snapshot);
        }
    }
}

impl PortfolioStore for InMemoryStore {
    fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    fn aggregate(&self) -> &PortfolioAggregate {
        &self.aggregate
    }

    fn quote(&self) -> &PriceQuote {
        &self.quote
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn add_holding(&mut self, mut holding: Holding) -> Result<Uuid, CoreError> {
        holding.symbol = holding.symbol.trim().to_uppercase();
        validate_holding(&holding)?;
        if self.position_by_symbol(&holding.symbol).is_some() {
            return Err(CoreError::DuplicateHolding(holding.symbol));
        }
        let id = holding.id;
        self.holdings.push(holding);
        self.recompute();
        self.commit(StoreChange::HoldingAdded(id));
        Ok(id)
    }

    fn update_holding(&mut self, id: Uuid, amount: f64, average_buy_price: f64) -> Result<(), CoreError> {
        let idx = self.position(id)?;
        validate_amount(amount)?;
        validate_price("average buy price", average_buy_price)?;
        let holding = &mut self.holdings[idx];
        holding.amount = amount;
        holding.average_buy_price = average_buy_price;
        self.recompute();
        self.commit(StoreChange::HoldingUpdated(id));
        Ok(())
    }

    fn remove_holding(&mut self, id: Uuid) -> Result<Holding, CoreError> {
        let idx = self.position(id)?;
        let removed = self.holdings.remove(idx);
        self.recompute();
        self.commit(StoreChange::HoldingRemoved(id));
        Ok(removed)
    }

    fn apply_prices(&mut self, update: &PriceUpdate) -> usize {
        let accepted = self.quote.merge(update);
        if accepted.is_empty() {
            return 0;
        }
        let updated = self
            .holdings
            .iter()
            .filter(|h| accepted.contains_key(&h.symbol))
            .count();
        let outcome = self.metrics.calculate(&self.holdings, Some(&accepted));
        self.holdings = outcome.holdings;
        self.aggregate = outcome.aggregate;
        self.commit(StoreChange::PricesApplied {
            symbols: accepted.len(),
            updated,
        });
        updated
    }

    fn record_buy(&mut self, symbol: &str, name: &str, amount: f64, price: f64) -> Result<Holding, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(CoreError::ValidationError("Symbol must not be empty".into()));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(CoreError::ValidationError("Buy amount must be positive".into()));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(CoreError::ValidationError("Buy price must be positive".into()));
        }

        let change = match self.position_by_symbol(&symbol) {
            Some(idx) => {
                let holding = &mut self.holdings[idx];
                let new_amount = holding.amount + amount;
                holding.average_buy_price =
                    (holding.amount * holding.average_buy_price + amount * price) / new_amount;
                holding.amount = new_amount;
                StoreChange::HoldingUpdated(holding.id)
            }
            None => {
                let current = self.quote.get(&symbol).unwrap_or(price);
                let display_name = if name.trim().is_empty() { symbol.as_str() } else { name };
                let holding = Holding::new(symbol.as_str(), display_name, amount, current, price);
                let id = holding.id;
                self.holdings.push(holding);
                StoreChange::HoldingAdded(id)
            }
        };

        self.recompute();
        let holding = self
            .position_by_symbol(&symbol)
            .map(|idx| self.holdings[idx].clone())
            .ok_or_else(|| CoreError::HoldingNotFound(symbol.clone()))?;
        log::debug!("simulated buy {amount} {symbol} @ {price}");
        self.commit(change);
        Ok(holding)
    }

    fn record_sell(&mut self, symbol: &str, amount: f64) -> Result<Option<Holding>, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if !(amount.is_finite() && amount > 0.0) {
            return Err(CoreError::ValidationError("Sell amount must be positive".into()));
        }
        let idx = self
            .position_by_symbol(&symbol)
            .ok_or_else(|| CoreError::HoldingNotFound(symbol.clone()))?;

        let held = self.holdings[idx].amount;
        if amount > held + DUST_AMOUNT {
            return Err(CoreError::InsufficientHoldings {
                symbol,
                requested: amount,
                available: held,
            });
        }

        let remaining = held - amount;
        let id = self.holdings[idx].id;
        let (change, result) = if remaining <= DUST_AMOUNT {
            self.holdings.remove(idx);
            (StoreChange::HoldingRemoved(id), None)
        } else {
            self.holdings[idx].amount = remaining;
            (StoreChange::HoldingUpdated(id), Some(id))
        };

        self.recompute();
        let holding = result.and_then(|id| self.holdings.iter().find(|h| h.id == id).cloned());
        log::debug!("simulated sell {amount} {symbol}");
        self.commit(change);
        Ok(holding)
    }

    fn subscribe(&mut self, listener: StoreListener) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }
}

// ── Validation ──────────────────────────────────────────────────────

fn validate_holding(holding: &Holding) -> Result<(), CoreError> {
    if holding.symbol.trim().is_empty() {
        return Err(CoreError::ValidationError("Symbol must not be empty".into()));
    }
    validate_amount(holding.amount)?;
    validate_price("current price", holding.current_price)?;
    validate_price("average buy price", holding.average_buy_price)
}

fn validate_amount(amount: f64) -> Result<(), CoreError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Amount must be a finite non-negative number, got {amount}"
        )));
    }
    Ok(())
}

fn validate_price(label: &str, price: f64) -> Result<(), CoreError> {
    if !price.is_finite() || price < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "{label} must be a finite non-negative number, got {price}"
        )));
    }
    Ok(())
}
