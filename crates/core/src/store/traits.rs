use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::aggregate::PortfolioAggregate;
use crate::models::holding::Holding;
use crate::models::price::{PriceQuote, PriceUpdate};

/// Handle returned by [`PortfolioStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

/// What a write changed. Sent to subscribers together with the new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    HoldingAdded(Uuid),
    HoldingUpdated(Uuid),
    HoldingRemoved(Uuid),
    /// Price map merged; `updated` holdings were repriced
    PricesApplied { symbols: usize, updated: usize },
}

/// Owned copy of the store's readable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub holdings: Vec<Holding>,
    pub aggregate: PortfolioAggregate,
    pub quote: PriceQuote,
    /// Incremented on every successful write
    pub revision: u64,
}

/// Subscriber callback. Runs while the store is being written to, so it must
/// not call back into the store.
pub type StoreListener = Box<dyn Fn(&StoreChange, &StoreSnapshot) + Send>;

/// State container the presentation layer reads from and writes through.
///
/// Implementations keep every derived field consistent: after any write,
/// `holdings()` and `aggregate()` reflect the new inputs.
pub trait PortfolioStore: Send {
    // ── Reads ───────────────────────────────────────────────────────

    fn holdings(&self) -> &[Holding];

    fn aggregate(&self) -> &PortfolioAggregate;

    fn quote(&self) -> &PriceQuote;

    fn revision(&self) -> u64;

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            holdings: self.holdings().to_vec(),
            aggregate: self.aggregate().clone(),
            quote: self.quote().clone(),
            revision: self.revision(),
        }
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Add a new holding. Fails if the symbol is already held.
    fn add_holding(&mut self, holding: Holding) -> Result<Uuid, CoreError>;

    /// Change the inputs of an existing holding.
    fn update_holding(&mut self, id: Uuid, amount: f64, average_buy_price: f64) -> Result<(), CoreError>;

    fn remove_holding(&mut self, id: Uuid) -> Result<Holding, CoreError>;

    /// Merge a price map and reprice the affected holdings.
    /// Returns how many holdings were repriced.
    fn apply_prices(&mut self, update: &PriceUpdate) -> usize;

    /// Simulated buy: weighted-average the purchase price into the holding,
    /// creating it when absent.
    fn record_buy(&mut self, symbol: &str, name: &str, amount: f64, price: f64) -> Result<Holding, CoreError>;

    /// Simulated sell: reduce the amount without touching the average price.
    /// Returns `None` when the whole position was sold.
    fn record_sell(&mut self, symbol: &str, amount: f64) -> Result<Option<Holding>, CoreError>;

    // ── Subscriptions ───────────────────────────────────────────────

    fn subscribe(&mut self, listener: StoreListener) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}
