pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod store;

use rand::Rng;
use uuid::Uuid;

use errors::CoreError;
use models::{
    aggregate::PortfolioAggregate,
    analytics::{IndicatorSet, PositionSizing, PositionSizingInput, RiskReport},
    holding::Holding,
    order::{Order, OrderRequest, OrderSide, OrderType},
    order_book::OrderBookSnapshot,
    price::{PriceQuote, PriceUpdate},
    settings::DashboardSettings,
};
use providers::{market::SimulatedMarket, mock_data, seeded::SeededPriceSource, traits::PriceSource};
use services::{
    compute_service::{ComputeJob, ComputeOutput, ComputeWorker},
    feed_service::{FeedHandle, PriceFeed},
    indicator_service::IndicatorService,
    list_service::HoldingListView,
    order_service::OrderService,
    risk_service::RiskService,
};
use store::{
    memory::InMemoryStore,
    traits::{StoreListener, StoreSnapshot, SubscriptionId},
    SharedStore,
};

/// Default confidence level of the VaR widget.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

/// Main entry point for the dashboard core.
///
/// Owns the injected state store, the simulated order blotter and the
/// calculators the widgets read from. The presentation layer never computes
/// derived numbers itself; it reads them from here.
#[must_use]
pub struct CryptoDashboard {
    store: SharedStore,
    orders: OrderService,
    risk_service: RiskService,
    indicator_service: IndicatorService,
    settings: DashboardSettings,
}

impl std::fmt::Debug for CryptoDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = store::lock(&self.store);
        f.debug_struct("CryptoDashboard")
            .field("holdings", &store.holdings().len())
            .field("quoted_symbols", &store.quote().len())
            .field("revision", &store.revision())
            .field("orders", &self.orders.orders().len())
            .finish()
    }
}

impl CryptoDashboard {
    /// Create a dashboard with an empty in-memory store, quoting the
    /// configured symbols at their starting prices.
    pub fn new(settings: DashboardSettings) -> Result<Self, CoreError> {
        settings.validate()?;
        let store = store::shared(InMemoryStore::with_prices(&settings.initial_prices()));
        Ok(Self::build(settings, store))
    }

    /// Create a dashboard over an existing store.
    pub fn with_store(settings: DashboardSettings, store: SharedStore) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(settings, store))
    }

    /// Handle to the underlying store, for the price feed or other writers.
    pub fn store(&self) -> SharedStore {
        SharedStore::clone(&self.store)
    }

    #[must_use]
    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    // ── Reads ───────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        store::lock(&self.store).snapshot()
    }

    #[must_use]
    pub fn holdings(&self) -> Vec<Holding> {
        store::lock(&self.store).holdings().to_vec()
    }

    #[must_use]
    pub fn aggregate(&self) -> PortfolioAggregate {
        store::lock(&self.store).aggregate().clone()
    }

    #[must_use]
    pub fn quote(&self) -> PriceQuote {
        store::lock(&self.store).quote().clone()
    }

    /// Current price for a symbol, if one has been quoted.
    #[must_use]
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        store::lock(&self.store).quote().get(symbol)
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Add a holding. It is valued at the current quote, or at its average
    /// buy price when the symbol has never been quoted.
    pub fn add_holding(
        &mut self,
        symbol: &str,
        name: &str,
        amount: f64,
        average_buy_price: f64,
    ) -> Result<Uuid, CoreError> {
        let current_price = self.price_of(symbol).unwrap_or(average_buy_price);
        let name = self.display_name(symbol, name);
        let holding = Holding::new(symbol, name, amount, current_price, average_buy_price);
        store::lock(&self.store).add_holding(holding)
    }

    pub fn update_holding(&mut self, id: Uuid, amount: f64, average_buy_price: f64) -> Result<(), CoreError> {
        store::lock(&self.store).update_holding(id, amount, average_buy_price)
    }

    pub fn remove_holding(&mut self, id: Uuid) -> Result<Holding, CoreError> {
        store::lock(&self.store).remove_holding(id)
    }

    /// Simulated buy at `price` (weighted into the average buy price).
    pub fn buy(&mut self, symbol: &str, amount: f64, price: f64) -> Result<Holding, CoreError> {
        let name = self.display_name(symbol, "");
        store::lock(&self.store).record_buy(symbol, &name, amount, price)
    }

    /// Simulated sell. The average buy price is left untouched.
    pub fn sell(&mut self, symbol: &str, amount: f64) -> Result<Option<Holding>, CoreError> {
        store::lock(&self.store).record_sell(symbol, amount)
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Apply a price map, then fill any resting orders it triggers.
    /// Returns how many holdings were repriced.
    pub fn apply_prices(&mut self, update: &PriceUpdate) -> usize {
        let repriced = store::lock(&self.store).apply_prices(update);
        self.match_open_orders();
        repriced
    }

    // ── Orders ──────────────────────────────────────────────────────

    /// Submit the order form.
    ///
    /// Market orders execute immediately at the current quote; limit and stop
    /// orders rest until [`match_open_orders`](Self::match_open_orders) sees
    /// their condition met. A market order that cannot execute is recorded as
    /// rejected and the reason is returned.
    pub fn submit_order(&mut self, request: OrderRequest) -> Result<Order, CoreError> {
        let order = self.orders.submit(request)?;
        if order.order_type != OrderType::Market {
            return Ok(order);
        }

        let Some(price) = self.price_of(&order.symbol) else {
            self.orders.mark_rejected(order.id)?;
            return Err(CoreError::PriceNotAvailable {
                symbol: order.symbol,
            });
        };

        match self.execute(&order, price) {
            Ok(()) => self.orders.mark_filled(order.id, price),
            Err(e) => {
                self.orders.mark_rejected(order.id)?;
                Err(e)
            }
        }
    }

    pub fn cancel_order(&mut self, id: Uuid) -> Result<Order, CoreError> {
        self.orders.cancel(id)
    }

    /// Fill every resting order whose condition holds at the current quote.
    /// Orders that can't execute (e.g. selling more than held) are rejected.
    /// Returns the orders filled by this pass.
    ///
    /// The price feed writes to the store directly; call this after feed
    /// ticks (e.g. when polling `snapshot().revision`) to keep the blotter in
    /// step. Store listeners run under the store lock and must not call back
    /// into the dashboard.
    pub fn match_open_orders(&mut self) -> Vec<Order> {
        let quote = self.quote();
        let mut filled = Vec::new();
        for (id, price) in self.orders.triggered(&quote) {
            let Some(order) = self.orders.get(id).cloned() else {
                continue;
            };
            let outcome = match self.execute(&order, price) {
                Ok(()) => self.orders.mark_filled(id, price),
                Err(e) => {
                    log::warn!("rejecting order {id}: {e}");
                    self.orders.mark_rejected(id)
                }
            };
            match outcome {
                Ok(order) if order.filled_price.is_some() => filled.push(order),
                Ok(_) => {}
                Err(e) => log::warn!("order {id} could not be updated: {e}"),
            }
        }
        filled
    }

    #[must_use]
    pub fn orders(&self) -> &[Order] {
        self.orders.orders()
    }

    #[must_use]
    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders.open_orders()
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register a callback fired after every store write.
    pub fn subscribe(&self, listener: StoreListener) -> SubscriptionId {
        store::lock(&self.store).subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        store::lock(&self.store).unsubscribe(id)
    }

    // ── Widgets ─────────────────────────────────────────────────────

    /// Virtualized holdings table sized from the settings.
    pub fn holdings_view(&self) -> Result<HoldingListView, CoreError> {
        HoldingListView::new(
            self.holdings(),
            self.settings.container_height,
            self.settings.row_height,
        )
    }

    pub fn position_size(&self, input: &PositionSizingInput) -> Result<PositionSizing, CoreError> {
        self.risk_service.position_size(input)
    }

    /// Position size against the current portfolio value and the default
    /// risk percent.
    pub fn position_size_for_portfolio(
        &self,
        entry_price: f64,
        stop_loss: f64,
        take_profit: Option<f64>,
    ) -> Result<PositionSizing, CoreError> {
        self.risk_service.position_size(&PositionSizingInput {
            portfolio_value: self.aggregate().total_value,
            risk_percent: self.settings.default_risk_percent,
            entry_price,
            stop_loss,
            take_profit,
        })
    }

    #[must_use]
    pub fn risk_report(&self, prices: &[f64], risk_free_rate: f64) -> RiskReport {
        self.risk_service.analyze(prices, DEFAULT_VAR_CONFIDENCE, risk_free_rate)
    }

    pub fn indicators(&self, prices: &[f64], period: usize) -> Result<IndicatorSet, CoreError> {
        self.indicator_service.indicator_set(prices, period)
    }

    /// Order book mock-up around the symbol's current price.
    pub fn order_book<R: Rng>(&self, rng: &mut R, symbol: &str) -> Result<OrderBookSnapshot, CoreError> {
        let mid = self.price_of(symbol).ok_or_else(|| CoreError::PriceNotAvailable {
            symbol: symbol.to_uppercase(),
        })?;
        mock_data::generate_order_book(rng, symbol, mid, self.settings.order_book_depth)
    }

    // ── Price feed ──────────────────────────────────────────────────

    /// Start pushing prices from `source` into the store at the configured
    /// interval. Must be called from within a tokio runtime.
    pub fn start_price_feed(&self, source: Box<dyn PriceSource>) -> FeedHandle {
        PriceFeed::start(source, self.store(), self.settings.feed_interval())
    }

    /// Reproducible source over the configured symbols.
    pub fn seeded_price_source(&self, seed: u64) -> Result<SeededPriceSource, CoreError> {
        SeededPriceSource::new(
            seed,
            &self.settings.initial_prices(),
            self.settings.max_price_change_percent,
        )
    }

    /// Live-demo source over the configured symbols.
    pub fn simulated_market(&self) -> Result<SimulatedMarket, CoreError> {
        SimulatedMarket::new(&self.settings.symbols, self.settings.max_price_change_percent)
    }

    // ── Background computation ──────────────────────────────────────

    /// Worker using the configured timeout. Must be called from within a
    /// tokio runtime.
    pub fn compute_worker(&self) -> ComputeWorker {
        ComputeWorker::standard(self.settings.worker_timeout())
    }

    /// Recompute the aggregate on `worker`. On any failure the last aggregate
    /// held by the store is returned instead.
    pub async fn refresh_aggregate_with(&self, worker: &ComputeWorker) -> PortfolioAggregate {
        let holdings = self.holdings();
        match worker.submit(ComputeJob::Aggregate(holdings)).await {
            Ok(ComputeOutput::Aggregate(aggregate)) => aggregate,
            Ok(other) => {
                log::warn!("unexpected compute output {other:?}; keeping last aggregate");
                self.aggregate()
            }
            Err(e) => {
                log::warn!("background aggregate failed: {e}; keeping last aggregate");
                self.aggregate()
            }
        }
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(settings: DashboardSettings, store: SharedStore) -> Self {
        Self {
            store,
            orders: OrderService::new(),
            risk_service: RiskService::new(),
            indicator_service: IndicatorService::new(),
            settings,
        }
    }

    fn display_name(&self, symbol: &str, name: &str) -> String {
        if !name.trim().is_empty() {
            return name.to_string();
        }
        self.settings
            .name_for(symbol)
            .map(str::to_string)
            .unwrap_or_else(|| symbol.trim().to_uppercase())
    }

    fn execute(&self, order: &Order, price: f64) -> Result<(), CoreError> {
        let mut store = store::lock(&self.store);
        match order.side {
            OrderSide::Buy => {
                let name = self.display_name(&order.symbol, "");
                store.record_buy(&order.symbol, &name, order.quantity, price).map(|_| ())
            }
            OrderSide::Sell => store.record_sell(&order.symbol, order.quantity).map(|_| ()),
        }
    }
}
