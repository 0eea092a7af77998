use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crypto_dashboard_core::errors::CoreError;
use crypto_dashboard_core::models::analytics::PositionSizingInput;
use crypto_dashboard_core::models::holding::Holding;
use crypto_dashboard_core::models::order::{OrderRequest, OrderSide, OrderStatus};
use crypto_dashboard_core::models::price::PriceUpdate;
use crypto_dashboard_core::models::settings::DashboardSettings;
use crypto_dashboard_core::providers::mock_data::generate_holdings;
use crypto_dashboard_core::providers::traits::PriceSource;
use crypto_dashboard_core::services::compute_service::{
    ComputeBackend, ComputeJob, ComputeOutput, ComputeWorker, StandardBackend,
};
use crypto_dashboard_core::services::list_service::HoldingSortKey;
use crypto_dashboard_core::services::metrics_service::MetricsService;
use crypto_dashboard_core::services::risk_service::RiskService;
use crypto_dashboard_core::store::memory::InMemoryStore;
use crypto_dashboard_core::store::{self, shared};
use crypto_dashboard_core::CryptoDashboard;

// ═══════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn update(pairs: &[(&str, f64)]) -> PriceUpdate {
    pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}

fn dashboard() -> CryptoDashboard {
    init_logging();
    CryptoDashboard::new(DashboardSettings::default()).unwrap()
}

/// Dashboard over a store that already holds 2 BTC (avg 40 000) worth 100 000.
fn dashboard_with_btc() -> CryptoDashboard {
    init_logging();
    let store = InMemoryStore::with_prices(&update(&[("BTC", 50_000.0)]))
        .with_holdings(vec![Holding::new("BTC", "Bitcoin", 2.0, 50_000.0, 40_000.0)])
        .unwrap();
    CryptoDashboard::with_store(DashboardSettings::default(), shared(store)).unwrap()
}

fn fast_settings(interval_ms: u64) -> DashboardSettings {
    DashboardSettings {
        feed_interval_ms: interval_ms,
        ..DashboardSettings::default()
    }
}

// ── Mock price sources ──────────────────────────────────────────────

/// Fails on every tick.
struct FailingSource;

#[async_trait]
impl PriceSource for FailingSource {
    fn name(&self) -> &str {
        "FailingSource"
    }

    fn symbols(&self) -> Vec<String> {
        vec!["BTC".into()]
    }

    async fn next_prices(&mut self) -> Result<PriceUpdate, CoreError> {
        Err(CoreError::PriceNotAvailable {
            symbol: "BTC".into(),
        })
    }
}

/// Emits one valid and one malformed price per tick.
struct HalfBrokenSource {
    price: f64,
}

#[async_trait]
impl PriceSource for HalfBrokenSource {
    fn name(&self) -> &str {
        "HalfBrokenSource"
    }

    fn symbols(&self) -> Vec<String> {
        vec!["BTC".into(), "ETH".into()]
    }

    async fn next_prices(&mut self) -> Result<PriceUpdate, CoreError> {
        self.price += 1.0;
        Ok(update(&[("BTC", self.price), ("ETH", f64::NAN)]))
    }
}

// ── Mock compute backends ───────────────────────────────────────────

/// Blocks longer than any test timeout.
struct SlowBackend;

impl ComputeBackend for SlowBackend {
    fn run(&self, job: ComputeJob) -> Result<ComputeOutput, CoreError> {
        std::thread::sleep(Duration::from_millis(300));
        StandardBackend::new().run(job)
    }
}

struct PanickingBackend;

impl ComputeBackend for PanickingBackend {
    fn run(&self, _job: ComputeJob) -> Result<ComputeOutput, CoreError> {
        panic!("backend exploded");
    }
}

/// Counts the jobs it actually ran.
struct CountingBackend {
    runs: Arc<AtomicUsize>,
    delay: Duration,
}

impl ComputeBackend for CountingBackend {
    fn run(&self, job: ComputeJob) -> Result<ComputeOutput, CoreError> {
        std::thread::sleep(self.delay);
        self.runs.fetch_add(1, Ordering::SeqCst);
        StandardBackend::new().run(job)
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Dashboard construction and reads
// ═══════════════════════════════════════════════════════════════════

mod dashboard_basics {
    use super::*;

    #[test]
    fn default_dashboard_quotes_configured_symbols() {
        let d = dashboard();
        assert!(d.holdings().is_empty());
        assert_eq!(d.quote().len(), 6);
        assert_eq!(d.price_of("btc"), Some(43_250.0));
        assert_eq!(d.aggregate().holdings_count, 0);
        assert_eq!(d.snapshot().revision, 0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = DashboardSettings {
            row_height: 0.0,
            ..DashboardSettings::default()
        };
        assert!(matches!(
            CryptoDashboard::new(settings),
            Err(CoreError::InvalidSettings(_))
        ));
    }

    #[test]
    fn debug_output_summarises_state() {
        let d = dashboard_with_btc();
        let out = format!("{d:?}");
        assert!(out.contains("CryptoDashboard"));
        assert!(out.contains("holdings: 1"));
    }

    #[test]
    fn store_handle_is_shared() {
        let d = dashboard();
        store::lock(&d.store()).apply_prices(&update(&[("BTC", 1.0)]));
        assert_eq!(d.price_of("BTC"), Some(1.0));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Holdings through the facade
// ═══════════════════════════════════════════════════════════════════

mod dashboard_holdings {
    use super::*;

    #[test]
    fn add_holding_values_at_quote_and_fills_name() {
        let mut d = dashboard();
        d.add_holding("btc", "", 1.0, 40_000.0).unwrap();
        let h = &d.holdings()[0];
        assert_eq!(h.symbol, "BTC");
        assert_eq!(h.name, "Bitcoin");
        approx(h.current_price, 43_250.0);
        approx(h.total_gain_loss, 3_250.0);
    }

    #[test]
    fn add_unquoted_holding_uses_average_price() {
        let mut d = dashboard();
        d.add_holding("XRP", "Ripple", 100.0, 0.6).unwrap();
        approx(d.holdings()[0].current_price, 0.6);
        approx(d.aggregate().total_gain_loss, 0.0);
    }

    #[test]
    fn update_and_remove() {
        let mut d = dashboard();
        let id = d.add_holding("ETH", "Ethereum", 1.0, 2_000.0).unwrap();
        d.update_holding(id, 2.0, 2_000.0).unwrap();
        approx(d.aggregate().total_value, 4_560.0);
        d.remove_holding(id).unwrap();
        assert!(d.holdings().is_empty());
    }

    #[test]
    fn buy_then_sell_everything() {
        let mut d = dashboard();
        let h = d.buy("SOL", 10.0, 100.0).unwrap();
        assert_eq!(h.name, "Solana");
        approx(h.current_price, 98.5);

        let h = d.buy("SOL", 10.0, 80.0).unwrap();
        approx(h.average_buy_price, 90.0);

        let h = d.sell("SOL", 5.0).unwrap().unwrap();
        approx(h.amount, 15.0);
        approx(h.average_buy_price, 90.0);

        assert_eq!(d.sell("SOL", 15.0).unwrap(), None);
        assert!(d.holdings().is_empty());
    }

    #[test]
    fn price_update_flows_into_aggregate() {
        let mut d = dashboard_with_btc();
        assert_eq!(d.apply_prices(&update(&[("BTC", 60_000.0)])), 1);
        let a = d.aggregate();
        approx(a.total_value, 120_000.0);
        approx(a.total_gain_loss_percent, 50.0);
        approx(a.daily_change, 20_000.0);
        assert_eq!(a.best_performer, "BTC");
    }

    #[test]
    fn subscribers_hear_facade_writes() {
        let mut d = dashboard();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let id = d.subscribe(Box::new(move |_, _| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));
        d.buy("BTC", 1.0, 40_000.0).unwrap();
        d.apply_prices(&update(&[("BTC", 41_000.0)]));
        assert!(d.unsubscribe(id));
        d.sell("BTC", 1.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Orders through the facade
// ═══════════════════════════════════════════════════════════════════

mod dashboard_orders {
    use super::*;

    #[test]
    fn market_buy_fills_at_quote() {
        let mut d = dashboard();
        let order = d.submit_order(OrderRequest::market("ETH", OrderSide::Buy, 2.0)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_price, Some(2_280.0));
        approx(d.holdings()[0].amount, 2.0);
        approx(d.holdings()[0].average_buy_price, 2_280.0);
    }

    #[test]
    fn market_sell_without_holding_is_rejected() {
        let mut d = dashboard();
        let err = d
            .submit_order(OrderRequest::market("BTC", OrderSide::Sell, 1.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::HoldingNotFound(_)));
        assert_eq!(d.orders()[0].status, OrderStatus::Rejected);
    }

    #[test]
    fn market_order_needs_a_quote() {
        let mut d = dashboard();
        let err = d
            .submit_order(OrderRequest::market("DOGE", OrderSide::Buy, 1.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::PriceNotAvailable { symbol } if symbol == "DOGE"));
        assert_eq!(d.orders()[0].status, OrderStatus::Rejected);
    }

    #[test]
    fn invalid_form_records_nothing() {
        let mut d = dashboard();
        assert!(d
            .submit_order(OrderRequest::market("BTC", OrderSide::Buy, -1.0))
            .is_err());
        assert!(d.orders().is_empty());
    }

    #[test]
    fn limit_buy_fills_when_price_drops() {
        let mut d = dashboard();
        let order = d
            .submit_order(OrderRequest::limit("BTC", OrderSide::Buy, 0.5, 42_000.0))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(d.open_orders().len(), 1);

        d.apply_prices(&update(&[("BTC", 42_500.0)]));
        assert_eq!(d.open_orders().len(), 1);

        d.apply_prices(&update(&[("BTC", 41_000.0)]));
        assert!(d.open_orders().is_empty());
        assert_eq!(d.orders()[0].status, OrderStatus::Filled);
        assert_eq!(d.orders()[0].filled_price, Some(41_000.0));
        approx(d.holdings()[0].amount, 0.5);
        approx(d.holdings()[0].average_buy_price, 41_000.0);
    }

    #[test]
    fn stop_loss_sells_position() {
        let mut d = dashboard_with_btc();
        d.submit_order(OrderRequest::stop_loss("BTC", OrderSide::Sell, 2.0, 45_000.0))
            .unwrap();
        d.apply_prices(&update(&[("BTC", 44_000.0)]));
        assert!(d.holdings().is_empty());
        assert_eq!(d.orders()[0].filled_price, Some(44_000.0));
    }

    #[test]
    fn unexecutable_resting_order_is_rejected() {
        let mut d = dashboard();
        d.submit_order(OrderRequest::limit("BTC", OrderSide::Sell, 5.0, 40_000.0))
            .unwrap();
        d.apply_prices(&update(&[("BTC", 41_000.0)]));
        assert_eq!(d.orders()[0].status, OrderStatus::Rejected);
        assert!(d.holdings().is_empty());
    }

    #[test]
    fn match_open_orders_after_direct_store_write() {
        let mut d = dashboard();
        d.submit_order(OrderRequest::limit("ETH", OrderSide::Buy, 1.0, 2_000.0))
            .unwrap();
        let seen = d.snapshot().revision;
        // Writers like the price feed go straight to the store.
        store::lock(&d.store()).apply_prices(&update(&[("ETH", 1_900.0)]));
        assert_eq!(d.open_orders().len(), 1);
        assert!(d.snapshot().revision > seen);

        let filled = d.match_open_orders();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].filled_price, Some(1_900.0));
        assert!(d.match_open_orders().is_empty());
    }

    #[test]
    fn cancel_resting_order() {
        let mut d = dashboard();
        let order = d
            .submit_order(OrderRequest::limit("BTC", OrderSide::Buy, 1.0, 1.0))
            .unwrap();
        assert_eq!(d.cancel_order(order.id).unwrap().status, OrderStatus::Cancelled);
        d.apply_prices(&update(&[("BTC", 0.5)]));
        assert!(d.holdings().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Widgets
// ═══════════════════════════════════════════════════════════════════

mod widgets {
    use super::*;

    #[test]
    fn holdings_view_virtualizes_large_portfolio() {
        init_logging();
        let settings = DashboardSettings::default();
        let mut rng = StdRng::seed_from_u64(8);
        let holdings = generate_holdings(&mut rng, 10_000, &settings.symbols);
        let store = InMemoryStore::new().with_holdings(holdings).unwrap();
        let d = CryptoDashboard::with_store(settings, shared(store)).unwrap();

        let mut view = d.holdings_view().unwrap();
        assert_eq!(view.len(), 10_000);
        assert_eq!(view.visible_rows().len(), 12);

        view.set_sort(HoldingSortKey::Value);
        view.set_sort(HoldingSortKey::Value);
        let top = view.visible_rows()[0].holding.total_value;
        assert!(view.ordered().all(|h| h.total_value <= top));

        view.scroll_to(5_600.0);
        assert_eq!(view.visible_rows()[0].index, 100);
    }

    #[test]
    fn holdings_view_with_oversized_viewport() {
        init_logging();
        let settings = DashboardSettings {
            container_height: 1e20,
            row_height: 1.0,
            ..DashboardSettings::default()
        };
        let store = InMemoryStore::new()
            .with_holdings(vec![Holding::new("BTC", "Bitcoin", 2.0, 50_000.0, 40_000.0)])
            .unwrap();
        let d = CryptoDashboard::with_store(settings, shared(store)).unwrap();

        let view = d.holdings_view().unwrap();
        assert_eq!(view.visible_rows().len(), 1);
    }

    #[test]
    fn position_size_against_portfolio_value() {
        let d = dashboard_with_btc();
        let sizing = d.position_size_for_portfolio(100.0, 90.0, Some(130.0)).unwrap();
        approx(sizing.risk_amount, 2_000.0);
        approx(sizing.position_size, 200.0);
        approx(sizing.reward_risk_ratio.unwrap(), 3.0);
    }

    #[test]
    fn position_size_on_empty_portfolio_fails() {
        let d = dashboard();
        assert!(d.position_size_for_portfolio(100.0, 90.0, None).is_err());
        let explicit = d
            .position_size(&PositionSizingInput {
                portfolio_value: 10_000.0,
                risk_percent: 1.0,
                entry_price: 50.0,
                stop_loss: 45.0,
                take_profit: None,
            })
            .unwrap();
        approx(explicit.position_size, 20.0);
    }

    #[test]
    fn risk_report_uses_default_confidence() {
        let d = dashboard();
        let report = d.risk_report(&[100.0, 120.0, 90.0, 110.0, 60.0, 130.0], 0.0);
        approx(report.confidence, 0.95);
        approx(report.drawdown.max_drawdown, 0.5);
    }

    #[test]
    fn indicators_pass_through() {
        let d = dashboard();
        let set = d.indicators(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(set.sma[4], Some(4.0));
        assert!(d.indicators(&[1.0], 0).is_err());
    }

    #[test]
    fn order_book_around_quote() {
        let d = dashboard();
        let mut rng = StdRng::seed_from_u64(1);
        let book = d.order_book(&mut rng, "eth").unwrap();
        assert_eq!(book.bids.len(), 10);
        assert!(book.best_bid().unwrap() < 2_280.0);
        assert!(matches!(
            d.order_book(&mut rng, "doge"),
            Err(CoreError::PriceNotAvailable { symbol }) if symbol == "DOGE"
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Price feed
// ═══════════════════════════════════════════════════════════════════

mod price_feed {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_update_waits_one_interval() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(d.seeded_price_source(1).unwrap()));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(handle.ticks(), 0);
        assert_eq!(d.snapshot().revision, 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(handle.ticks(), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_feed_is_reproducible() {
        init_logging();
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(d.seeded_price_source(42).unwrap()));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let ticks = handle.ticks();
        assert_eq!(ticks, 3);
        assert_eq!(d.snapshot().revision, ticks);

        let mut replay = d.seeded_price_source(42).unwrap();
        let mut expected = PriceUpdate::new();
        for _ in 0..ticks {
            expected = replay.step();
        }
        for (symbol, price) in &expected {
            assert_eq!(d.price_of(symbol), Some(*price), "{symbol}");
        }
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn feed_reprices_holdings() {
        let mut d = CryptoDashboard::new(fast_settings(500)).unwrap();
        d.add_holding("BTC", "", 1.0, 40_000.0).unwrap();
        let before = d.aggregate().total_value;

        let handle = d.start_price_feed(Box::new(d.seeded_price_source(7).unwrap()));
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        handle.stop().await;

        let btc = d.price_of("BTC").unwrap();
        approx(d.holdings()[0].current_price, btc);
        approx(d.aggregate().total_value, btc);
        assert!(d.aggregate().total_value != before);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_updates() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(d.seeded_price_source(3).unwrap()));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.stop().await;

        let revision = d.snapshot().revision;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(d.snapshot().revision, revision);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_halts_updates() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(d.seeded_price_source(3).unwrap()));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(handle.is_running());
        drop(handle);

        let revision = d.snapshot().revision;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(d.snapshot().revision, revision);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(d.seeded_price_source(3).unwrap()));
        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(d.snapshot().revision, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn source_errors_skip_the_tick() {
        init_logging();
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(FailingSource));
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(handle.is_running());
        assert_eq!(handle.ticks(), 0);
        assert_eq!(d.price_of("BTC"), Some(43_250.0));
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_entries_are_dropped() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let handle = d.start_price_feed(Box::new(HalfBrokenSource { price: 100.0 }));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.stop().await;
        assert_eq!(d.price_of("BTC"), Some(102.0));
        assert_eq!(d.price_of("ETH"), Some(2_280.0));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_every_tick() {
        let d = CryptoDashboard::new(fast_settings(1_000)).unwrap();
        let revisions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&revisions);
        d.subscribe(Box::new(move |_, snapshot| {
            sink.lock().unwrap().push(snapshot.revision);
        }));

        let handle = d.start_price_feed(Box::new(d.seeded_price_source(5).unwrap()));
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        handle.stop().await;

        assert_eq!(*revisions.lock().unwrap(), vec![1, 2, 3, 4]);
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Compute worker
// ═══════════════════════════════════════════════════════════════════

mod compute_worker {
    use super::*;

    fn holdings() -> Vec<Holding> {
        vec![
            Holding::new("BTC", "Bitcoin", 1.0, 50_000.0, 40_000.0),
            Holding::new("ETH", "Ethereum", 10.0, 3_000.0, 2_000.0),
        ]
    }

    #[tokio::test]
    async fn aggregate_matches_inline_calculation() {
        let worker = ComputeWorker::standard(Duration::from_secs(5));
        assert!(worker.is_running());
        let expected = MetricsService::new().calculate(&holdings(), None).aggregate;
        let output = worker.submit(ComputeJob::Aggregate(holdings())).await.unwrap();
        assert_eq!(output, ComputeOutput::Aggregate(expected));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn risk_report_job() {
        let worker = ComputeWorker::standard(Duration::from_secs(5));
        let prices = vec![100.0, 120.0, 90.0, 110.0, 60.0, 130.0];
        let expected = RiskService::new().analyze(&prices, 0.95, 0.0);
        let output = worker
            .submit(ComputeJob::RiskReport {
                prices,
                confidence: 0.95,
                risk_free_rate: 0.0,
            })
            .await
            .unwrap();
        assert_eq!(output, ComputeOutput::RiskReport(expected));
    }

    #[tokio::test]
    async fn backend_errors_are_returned() {
        let worker = ComputeWorker::standard(Duration::from_secs(5));
        let err = worker
            .submit(ComputeJob::Indicators {
                prices: vec![1.0, 2.0],
                period: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn slow_job_times_out() {
        init_logging();
        let worker = ComputeWorker::spawn(Arc::new(SlowBackend), Duration::from_millis(20));
        let err = worker.submit(ComputeJob::Aggregate(holdings())).await.unwrap_err();
        match err {
            CoreError::WorkerTimeout { timeout_ms, .. } => assert_eq!(timeout_ms, 20),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_for_overrides_default_bound() {
        let worker = ComputeWorker::spawn(Arc::new(SlowBackend), Duration::from_millis(10));
        let output = worker
            .dispatch(ComputeJob::Aggregate(holdings()))
            .wait_for(Duration::from_secs(5))
            .await;
        assert!(output.is_ok());
    }

    #[tokio::test]
    async fn panicking_backend_reports_unavailable() {
        let worker = ComputeWorker::spawn(Arc::new(PanickingBackend), Duration::from_secs(5));
        let err = worker.submit(ComputeJob::Aggregate(holdings())).await.unwrap_err();
        assert!(matches!(err, CoreError::WorkerUnavailable(_)));

        // The worker survives and keeps serving.
        let err = worker.submit(ComputeJob::Aggregate(holdings())).await.unwrap_err();
        assert!(matches!(err, CoreError::WorkerUnavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_job_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            runs: Arc::clone(&runs),
            delay: Duration::from_millis(50),
        };
        let worker = ComputeWorker::spawn(Arc::new(backend), Duration::from_secs(5));

        let first = worker.dispatch(ComputeJob::Aggregate(holdings()));
        let second = worker.dispatch(ComputeJob::Aggregate(holdings()));
        assert_ne!(first.id(), second.id());
        second.cancel();

        first.wait().await.unwrap();
        worker.submit(ComputeJob::Aggregate(holdings())).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_jobs() {
        let worker = ComputeWorker::standard(Duration::from_secs(5));
        let task = worker.dispatch(ComputeJob::Aggregate(holdings()));
        worker.shutdown().await;
        assert!(task.wait().await.is_ok());
    }

    #[tokio::test]
    async fn refresh_aggregate_on_worker() {
        let d = dashboard_with_btc();
        let worker = d.compute_worker();
        assert_eq!(worker.timeout(), Duration::from_millis(5_000));
        assert_eq!(d.refresh_aggregate_with(&worker).await, d.aggregate());
    }

    #[tokio::test]
    async fn refresh_falls_back_to_last_aggregate() {
        let d = dashboard_with_btc();
        let worker = ComputeWorker::spawn(Arc::new(PanickingBackend), Duration::from_secs(1));
        let aggregate = d.refresh_aggregate_with(&worker).await;
        approx(aggregate.total_value, 100_000.0);
        assert_eq!(aggregate, d.aggregate());
    }
}
