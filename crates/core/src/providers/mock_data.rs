use chrono::Utc;
use rand::Rng;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::order_book::{OrderBookLevel, OrderBookSnapshot};
use crate::models::settings::SymbolSeed;
use super::seeded::bounded_step;

/// Generate `count` holdings spread over `seeds`, for exercising the
/// virtualized list with large collections.
///
/// Symbols repeat with a numeric suffix once the seed list is exhausted
/// (`BTC`, `ETH`, …, `BTC-2`, `ETH-2`, …) so every holding is unique.
pub fn generate_holdings<R: Rng>(rng: &mut R, count: usize, seeds: &[SymbolSeed]) -> Vec<Holding> {
    if seeds.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let seed = &seeds[i % seeds.len()];
            let round = i / seeds.len();
            let (symbol, name) = if round == 0 {
                (seed.symbol.clone(), seed.name.clone())
            } else {
                (format!("{}-{}", seed.symbol, round + 1), format!("{} #{}", seed.name, round + 1))
            };
            let amount = rng.gen_range(0.01..100.0);
            let current_price = bounded_step(rng, seed.price, 5.0);
            let average_buy_price = current_price * rng.gen_range(0.5..1.5);
            Holding::new(symbol, name, amount, current_price, average_buy_price)
        })
        .collect()
}

/// Random walk of `len` prices starting at `start_price`.
pub fn generate_price_history<R: Rng>(
    rng: &mut R,
    start_price: f64,
    len: usize,
    max_change_percent: f64,
) -> Vec<f64> {
    let mut price = start_price;
    (0..len)
        .map(|i| {
            if i > 0 {
                price = bounded_step(rng, price, max_change_percent);
            }
            price
        })
        .collect()
}

/// Mock order book: `depth` bid and ask levels around `mid_price`.
///
/// Level prices step away from the mid by roughly 0.05 % each; amounts are
/// random. Totals are cumulative from the best level outward.
pub fn generate_order_book<R: Rng>(
    rng: &mut R,
    symbol: &str,
    mid_price: f64,
    depth: usize,
) -> Result<OrderBookSnapshot, CoreError> {
    if !(mid_price.is_finite() && mid_price > 0.0) {
        return Err(CoreError::ValidationError(format!(
            "Mid price must be positive, got {mid_price}"
        )));
    }
    if depth == 0 {
        return Err(CoreError::ValidationError("Order book depth must be > 0".into()));
    }

    let tick = mid_price * 0.0005;
    let half_spread = tick * rng.gen_range(0.5..1.5);

    let mut bids = Vec::with_capacity(depth);
    let mut asks = Vec::with_capacity(depth);
    let mut bid_total = 0.0;
    let mut ask_total = 0.0;
    for level in 0..depth {
        let step = tick * level as f64;

        let bid_amount = rng.gen_range(0.01..10.0);
        bid_total += bid_amount;
        bids.push(OrderBookLevel {
            price: (mid_price - half_spread - step).max(f64::EPSILON),
            amount: bid_amount,
            total: bid_total,
        });

        let ask_amount = rng.gen_range(0.01..10.0);
        ask_total += ask_amount;
        asks.push(OrderBookLevel {
            price: mid_price + half_spread + step,
            amount: ask_amount,
            total: ask_total,
        });
    }

    let spread = asks[0].price - bids[0].price;
    Ok(OrderBookSnapshot {
        symbol: symbol.trim().to_uppercase(),
        bids,
        asks,
        spread,
        spread_percent: spread / mid_price * 100.0,
        generated_at: Utc::now(),
    })
}
