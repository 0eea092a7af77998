use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::price::PriceUpdate;

/// Trait abstraction for every source of price updates.
///
/// The dashboard only ships simulated sources, but the feed loop is written
/// against this trait, so a real exchange stream can replace them without
/// touching the store or the feed.
#[async_trait]
pub trait PriceSource: Send {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    /// Symbols this source produces prices for.
    fn symbols(&self) -> Vec<String>;

    /// Produce the next batch of prices.
    async fn next_prices(&mut self) -> Result<PriceUpdate, CoreError>;
}
