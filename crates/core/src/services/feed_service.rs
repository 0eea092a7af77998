use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::providers::traits::PriceSource;
use crate::store::{self, SharedStore};

/// Periodically pulls prices from a [`PriceSource`] and applies them to the store.
///
/// Updates are applied in order from a single task, so tick N+1 never lands
/// before tick N.
pub struct PriceFeed;

impl PriceFeed {
    /// Spawn the feed loop on the current tokio runtime.
    ///
    /// The first update lands one full `interval` after start. Missed ticks are
    /// skipped rather than replayed in a burst.
    pub fn start(mut source: Box<dyn PriceSource>, store: SharedStore, interval: Duration) -> FeedHandle {
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);
        let source_name = source.name().to_string();

        log::info!(
            "price feed '{}' started for {:?} every {:?}",
            source_name,
            source.symbols(),
            interval
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        // Sender dropped or stop requested.
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let update = match source.next_prices().await {
                            Ok(update) => update,
                            Err(e) => {
                                log::warn!("price feed '{source_name}' tick failed: {e}");
                                continue;
                            }
                        };
                        // A stop may have arrived while the source was producing.
                        if *stop_rx.borrow() {
                            break;
                        }
                        let repriced = store::lock(&store).apply_prices(&update);
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        log::debug!("price feed tick {n}: {} symbols, {repriced} holdings repriced", update.len());
                    }
                }
            }
            log::info!("price feed '{source_name}' stopped");
        });

        FeedHandle {
            stop_tx,
            task: Some(task),
            ticks,
        }
    }
}

/// Owner of a running feed. Stopping (or dropping) it guarantees no further
/// update reaches the store.
pub struct FeedHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl FeedHandle {
    /// Number of updates applied so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the loop and wait for it to exit. Once this returns the feed
    /// will never touch the store again.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("price feed task ended abnormally: {e}");
                }
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.stop_tx.send(true);
            task.abort();
        }
    }
}
