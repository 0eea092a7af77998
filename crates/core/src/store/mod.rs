pub mod memory;
pub mod traits;

use std::sync::{Arc, Mutex, MutexGuard};

use traits::PortfolioStore;

/// Store handle shared between the facade, the price feed and anything else
/// that needs to read or write portfolio state.
pub type SharedStore = Arc<Mutex<dyn PortfolioStore>>;

/// Wrap a store for sharing.
pub fn shared<S: PortfolioStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock a shared store, recovering from a poisoned mutex.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, dyn PortfolioStore + 'static> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}
