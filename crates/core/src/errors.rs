use thiserror::Error;

/// Unified error type for the entire crypto-dashboard-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation ──────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    // ── Holdings & Orders ───────────────────────────────────────────
    #[error("Holding not found: {0}")]
    HoldingNotFound(String),

    #[error("Holding already exists for symbol: {0}")]
    DuplicateHolding(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Cannot sell {requested} {symbol} — only {available} held")]
    InsufficientHoldings {
        symbol: String,
        requested: f64,
        available: f64,
    },

    #[error("Price not available for {symbol}")]
    PriceNotAvailable { symbol: String },

    // ── Background computation ──────────────────────────────────────
    #[error("Background job {job_id} timed out after {timeout_ms} ms")]
    WorkerTimeout { job_id: String, timeout_ms: u64 },

    #[error("Background worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Background job cancelled: {0}")]
    WorkerCancelled(String),

    // ── Serialization ───────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}
