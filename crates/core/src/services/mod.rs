pub mod compute_service;
pub mod feed_service;
pub mod indicator_service;
pub mod list_service;
pub mod metrics_service;
pub mod order_service;
pub mod risk_service;
