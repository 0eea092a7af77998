pub mod aggregate;
pub mod analytics;
pub mod holding;
pub mod order;
pub mod order_book;
pub mod price;
pub mod settings;
