pub mod auth;
pub mod categories;
pub mod common;
pub mod products;
pub mod reports;
pub mod sales;
pub mod staff;
pub mod stock_transfers;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
