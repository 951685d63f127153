//! Order model
//!
//! - [`types`]: the normalized client-side order and its enumerations
//! - [`normalize`]: conversion from backend / push payloads

pub mod normalize;
pub mod types;

// Re-exports
pub use normalize::{has_order_id, normalize_order, normalize_orders};
pub use types::*;
